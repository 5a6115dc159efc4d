//! List projections: names, short dicts, full dicts, typed objects.

use super::ApiObject;
use crate::error::AppError;
use crate::schema::TIMESTAMP_FIELDS;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Names,
    Short,
    Dict,
    #[default]
    Details,
}

impl FromStr for OutputMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "names" => Ok(OutputMode::Names),
            "short" => Ok(OutputMode::Short),
            "dict" => Ok(OutputMode::Dict),
            "details" => Ok(OutputMode::Details),
            _ => Err(AppError::Validation(format!(
                "invalid output mode: {} (expected names, short, dict or details)",
                s
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ListOutput<T> {
    Names(Vec<String>),
    Details(Vec<T>),
    Dicts(Vec<Map<String, Value>>),
}

impl<T: ApiObject> ListOutput<T> {
    pub fn project(items: Vec<T>, mode: OutputMode) -> Result<Self, AppError> {
        Ok(match mode {
            OutputMode::Names => ListOutput::Names(items.iter().map(|i| i.name().to_string()).collect()),
            OutputMode::Details => ListOutput::Details(items),
            OutputMode::Short | OutputMode::Dict => {
                let short = mode == OutputMode::Short;
                ListOutput::Dicts(items.iter().map(|i| to_dict(i, short)).collect::<Result<_, _>>()?)
            }
        })
    }
}

impl<T> ListOutput<T> {
    pub fn len(&self) -> usize {
        match self {
            ListOutput::Names(v) => v.len(),
            ListOutput::Details(v) => v.len(),
            ListOutput::Dicts(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_names(self) -> Option<Vec<String>> {
        match self {
            ListOutput::Names(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_details(self) -> Option<Vec<T>> {
        match self {
            ListOutput::Details(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_dicts(self) -> Option<Vec<Map<String, Value>>> {
        match self {
            ListOutput::Dicts(v) => Some(v),
            _ => None,
        }
    }
}

/// Object as a null-free dict. `short` also drops the kind's extra fields and cuts timestamps to the minute.
pub fn to_dict<T: ApiObject>(obj: &T, short: bool) -> Result<Map<String, Value>, AppError> {
    let Value::Object(map) = serde_json::to_value(obj).map_err(|e| AppError::Validation(e.to_string()))? else {
        return Err(AppError::Validation(format!(
            "{} did not serialize to an object",
            T::descriptor().kind
        )));
    };
    let extra = T::descriptor().extra_fields;
    let mut out = Map::new();
    for (k, v) in map {
        if v.is_null() || (short && extra.contains(&k.as_str())) {
            continue;
        }
        let v = if short && TIMESTAMP_FIELDS.contains(&k.as_str()) {
            to_minutes(v)
        } else {
            v
        };
        out.insert(k, v);
    }
    Ok(out)
}

fn to_minutes(v: Value) -> Value {
    match v.as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok()) {
        Some(ts) => Value::String(ts.format("%Y-%m-%d %H:%M").to_string()),
        None => v,
    }
}
