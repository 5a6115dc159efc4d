//! Convert serde_json::Value to types that sqlx can bind.

use crate::error::AppError;
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

/// A value that can be bound to a PostgreSQL query. Converts from serde_json::Value.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Json(Value),
    /// A whole `text[]` in one parameter, for `= ANY(...)` matches.
    TextArray(Vec<String>),
}

impl PgBindValue {
    pub fn from_json(v: &Value) -> Result<Self, AppError> {
        Ok(match v {
            Value::Null => PgBindValue::Null,
            Value::Bool(b) => PgBindValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    PgBindValue::I64(i)
                } else if let Some(f) = n.as_f64() {
                    PgBindValue::F64(f)
                } else {
                    return Err(AppError::Validation(format!("number out of range: {}", n)));
                }
            }
            Value::String(s) => PgBindValue::String(s.clone()),
            Value::Array(_) | Value::Object(_) => PgBindValue::Json(v.clone()),
        })
    }

    /// Bind as JSONB regardless of shape; used for the spec and extra_data columns.
    pub fn json(v: Value) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            other => PgBindValue::Json(other),
        }
    }
}

impl From<&str> for PgBindValue {
    fn from(s: &str) -> Self {
        PgBindValue::String(s.to_string())
    }
}

impl From<String> for PgBindValue {
    fn from(s: String) -> Self {
        PgBindValue::String(s)
    }
}

impl From<i64> for PgBindValue {
    fn from(n: i64) -> Self {
        PgBindValue::I64(n)
    }
}

impl From<Option<String>> for PgBindValue {
    fn from(s: Option<String>) -> Self {
        s.map(PgBindValue::String).unwrap_or(PgBindValue::Null)
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            PgBindValue::Null => IsNull::Yes,
            PgBindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::String(s) => {
                let s_ref: &str = s.as_str();
                <&str as Encode<Postgres>>::encode_by_ref(&s_ref, buf)?
            }
            PgBindValue::Json(v) => <Value as Encode<Postgres>>::encode_by_ref(v, buf)?,
            PgBindValue::TextArray(items) => <Vec<String> as Encode<Postgres>>::encode_by_ref(items, buf)?,
        })
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            PgBindValue::Null | PgBindValue::String(_) => PgTypeInfo::with_name("TEXT"),
            PgBindValue::Bool(_) => PgTypeInfo::with_name("BOOL"),
            PgBindValue::I64(_) => PgTypeInfo::with_name("INT8"),
            PgBindValue::F64(_) => PgTypeInfo::with_name("FLOAT8"),
            PgBindValue::Json(_) => PgTypeInfo::with_name("JSONB"),
            PgBindValue::TextArray(_) => <Vec<String> as sqlx::Type<Postgres>>::type_info(),
        })
    }
}

impl sqlx::Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_keep_their_type() {
        assert_eq!(PgBindValue::from_json(&json!(true)).unwrap(), PgBindValue::Bool(true));
        assert_eq!(PgBindValue::from_json(&json!(3)).unwrap(), PgBindValue::I64(3));
        assert_eq!(PgBindValue::from_json(&json!(1.5)).unwrap(), PgBindValue::F64(1.5));
        assert_eq!(PgBindValue::from_json(&json!(null)).unwrap(), PgBindValue::Null);
    }

    #[test]
    fn hex_ids_stay_text() {
        let id = "0f8fad5bd9cb469fa16570867728950e";
        assert_eq!(PgBindValue::from_json(&json!(id)).unwrap(), PgBindValue::String(id.into()));
    }

    #[test]
    fn containers_bind_as_json() {
        let v = json!({"a": [1, 2]});
        assert_eq!(PgBindValue::from_json(&v).unwrap(), PgBindValue::Json(v.clone()));
        assert_eq!(PgBindValue::json(json!("x")), PgBindValue::Json(json!("x")));
        assert_eq!(PgBindValue::json(Value::Null), PgBindValue::Null);
    }

    #[test]
    fn text_array_binds_as_one_array_parameter() {
        let v = PgBindValue::TextArray(vec!["a".into(), "b".into()]);
        assert_eq!(
            <PgBindValue as Encode<Postgres>>::produces(&v),
            Some(<Vec<String> as sqlx::Type<Postgres>>::type_info())
        );
    }
}
