//! Label sub-model: key/value tags owned by one entity.
//!
//! Merging is incremental: labels named in the input are updated in place (or removed
//! when the value is `None`), new names are appended, and labels the input does not
//! mention are kept.

use super::row::LabelRow;
use crate::objects::LabelMap;
use std::collections::BTreeMap;

/// A write the engine must apply to the labels table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LabelChange {
    Insert { name: String, value: String },
    Update { id: i64, value: String },
    Delete { id: i64 },
}

/// Label rows for a new entity. `None` values have nothing to delete and are skipped.
pub fn new_labels(parent: &str, input: &LabelMap) -> Vec<LabelRow> {
    input
        .iter()
        .filter_map(|(name, value)| {
            value.as_ref().map(|v| LabelRow {
                id: None,
                name: name.clone(),
                value: v.clone(),
                parent: parent.to_string(),
            })
        })
        .collect()
}

/// Merge `input` into `labels`, returning the writes needed to persist the result.
pub fn replace_labels(labels: &mut Vec<LabelRow>, parent: &str, input: &LabelMap) -> Vec<LabelChange> {
    let mut changes = Vec::new();
    for (name, value) in input {
        let existing = labels.iter().position(|l| &l.name == name);
        match (existing, value) {
            (Some(idx), Some(v)) => {
                let label = &mut labels[idx];
                if &label.value != v {
                    label.value = v.clone();
                    if let Some(id) = label.id {
                        changes.push(LabelChange::Update { id, value: v.clone() });
                    }
                }
            }
            (Some(idx), None) => {
                let removed = labels.remove(idx);
                if let Some(id) = removed.id {
                    changes.push(LabelChange::Delete { id });
                }
            }
            (None, Some(v)) => {
                labels.push(LabelRow {
                    id: None,
                    name: name.clone(),
                    value: v.clone(),
                    parent: parent.to_string(),
                });
                changes.push(LabelChange::Insert {
                    name: name.clone(),
                    value: v.clone(),
                });
            }
            (None, None) => {}
        }
    }
    changes
}

pub fn to_label_map(labels: &[LabelRow]) -> BTreeMap<String, String> {
    labels
        .iter()
        .map(|l| (l.name.clone(), l.value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(pairs: &[(&str, &str)]) -> Vec<LabelRow> {
        pairs
            .iter()
            .enumerate()
            .map(|(i, (n, v))| LabelRow {
                id: Some(i as i64 + 1),
                name: n.to_string(),
                value: v.to_string(),
                parent: "p".into(),
            })
            .collect()
    }

    fn input(pairs: &[(&str, Option<&str>)]) -> LabelMap {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.map(str::to_string)))
            .collect()
    }

    #[test]
    fn unmentioned_labels_are_kept() {
        let mut labels = stored(&[("x", "1"), ("y", "2")]);
        let changes = replace_labels(&mut labels, "p", &input(&[("y", Some("3")), ("z", Some("4"))]));

        let map = to_label_map(&labels);
        assert_eq!(map.get("x").map(String::as_str), Some("1"));
        assert_eq!(map.get("y").map(String::as_str), Some("3"));
        assert_eq!(map.get("z").map(String::as_str), Some("4"));
        assert_eq!(
            changes,
            vec![
                LabelChange::Update { id: 2, value: "3".into() },
                LabelChange::Insert { name: "z".into(), value: "4".into() },
            ]
        );
    }

    #[test]
    fn updates_keep_the_stored_row() {
        let mut labels = stored(&[("y", "2")]);
        replace_labels(&mut labels, "p", &input(&[("y", Some("3"))]));
        assert_eq!(labels[0].id, Some(1));
        assert_eq!(labels[0].value, "3");
    }

    #[test]
    fn none_removes_a_label() {
        let mut labels = stored(&[("x", "1"), ("y", "2")]);
        let changes = replace_labels(&mut labels, "p", &input(&[("x", None), ("ghost", None)]));
        assert_eq!(to_label_map(&labels).keys().collect::<Vec<_>>(), vec!["y"]);
        assert_eq!(changes, vec![LabelChange::Delete { id: 1 }]);
    }

    #[test]
    fn unchanged_values_produce_no_writes() {
        let mut labels = stored(&[("x", "1")]);
        assert!(replace_labels(&mut labels, "p", &input(&[("x", Some("1"))])).is_empty());
    }

    #[test]
    fn new_labels_skip_none_and_set_parent() {
        let rows = new_labels("proj", &input(&[("a", Some("1")), ("b", None)]));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].parent, "proj");
        assert_eq!(rows[0].id, None);
    }
}
