use super::flatten::{FlattenedRecord, flatten};
use crate::config::TransformConfig;
use crate::errors::PipelineError;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

/// A flattened batch together with the one schema every row is written against.
#[derive(Debug, Clone, Default)]
pub struct UnifiedBatch {
    pub records: Vec<FlattenedRecord>,
    /// Sorted union of every record's column names.
    pub all_columns: Vec<String>,
    /// Sorted union of columns that produced a timestamp in at least one record.
    pub timestamp_columns: Vec<String>,
}

/// Flattens every record, then settles the batch schema.
///
/// The schema can only be decided once all records are flattened: columnar
/// files need one fixed set of columns, but each record may carry a
/// different subset of optional fields.
pub fn unify(records: &[Value], config: &TransformConfig) -> Result<UnifiedBatch, PipelineError> {
    config
        .validate()
        .map_err(|e| PipelineError::Transform(format!("{e:#}")))?;

    let flattened = records
        .iter()
        .enumerate()
        .map(|(index, record)| match record {
            Value::Object(object) => flatten(object, config),
            other => Err(PipelineError::Transform(format!(
                "record {index} is not a JSON object (found {})",
                json_type_name(other)
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut all_columns = BTreeSet::new();
    let mut timestamp_columns = BTreeSet::new();

    for record in &flattened {
        all_columns.extend(record.field_list.iter().cloned());
        timestamp_columns.extend(record.timestamp_fields.keys().cloned());
    }

    debug!(
        "Unified {} records into {} columns ({} timestamp sources)",
        flattened.len(),
        all_columns.len(),
        timestamp_columns.len()
    );

    Ok(UnifiedBatch {
        records: flattened,
        all_columns: all_columns.into_iter().collect(),
        timestamp_columns: timestamp_columns.into_iter().collect(),
    })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_union_covers_every_record() {
        let a = json!({"email": "a@example.com", "phone": "555"});
        let b = json!({"email": "b@example.com", "company": {"name": "Acme"}});

        let batch = unify(&[a, b], &TransformConfig::default()).unwrap();

        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.all_columns, vec!["company_name", "email", "phone"]);
        assert!(batch.timestamp_columns.is_empty());
    }

    #[test]
    fn test_union_is_order_independent() {
        let a = json!({"x": 1, "created_at": "2024-01-15T10:00:00Z"});
        let b = json!({"y": 2, "nested": {"updated_at": 1705312800}});
        let config = TransformConfig::default();

        let forward = unify(&[a.clone(), b.clone()], &config).unwrap();
        let backward = unify(&[b, a], &config).unwrap();

        assert_eq!(forward.all_columns, backward.all_columns);
        assert_eq!(forward.timestamp_columns, backward.timestamp_columns);

        let mut expected: Vec<String> = forward.records[0]
            .field_list
            .iter()
            .chain(forward.records[1].field_list.iter())
            .cloned()
            .collect();
        expected.sort();
        expected.dedup();
        assert_eq!(forward.all_columns, expected);
    }

    #[test]
    fn test_timestamp_columns_are_subset_of_all_columns() {
        let records = vec![
            json!({"created_at": "2024-01-15T10:00:00Z", "name": "A"}),
            json!({"created_at": "not a date", "closed_on": "2024-02-01"}),
        ];

        let batch = unify(&records, &TransformConfig::default()).unwrap();

        assert_eq!(batch.timestamp_columns, vec!["closed_on", "created_at"]);
        for column in &batch.timestamp_columns {
            assert!(batch.all_columns.contains(column));
        }
    }

    #[test]
    fn test_empty_batch() {
        let batch = unify(&[], &TransformConfig::default()).unwrap();
        assert!(batch.records.is_empty());
        assert!(batch.all_columns.is_empty());
        assert!(batch.timestamp_columns.is_empty());
    }

    #[test]
    fn test_non_object_record_is_a_transform_error() {
        let records = vec![json!({"ok": true}), json!([1, 2])];

        let error = unify(&records, &TransformConfig::default()).unwrap_err();

        assert!(matches!(error, PipelineError::Transform(_)));
        assert_eq!(
            error.to_string(),
            "transform: record 1 is not a JSON object (found array)"
        );
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = TransformConfig {
            max_column_name_length: 3,
            ..Default::default()
        };

        let error = unify(&[json!({"a": 1})], &config).unwrap_err();
        assert!(matches!(error, PipelineError::Transform(_)));
    }
}
