use super::{FieldValue, naming, timestamp};
use crate::config::TransformConfig;
use crate::errors::PipelineError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Keys probed, in order, for a record's identifier.
pub const RECORD_ID_KEYS: [&str; 5] = ["id", "Id", "ID", "_id", "uuid"];

/// One raw record reduced to a single level of named scalars.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedRecord {
    /// Identifier taken from the raw record, empty when it has none.
    pub record_id: String,
    pub fields: BTreeMap<String, FieldValue>,
    /// Source column name → epoch milliseconds, for values read as timestamps.
    pub timestamp_fields: BTreeMap<String, i64>,
    /// Sorted column names present in `fields`.
    pub field_list: Vec<String>,
}

pub fn flatten(
    record: &Map<String, Value>,
    config: &TransformConfig,
) -> Result<FlattenedRecord, PipelineError> {
    let mut flattener = Flattener {
        config,
        fields: BTreeMap::new(),
        timestamp_fields: BTreeMap::new(),
    };

    flattener.walk_object("", record, 0);

    let Flattener {
        fields,
        timestamp_fields,
        ..
    } = flattener;

    for name in fields.keys() {
        if name.len() > config.max_column_name_length || !naming::is_valid_column_name(name) {
            return Err(PipelineError::Transform(format!(
                "flattening produced an invalid column name {name:?}"
            )));
        }
    }

    Ok(FlattenedRecord {
        record_id: extract_record_id(record),
        field_list: fields.keys().cloned().collect(),
        fields,
        timestamp_fields,
    })
}

/// First of [`RECORD_ID_KEYS`] holding a string or number, or an empty string.
pub fn extract_record_id(record: &Map<String, Value>) -> String {
    for key in RECORD_ID_KEYS {
        match record.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return s.trim().to_string(),
            Some(value @ Value::Number(_)) => {
                if let Some(id) = FieldValue::from_json(value).to_column_string() {
                    return id;
                }
            }
            _ => {}
        }
    }

    String::new()
}

struct Flattener<'a> {
    config: &'a TransformConfig,
    fields: BTreeMap<String, FieldValue>,
    timestamp_fields: BTreeMap<String, i64>,
}

impl Flattener<'_> {
    fn walk_object(&mut self, prefix: &str, object: &Map<String, Value>, depth: usize) {
        for (key, value) in object {
            let path = naming::join(prefix, key);

            if self.config.excluded_fields.contains(&path) {
                continue;
            }

            let path = match self.config.field_mappings.get(&path) {
                Some(renamed) => naming::sanitize(renamed),
                None => path,
            };

            self.walk_value(path, value, depth + 1);
        }
    }

    fn walk_value(&mut self, path: String, value: &Value, depth: usize) {
        let expandable = depth < self.config.max_depth;

        match value {
            Value::Object(object) if expandable => self.walk_object(&path, object, depth),
            Value::Array(items)
                if expandable
                    && self.config.flatten_arrays
                    && items.iter().any(Value::is_object) =>
            {
                self.walk_array(&path, items, depth)
            }
            _ => self.emit(&path, value),
        }
    }

    fn walk_array(&mut self, path: &str, items: &[Value], depth: usize) {
        let limit = self.config.max_array_index.unwrap_or(usize::MAX);

        for (index, item) in items.iter().enumerate().take(limit) {
            self.walk_value(format!("{path}_{index}"), item, depth + 1);
        }

        // Always the original length, however many elements were expanded.
        let count = i64::try_from(items.len()).unwrap_or(i64::MAX);
        self.insert(&format!("{path}_count"), FieldValue::Integer(count), None);
    }

    fn emit(&mut self, path: &str, value: &Value) {
        let field = FieldValue::from_json(value);

        if field.is_null() {
            if self.config.preserve_nulls {
                self.insert(path, field, None);
            }
            return;
        }

        let detected = match value {
            Value::Array(_) | Value::Object(_) => None,
            _ => timestamp::detect(path, &field),
        };

        self.insert(path, field, detected);
    }

    fn insert(&mut self, path: &str, field: FieldValue, detected: Option<i64>) {
        let name = naming::shorten(path, self.config.max_column_name_length);

        match detected {
            Some(millis) => {
                self.timestamp_fields.insert(name.clone(), millis);
            }
            None => {
                self.timestamp_fields.remove(&name);
            }
        }

        self.fields.insert(name, field);
    }
}
