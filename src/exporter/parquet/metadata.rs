use super::encoder::{ColumnKind, ColumnSet};
use super::Destination;
use arrow_array::{Array, StringArray};
use arrow_schema::DataType;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MAX_SAMPLE_VALUES: usize = 5;
/// Samples are drawn from this many leading rows.
pub const SAMPLE_ROWS: usize = 5;
/// Values this long or longer are never sampled.
pub const MAX_SAMPLE_LENGTH: usize = 100;

/// Side-car description of one Parquet object, stored as JSON next to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub connection_id: String,
    pub object_type: String,
    pub record_count: usize,
    pub synced_at: String,
    pub columns: BTreeMap<String, ColumnInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    #[serde(rename = "type")]
    pub column_type: String,
    pub display_name: String,
    pub nullable: bool,
    pub sample_values: Vec<String>,
}

impl SchemaInfo {
    /// Zero-record description, reported when a batch had nothing to write.
    pub fn empty(destination: &Destination, synced_at: DateTime<Utc>) -> Self {
        Self {
            connection_id: destination.connection_id.clone(),
            object_type: destination.object_type.clone(),
            record_count: 0,
            synced_at: synced_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            columns: BTreeMap::new(),
        }
    }
}

pub fn build_schema_info(column_set: &ColumnSet, destination: &Destination) -> SchemaInfo {
    let mut info = SchemaInfo::empty(destination, column_set.synced_at);
    info.record_count = column_set.row_count();

    for (index, column) in column_set.columns.iter().enumerate() {
        let sample_values = match column.kind {
            ColumnKind::Flattened => column_set
                .batch
                .column(index)
                .as_any()
                .downcast_ref::<StringArray>()
                .map(sample_values)
                .unwrap_or_default(),
            ColumnKind::System | ColumnKind::Timestamp => Vec::new(),
        };

        info.columns.insert(
            column.name.clone(),
            ColumnInfo {
                column_type: type_name(&column.data_type()).to_string(),
                display_name: display_name(&column.name),
                nullable: column.nullable,
                sample_values,
            },
        );
    }

    info
}

fn type_name(data_type: &DataType) -> &'static str {
    match data_type {
        DataType::Int64 => "int64",
        _ => "string",
    }
}

fn sample_values(values: &StringArray) -> Vec<String> {
    let mut samples: Vec<String> = Vec::new();

    for row in 0..values.len().min(SAMPLE_ROWS) {
        if values.is_null(row) {
            continue;
        }

        let value = values.value(row);
        if value.is_empty() || value.chars().count() >= MAX_SAMPLE_LENGTH {
            continue;
        }

        if !samples.iter().any(|sample| sample == value) {
            samples.push(value.to_string());
        }

        if samples.len() == MAX_SAMPLE_VALUES {
            break;
        }
    }

    samples
}

/// Human-friendly column title: `addresses_0_city` → `Address 1 - City`.
///
/// A numeric segment is read as a zero-based array index and folded into the
/// preceding word, which closes one group of the title.
pub fn display_name(column: &str) -> String {
    let mut groups: Vec<String> = Vec::new();
    let mut words: Vec<String> = Vec::new();

    for segment in column.split('_').filter(|segment| !segment.is_empty()) {
        if let (Ok(index), Some(previous)) = (segment.parse::<u64>(), words.last_mut()) {
            *previous = format!("{} {}", singularize(previous), index.saturating_add(1));
            groups.push(words.join(" "));
            words.clear();
            continue;
        }

        words.push(capitalize(segment));
    }

    if !words.is_empty() {
        groups.push(words.join(" "));
    }

    groups.join(" - ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

const IRREGULAR_PLURALS: [(&str, &str); 6] = [
    ("series", "series"),
    ("species", "species"),
    ("movies", "movie"),
    ("cookies", "cookie"),
    ("people", "person"),
    ("children", "child"),
];

fn singularize(word: &str) -> String {
    let lower = word.to_lowercase();

    if let Some((_, singular)) = IRREGULAR_PLURALS.iter().find(|(plural, _)| *plural == lower) {
        return capitalize(singular);
    }

    let stem_ends_in_consonant = |ending_len: usize| {
        lower[..lower.len() - ending_len]
            .chars()
            .last()
            .is_some_and(|c| c.is_ascii_alphabetic() && !"aeiou".contains(c))
    };

    if lower.len() > 3 && lower.ends_with("ies") {
        format!("{}y", &word[..word.len() - 3])
    } else if ["sses", "xes", "ches", "shes"]
        .iter()
        .any(|ending| lower.ends_with(ending))
        || (lower.ends_with("uses") && stem_ends_in_consonant(4))
    {
        word[..word.len() - 2].to_string()
    } else if lower.len() > 1 && lower.ends_with('s') && !lower.ends_with("ss") {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransformConfig;
    use crate::exporter::parquet::encoder::encode;
    use crate::transform::unify;
    use serde_json::json;

    fn destination() -> Destination {
        Destination::new("conn-1", "contacts", "20240201T083000Z-run")
    }

    fn column_set(records: Vec<serde_json::Value>) -> ColumnSet {
        let unified = unify(&records, &TransformConfig::default()).unwrap();
        encode(
            &unified.records,
            &unified.all_columns,
            &unified.timestamp_columns,
            "2024-02-01T08:30:00Z".parse::<DateTime<Utc>>().unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_display_names() {
        assert_eq!(display_name("addresses_0_city"), "Address 1 - City");
        assert_eq!(display_name("first_name"), "First Name");
        assert_eq!(display_name("_record_id"), "Record Id");
        assert_eq!(
            display_name("line_items_2_product_name"),
            "Line Item 3 - Product Name"
        );
        assert_eq!(display_name("tags_0"), "Tag 1");
        assert_eq!(display_name("properties_1_value"), "Property 2 - Value");
        assert_eq!(display_name("boxes_0_size"), "Box 1 - Size");
        assert_eq!(display_name("addresses_count"), "Addresses Count");
        assert_eq!(display_name("_1st_touch"), "1st Touch");
    }

    #[test]
    fn test_display_names_singularize_plurals() {
        assert_eq!(display_name("houses_0_city"), "House 1 - City");
        assert_eq!(display_name("statuses_1"), "Status 2");
        assert_eq!(display_name("buses_0_route"), "Bus 1 - Route");
        assert_eq!(display_name("series_0_title"), "Series 1 - Title");
        assert_eq!(display_name("people_2_email"), "Person 3 - Email");
        assert_eq!(display_name("companies_0"), "Company 1");
    }

    #[test]
    fn test_schema_info_keeps_shadowed_timestamp_column() {
        let set = column_set(vec![json!({
            "x_at": "2024-01-15T10:00:00Z",
            "timestamp_x_at": "manual"
        })]);

        let info = build_schema_info(&set, &destination());

        assert_eq!(info.columns.len(), set.batch.num_columns());
        assert_eq!(info.columns["timestamp_x_at"].column_type, "string");
        assert_eq!(info.columns["timestamp_x_at"].sample_values, vec!["manual"]);
        assert_eq!(info.columns["timestamp_x_at_2"].column_type, "int64");
    }

    #[test]
    fn test_schema_info_describes_every_column() {
        let set = column_set(vec![
            json!({"id": 1, "email": "a@example.com", "created_at": "2024-01-15T10:00:00Z"}),
            json!({"id": 2, "email": "b@example.com"}),
        ]);

        let info = build_schema_info(&set, &destination());

        assert_eq!(info.connection_id, "conn-1");
        assert_eq!(info.object_type, "contacts");
        assert_eq!(info.record_count, 2);
        assert_eq!(info.synced_at, "2024-02-01T08:30:00.000Z");
        assert_eq!(
            info.columns.keys().collect::<Vec<_>>(),
            vec![
                "_record_id",
                "_sync_timestamp",
                "created_at",
                "email",
                "id",
                "timestamp_created_at"
            ]
        );

        let record_id = &info.columns["_record_id"];
        assert_eq!(record_id.column_type, "string");
        assert!(!record_id.nullable);
        assert!(record_id.sample_values.is_empty());

        let timestamp = &info.columns["timestamp_created_at"];
        assert_eq!(timestamp.column_type, "int64");
        assert_eq!(timestamp.display_name, "Timestamp Created At");
        assert!(timestamp.nullable);

        assert_eq!(
            info.columns["email"].sample_values,
            vec!["a@example.com", "b@example.com"]
        );
    }

    #[test]
    fn test_sample_values_rules() {
        let long_value = "x".repeat(100);
        let set = column_set(vec![
            json!({"status": "open"}),
            json!({"status": "open"}),
            json!({"other": 1}),
            json!({"status": long_value}),
            json!({"status": "closed"}),
            json!({"status": "lost"}),
            json!({"status": "won"}),
        ]);

        let info = build_schema_info(&set, &destination());

        // Only the first five rows are considered; duplicates, empties and
        // over-long values are skipped.
        assert_eq!(info.columns["status"].sample_values, vec!["open", "closed"]);
    }

    #[test]
    fn test_sample_values_are_capped() {
        let set = column_set((0..8).map(|i| json!({"n": i})).collect());
        let info = build_schema_info(&set, &destination());
        assert_eq!(info.columns["n"].sample_values, vec!["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn test_schema_document_shape() {
        let set = column_set(vec![json!({"first_name": "John"})]);
        let document = serde_json::to_value(build_schema_info(&set, &destination())).unwrap();

        assert_eq!(document["connection_id"], "conn-1");
        assert_eq!(document["object_type"], "contacts");
        assert_eq!(document["record_count"], 1);
        assert_eq!(document["synced_at"], "2024-02-01T08:30:00.000Z");
        assert_eq!(
            document["columns"]["first_name"],
            json!({
                "type": "string",
                "display_name": "First Name",
                "nullable": true,
                "sample_values": ["John"]
            })
        );
    }

    #[test]
    fn test_empty_schema_info() {
        let synced_at = "2024-02-01T08:30:00Z".parse::<DateTime<Utc>>().unwrap();
        let info = SchemaInfo::empty(&destination(), synced_at);

        assert_eq!(info.record_count, 0);
        assert!(info.columns.is_empty());
        assert_eq!(info.synced_at, "2024-02-01T08:30:00.000Z");
    }
}
