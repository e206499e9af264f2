//! Turning semi-structured records into a numeric training set.
//!
//! Records are flat key/value maps whose values may be numbers, booleans,
//! text or null. Loading picks the training columns, builds the categorical
//! codebooks and encodes every record into a [`FeatureVector`], keeping each
//! record's original text in a side table.

use crate::config::LoaderConfig;
use crate::data::encoder::CategoricalEncoder;
use crate::data::feature::{FeatureKeys, TrainingSet};
use crate::error::{KohonenError, Result};
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::io::Read;

static NON_ALPHANUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9]").unwrap());

/// A single raw field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// Explicit null.
    Null,
    /// Boolean, trained as 1 or 0.
    Bool(bool),
    /// Number.
    Number(f64),
    /// Text.
    Text(String),
}

impl RawValue {
    /// Returns true for [`RawValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    /// Returns true for [`RawValue::Text`].
    pub fn is_text(&self) -> bool {
        matches!(self, RawValue::Text(_))
    }

    /// Text rendering used for categorical coding. Null has none.
    pub fn to_text(&self) -> Option<String> {
        match self {
            RawValue::Null => None,
            RawValue::Bool(b) => Some(b.to_string()),
            RawValue::Number(n) => Some(n.to_string()),
            RawValue::Text(s) => Some(s.clone()),
        }
    }

    /// Numeric reading used for non-categorical columns.
    pub fn as_number(&self) -> f64 {
        match self {
            RawValue::Null => 0.0,
            RawValue::Bool(true) => 1.0,
            RawValue::Bool(false) => 0.0,
            RawValue::Number(n) => *n,
            RawValue::Text(s) => s.trim().parse().unwrap_or(0.0),
        }
    }
}

/// A flat record with fields in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Vec<(String, RawValue)>,
}

impl RawRecord {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`RawRecord::insert`].
    pub fn with(mut self, key: impl Into<String>, value: RawValue) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets `key`, replacing an earlier value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: RawValue) {
        let key = key.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(field) => field.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Value of `key`, if present.
    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Field names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, RawValue)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, RawValue)>>(iter: I) -> Self {
        let mut record = RawRecord::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl Serialize for RawRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct RawRecordVisitor;

impl<'de> Visitor<'de> for RawRecordVisitor {
    type Value = RawRecord;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a flat object of numbers, booleans, strings or nulls")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<RawRecord, A::Error> {
        let mut record = RawRecord::new();
        while let Some((key, value)) = access.next_entry::<String, RawValue>()? {
            record.insert(key, value);
        }
        Ok(record)
    }
}

impl<'de> Deserialize<'de> for RawRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(RawRecordVisitor)
    }
}

/// Reads a JSON array of flat objects.
pub fn read_records<R: Read>(reader: R) -> Result<Vec<RawRecord>> {
    let records: Vec<RawRecord> = serde_json::from_reader(reader)?;
    Ok(records)
}

/// Reduces a column name to `[a-zA-Z0-9]`, prefixing `Col` when the result
/// is empty or starts with a digit.
pub fn sanitize_key(column: &str) -> String {
    let sanitized = NON_ALPHANUMERIC.replace_all(column, "").into_owned();
    match sanitized.chars().next() {
        None => "Col".to_string(),
        Some(c) if c.is_ascii_digit() => format!("Col{}", sanitized),
        Some(_) => sanitized,
    }
}

/// A training column: the record field it reads and the feature key it becomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Field name in the raw records.
    pub source: String,
    /// Feature key used in vectors and on the grid.
    pub key: String,
}

/// The result of loading raw records.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Training columns in order.
    pub columns: Vec<Column>,
    /// One numeric vector per record, in record order.
    pub training_set: TrainingSet,
    /// Codebooks of the categorical columns, keyed by feature key.
    pub encoder: CategoricalEncoder,
    /// Per record, its categorical values joined with `"; "`.
    pub original_text: Vec<String>,
}

impl Dataset {
    /// Feature keys in column order.
    pub fn keys(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.key.clone()).collect()
    }
}

/// Builds [`Dataset`]s from raw records.
#[derive(Debug, Clone, Default)]
pub struct DatasetLoader {
    config: LoaderConfig,
}

impl DatasetLoader {
    /// Creates a loader with the given configuration.
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Picks the training columns: distinct field names in first-seen order,
    /// minus information columns.
    pub fn columns(&self, records: &[RawRecord]) -> Result<Vec<Column>> {
        let mut sources: Vec<&str> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !sources.contains(&key) {
                    sources.push(key);
                }
            }
        }

        let mut columns: Vec<Column> = Vec::with_capacity(sources.len());
        for source in sources {
            if self.config.is_info_column(source) {
                debug!("Skipping information column '{}'", source);
                continue;
            }
            let key = if self.config.sanitize_keys {
                sanitize_key(source)
            } else {
                source.to_string()
            };
            if let Some(other) = columns.iter().find(|c| c.key == key) {
                return Err(KohonenError::InvalidTrainingInput(format!(
                    "columns '{}' and '{}' both map to feature key '{}'",
                    other.source, source, key
                )));
            }
            columns.push(Column {
                source: source.to_string(),
                key,
            });
        }
        Ok(columns)
    }

    /// Loads every record into a numeric training set.
    pub fn load(&self, records: &[RawRecord]) -> Result<Dataset> {
        if records.is_empty() {
            return Err(KohonenError::InvalidTrainingInput(
                "no records to load".to_string(),
            ));
        }

        let columns = self.columns(records)?;
        if columns.is_empty() {
            return Err(KohonenError::InvalidTrainingInput(
                "records have no trainable columns".to_string(),
            ));
        }

        let sources: Vec<String> = columns.iter().map(|c| c.source.clone()).collect();
        let by_source = CategoricalEncoder::fit(records, &sources);

        let mut rows = Vec::with_capacity(records.len());
        let mut original_text = Vec::with_capacity(records.len());
        for record in records {
            let mut row = Vec::with_capacity(columns.len());
            let mut texts: Vec<String> = Vec::new();
            for column in &columns {
                let value = record.get(&column.source);
                match by_source.encode(&column.source, value) {
                    Some(code) => {
                        if code >= 0 {
                            if let Some(text) = by_source.decode(&column.source, code) {
                                texts.push(text.to_string());
                            }
                        }
                        row.push(code as f64);
                    }
                    None => row.push(value.map(RawValue::as_number).unwrap_or(0.0)),
                }
            }
            rows.push(row);
            original_text.push(texts.join("; "));
        }

        let keys = FeatureKeys::new(columns.iter().map(|c| c.key.clone()))?;
        let training_set = TrainingSet::new(keys, rows)?;

        let encoder = by_source.rename_keys(|source| {
            columns
                .iter()
                .find(|c| c.source == source)
                .map(|c| c.key.clone())
                .unwrap_or_else(|| source.to_string())
        });

        info!(
            "Loaded {} records: {} features ({} categorical)",
            training_set.len(),
            training_set.depth(),
            encoder.len()
        );

        Ok(Dataset {
            columns,
            training_set,
            encoder,
            original_text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::encoder::MISSING_CODE;

    const RECORDS: &str = r#"[
        {"id": 1, "Body Type": "sedan", "price ($)": 12000, "4wd": false},
        {"id": 2, "Body Type": "coupe", "price ($)": 18500.5, "4wd": true},
        {"id": 3, "Body Type": null, "price ($)": 9000},
        {"id": 4, "Body Type": "sedan", "extra": 1}
    ]"#;

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("Body Type"), "BodyType");
        assert_eq!(sanitize_key("price ($)"), "price");
        assert_eq!(sanitize_key("4wd"), "Col4wd");
        assert_eq!(sanitize_key("***"), "Col");
        assert_eq!(sanitize_key("код"), "Col");
    }

    #[test]
    fn test_read_records_preserves_order() {
        let records = read_records(RECORDS.as_bytes()).unwrap();
        assert_eq!(records.len(), 4);
        let keys: Vec<&str> = records[0].keys().collect();
        assert_eq!(keys, vec!["id", "Body Type", "price ($)", "4wd"]);
        assert_eq!(records[2].get("Body Type"), Some(&RawValue::Null));
        assert_eq!(records[1].get("4wd"), Some(&RawValue::Bool(true)));
    }

    #[test]
    fn test_columns_skip_info_and_sanitize() {
        let records = read_records(RECORDS.as_bytes()).unwrap();
        let loader = DatasetLoader::default();
        let columns = loader.columns(&records).unwrap();
        let keys: Vec<&str> = columns.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["BodyType", "price", "Col4wd", "extra"]);
    }

    #[test]
    fn test_load_encodes_records() {
        let records = read_records(RECORDS.as_bytes()).unwrap();
        let dataset = DatasetLoader::default().load(&records).unwrap();
        let set = &dataset.training_set;

        assert_eq!(set.len(), 4);
        assert_eq!(set.depth(), 4);
        assert_eq!(set.vectors()[0].values(), &[0.0, 12000.0, 0.0, 0.0]);
        assert_eq!(set.vectors()[1].values(), &[1.0, 18500.5, 1.0, 0.0]);
        assert_eq!(set.vectors()[2].values()[0], MISSING_CODE as f64);
        assert_eq!(set.vectors()[3].values(), &[0.0, 0.0, 0.0, 1.0]);

        assert_eq!(dataset.encoder.decode("BodyType", 1), Some("coupe"));
        assert_eq!(dataset.original_text, vec!["sedan", "coupe", "", "sedan"]);
    }

    #[test]
    fn test_colliding_keys_rejected() {
        let records = vec![RawRecord::new()
            .with("a b", RawValue::Number(1.0))
            .with("ab", RawValue::Number(2.0))];
        let result = DatasetLoader::default().load(&records);
        assert!(matches!(result, Err(KohonenError::InvalidTrainingInput(_))));
    }

    #[test]
    fn test_empty_inputs_rejected() {
        let loader = DatasetLoader::default();
        assert!(loader.load(&[]).is_err());

        let only_ids = vec![RawRecord::new().with("ID", RawValue::Number(1.0))];
        assert!(loader.load(&only_ids).is_err());
    }

    #[test]
    fn test_unsanitized_keys() {
        let loader = DatasetLoader::new(LoaderConfig {
            info_columns: Vec::new(),
            sanitize_keys: false,
        });
        let records = read_records(RECORDS.as_bytes()).unwrap();
        let dataset = loader.load(&records).unwrap();
        assert_eq!(dataset.keys()[0], "id");
        assert_eq!(dataset.keys()[1], "Body Type");
    }
}
