//! Categorical encoding of text-valued features.
//!
//! Each categorical column gets a [`Codebook`]: distinct text values in
//! first-seen order, coded `0, 1, 2, ...`. The codebooks travel with the
//! trained grid so prototype values can be read back as the nearest label.

use crate::data::loader::{RawRecord, RawValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Code assigned to a missing or unrecognized categorical value.
pub const MISSING_CODE: i64 = -1;

/// Bijection between the text values of one feature and integer codes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Codebook {
    labels: Vec<String>,
    codes: HashMap<String, i64>,
}

impl Codebook {
    /// Builds a codebook, keeping the first occurrence of each value.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut book = Self::default();
        for value in values {
            let value = value.into();
            if !book.codes.contains_key(&value) {
                book.codes.insert(value.clone(), book.labels.len() as i64);
                book.labels.push(value);
            }
        }
        book
    }

    /// Number of distinct values.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns true if the codebook is empty.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Code for `text`, if it is known.
    pub fn code(&self, text: &str) -> Option<i64> {
        self.codes.get(text).copied()
    }

    /// Code for `text`, or [`MISSING_CODE`].
    pub fn encode(&self, text: Option<&str>) -> i64 {
        text.and_then(|t| self.code(t)).unwrap_or(MISSING_CODE)
    }

    /// Text for `code`, if it was assigned.
    pub fn label(&self, code: i64) -> Option<&str> {
        usize::try_from(code)
            .ok()
            .and_then(|i| self.labels.get(i))
            .map(String::as_str)
    }

    /// Label whose code is nearest to `value`; ties go to the lower code.
    pub fn nearest_label(&self, value: f64) -> Option<&str> {
        let mut best: Option<(usize, f64)> = None;
        for i in 0..self.labels.len() {
            let d = (i as f64 - value).abs();
            match best {
                Some((_, bd)) if d >= bd => {}
                _ => best = Some((i, d)),
            }
        }
        best.map(|(i, _)| self.labels[i].as_str())
    }

    /// Iterates over `(code, text)` pairs in code order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, &str)> {
        self.labels
            .iter()
            .enumerate()
            .map(|(i, l)| (i as i64, l.as_str()))
    }
}

impl From<Vec<String>> for Codebook {
    fn from(labels: Vec<String>) -> Self {
        Self::from_values(labels)
    }
}

impl From<Codebook> for Vec<String> {
    fn from(book: Codebook) -> Self {
        book.labels
    }
}

/// One row of a text mapping listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMapping {
    /// Feature key.
    pub feature: String,
    /// Original text value.
    pub text: String,
    /// Numeric code used in training.
    pub code: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CategoricalColumn {
    key: String,
    codebook: Codebook,
}

/// Per-feature codebooks for every categorical column of a data set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    columns: Vec<CategoricalColumn>,
}

impl CategoricalEncoder {
    /// Creates an encoder with no categorical columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds codebooks for every column in `columns` whose non-null values
    /// include at least one text value.
    ///
    /// All non-null values of such a column, numbers included, are coded by
    /// their text rendering.
    pub fn fit(records: &[RawRecord], columns: &[String]) -> Self {
        let mut encoder = Self::new();
        for column in columns {
            let values: Vec<&RawValue> = records
                .iter()
                .filter_map(|r| r.get(column))
                .filter(|v| !v.is_null())
                .collect();

            if values.iter().any(|v| v.is_text()) {
                let codebook = Codebook::from_values(values.iter().filter_map(|v| v.to_text()));
                encoder.insert(column.clone(), codebook);
            }
        }
        encoder
    }

    /// Adds or replaces the codebook of `key`.
    pub fn insert(&mut self, key: impl Into<String>, codebook: Codebook) {
        let key = key.into();
        match self.columns.iter_mut().find(|c| c.key == key) {
            Some(column) => column.codebook = codebook,
            None => self.columns.push(CategoricalColumn { key, codebook }),
        }
    }

    /// Returns true if `key` is categorical.
    pub fn is_categorical(&self, key: &str) -> bool {
        self.codebook(key).is_some()
    }

    /// The codebook of `key`.
    pub fn codebook(&self, key: &str) -> Option<&Codebook> {
        self.columns
            .iter()
            .find(|c| c.key == key)
            .map(|c| &c.codebook)
    }

    /// Number of categorical columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if no column is categorical.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Categorical keys in column order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.key.as_str())
    }

    /// Encodes `value` for `key`, or None when `key` is not categorical.
    pub fn encode(&self, key: &str, value: Option<&RawValue>) -> Option<i64> {
        let text = value.and_then(RawValue::to_text);
        self.codebook(key).map(|book| book.encode(text.as_deref()))
    }

    /// Text originally coded as `code` in `key`.
    pub fn decode(&self, key: &str, code: i64) -> Option<&str> {
        self.codebook(key).and_then(|book| book.label(code))
    }

    /// Nearest label to a (possibly fractional) trained value of `key`.
    pub fn nearest_label(&self, key: &str, value: f64) -> Option<&str> {
        self.codebook(key).and_then(|book| book.nearest_label(value))
    }

    /// Renames every column key through `rename`.
    pub fn rename_keys(mut self, rename: impl Fn(&str) -> String) -> Self {
        for column in &mut self.columns {
            column.key = rename(&column.key);
        }
        self
    }

    /// Every `(feature, text, code)` row, column by column.
    pub fn text_mappings(&self) -> Vec<TextMapping> {
        self.columns
            .iter()
            .flat_map(|c| {
                c.codebook.iter().map(move |(code, text)| TextMapping {
                    feature: c.key.clone(),
                    text: text.to_string(),
                    code,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<RawRecord> {
        vec![
            RawRecord::new()
                .with("color", RawValue::Text("red".into()))
                .with("size", RawValue::Number(3.0)),
            RawRecord::new()
                .with("color", RawValue::Text("blue".into()))
                .with("size", RawValue::Number(5.0)),
            RawRecord::new()
                .with("color", RawValue::Text("red".into()))
                .with("size", RawValue::Null),
            RawRecord::new().with("color", RawValue::Number(7.0)),
        ]
    }

    #[test]
    fn test_codes_in_first_seen_order() {
        let book = Codebook::from_values(["b", "a", "b", "c"]);
        assert_eq!(book.len(), 3);
        assert_eq!(book.code("b"), Some(0));
        assert_eq!(book.code("a"), Some(1));
        assert_eq!(book.code("c"), Some(2));
    }

    #[test]
    fn test_round_trip_is_bijective() {
        let book = Codebook::from_values(["north", "south", "east", "west", "south"]);
        let mut seen = std::collections::HashSet::new();
        for (code, text) in book.iter() {
            assert_eq!(book.label(code), Some(text));
            assert_eq!(book.code(text), Some(code));
            assert!(seen.insert(text.to_string()));
        }
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_missing_and_unknown_get_sentinel() {
        let book = Codebook::from_values(["x"]);
        assert_eq!(book.encode(None), MISSING_CODE);
        assert_eq!(book.encode(Some("y")), MISSING_CODE);
        assert_eq!(book.label(MISSING_CODE), None);
    }

    #[test]
    fn test_nearest_label() {
        let book = Codebook::from_values(["low", "mid", "high"]);
        assert_eq!(book.nearest_label(0.2), Some("low"));
        assert_eq!(book.nearest_label(1.6), Some("high"));
        assert_eq!(book.nearest_label(0.5), Some("low"));
        assert_eq!(book.nearest_label(-3.0), Some("low"));
        assert_eq!(Codebook::default().nearest_label(1.0), None);
    }

    #[test]
    fn test_fit_detects_text_columns() {
        let recs = records();
        let encoder = CategoricalEncoder::fit(&recs, &["color".to_string(), "size".to_string()]);
        assert!(encoder.is_categorical("color"));
        assert!(!encoder.is_categorical("size"));

        let book = encoder.codebook("color").unwrap();
        assert_eq!(book.len(), 3);
        assert_eq!(book.code("7"), Some(2));
    }

    #[test]
    fn test_encode() {
        let recs = records();
        let encoder = CategoricalEncoder::fit(&recs, &["color".to_string()]);
        assert_eq!(
            encoder.encode("color", Some(&RawValue::Text("blue".into()))),
            Some(1)
        );
        assert_eq!(encoder.encode("color", None), Some(MISSING_CODE));
        assert_eq!(encoder.encode("size", Some(&RawValue::Number(1.0))), None);
    }

    #[test]
    fn test_rename_and_mappings() {
        let recs = records();
        let encoder = CategoricalEncoder::fit(&recs, &["color".to_string()])
            .rename_keys(|k| k.to_uppercase());
        assert_eq!(encoder.decode("COLOR", 0), Some("red"));

        let rows = encoder.text_mappings();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].feature, "COLOR");
        assert_eq!(rows[1].text, "blue");
        assert_eq!(rows[1].code, 1);
    }

    #[test]
    fn test_codebook_serde_rebuilds_codes() {
        let book = Codebook::from_values(["a", "b"]);
        let json = serde_json::to_string(&book).unwrap();
        assert_eq!(json, r#"["a","b"]"#);
        let back: Codebook = serde_json::from_str(&json).unwrap();
        assert_eq!(back.code("b"), Some(1));
    }
}
