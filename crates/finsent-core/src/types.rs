//! Core type definitions shared across the pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{Error, Result};

/// Label names used when a checkpoint carries no label map.
pub const DEFAULT_LABELS: [&str; 3] = ["negative", "neutral", "positive"];

/// A raw news row as found in the input CSV (`text,label`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawRow {
    pub text: String,
    pub label: String,
}

impl RawRow {
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

/// A cleaned row with its label replaced by the label index.
///
/// Serialized with the `clean_news,label_encoded` header of the encoded CSV.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncodedRow {
    #[serde(rename = "clean_news")]
    pub text: String,
    #[serde(rename = "label_encoded")]
    pub label: usize,
}

impl EncodedRow {
    pub fn new(text: impl Into<String>, label: usize) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }
}

/// An encoded row that remembers its position in the source table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabeledExample {
    /// Zero-based row index in the encoded CSV
    pub row: usize,
    pub text: String,
    pub label: usize,
}

/// Ordered mapping between label strings and integer indices.
///
/// Indices are positions in the sorted list of distinct labels, so the
/// standard sentiment labels map to `negative=0, neutral=1, positive=2`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct LabelMap {
    labels: Vec<String>,
}

impl LabelMap {
    /// Fits the mapping over every label in `labels`.
    pub fn fit<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let distinct: BTreeSet<String> = labels
            .into_iter()
            .map(|l| l.as_ref().to_string())
            .collect();

        Self {
            labels: distinct.into_iter().collect(),
        }
    }

    pub fn encode(&self, label: &str) -> Result<usize> {
        self.labels
            .iter()
            .position(|l| l == label)
            .ok_or_else(|| Error::NotFound(format!("Unknown label: {label}")))
    }

    pub fn decode(&self, index: usize) -> Result<&str> {
        self.labels
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "Label index {index} out of range (num labels: {})",
                    self.labels.len()
                ))
            })
    }

    pub fn names(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for LabelMap {
    fn default() -> Self {
        Self {
            labels: DEFAULT_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

impl std::fmt::Display for LabelMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pairs: Vec<String> = self
            .labels
            .iter()
            .enumerate()
            .map(|(i, l)| format!("{l}: {i}"))
            .collect();
        write!(f, "{{{}}}", pairs.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_sorts_labels() {
        let map = LabelMap::fit(["positive", "negative", "neutral", "negative"]);
        assert_eq!(map.names(), &["negative", "neutral", "positive"]);
        assert_eq!(map.encode("negative").unwrap(), 0);
        assert_eq!(map.encode("neutral").unwrap(), 1);
        assert_eq!(map.encode("positive").unwrap(), 2);
    }

    #[test]
    fn test_label_map_is_bijective() {
        let labels = ["bullish", "bearish", "flat", "bullish", "flat"];
        let map = LabelMap::fit(labels);
        for label in labels {
            let index = map.encode(label).unwrap();
            assert_eq!(map.decode(index).unwrap(), label);
        }
        for index in 0..map.len() {
            let label = map.decode(index).unwrap();
            assert_eq!(map.encode(label).unwrap(), index);
        }
    }

    #[test]
    fn test_unknown_label_and_index() {
        let map = LabelMap::default();
        assert!(map.encode("mixed").is_err());
        assert!(map.decode(3).is_err());
    }

    #[test]
    fn test_default_matches_fit_of_standard_labels() {
        let fitted = LabelMap::fit(["neutral", "positive", "negative"]);
        assert_eq!(fitted, LabelMap::default());
    }

    #[test]
    fn test_label_map_serializes_as_list() {
        let json = serde_json::to_string(&LabelMap::default()).unwrap();
        assert_eq!(json, r#"["negative","neutral","positive"]"#);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            LabelMap::default().to_string(),
            "{negative: 0, neutral: 1, positive: 2}"
        );
    }
}
