//! Domain types shared by the index, the retriever and their collaborators.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type RecordId = u64;

/// Attribute name -> scalar. Ordered so renderings and persisted tables are stable.
pub type Attributes = BTreeMap<String, AttrValue>;

pub const SOURCE_COLLECTION: &str = "source_collection";
pub const SOURCE_LOCATION: &str = "source_location";
pub const DISPLAY_TEXT: &str = "display_text";

/// Provenance fields every indexed record must carry.
pub const PROVENANCE_FIELDS: [&str; 3] = [SOURCE_COLLECTION, SOURCE_LOCATION, DISPLAY_TEXT];

/// A scalar attribute value: string, number or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    Text(String),
    Null,
}

impl AttrValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool { matches!(self, Self::Null) }

    /// Present and non-empty: non-null, non-blank text, non-zero number.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Text(s) => !s.trim().is_empty(),
            Self::Null => false,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Null => f.write_str("null"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self { Self::Text(value.to_string()) }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self { Self::Text(value) }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self { Self::Number(value) }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self { Self::Number(value as f64) }
}

impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
    fn from(value: Option<T>) -> Self { value.map_or(Self::Null, Into::into) }
}

/// Names of provenance fields absent from `attributes`.
pub fn missing_provenance(attributes: &Attributes) -> Vec<&'static str> {
    PROVENANCE_FIELDS
        .iter()
        .copied()
        .filter(|field| attributes.get(*field).map_or(true, AttrValue::is_null))
        .collect()
}

/// One record handed over by a data loader: the normalized text to embed
/// plus its attribute record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub text: String,
    pub attributes: Attributes,
}

impl SourceRecord {
    pub fn new(text: impl Into<String>, attributes: Attributes) -> Self {
        Self { text: text.into(), attributes }
    }
}

/// A ranked hit returned to the answer generator.
///
/// - `raw_distance`: squared L2 distance reported by the index
/// - `similarity_score`: normalized score in `(0, 1]`, higher is better
/// - `rank`: 1-based position in the returned list
/// - `boosted_score`: set only after boost reranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub record_id: RecordId,
    pub attributes: Attributes,
    pub raw_distance: f32,
    pub similarity_score: f32,
    pub rank: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boosted_score: Option<f32>,
}

impl RetrievalResult {
    pub fn display_text(&self) -> &str {
        self.attributes.get(DISPLAY_TEXT).and_then(AttrValue::as_str).unwrap_or("")
    }

    /// Provenance rendered as `collection @ location`.
    pub fn provenance(&self) -> String {
        let collection = self.attributes.get(SOURCE_COLLECTION).map(ToString::to_string).unwrap_or_default();
        let location = self.attributes.get(SOURCE_LOCATION).map(ToString::to_string).unwrap_or_default();
        format!("{collection} @ {location}")
    }

    /// Score used for ordering: boosted when reranked, otherwise the similarity score.
    pub fn effective_score(&self) -> f32 { self.boosted_score.unwrap_or(self.similarity_score) }
}
