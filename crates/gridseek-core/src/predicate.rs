//! Metadata predicates evaluated against attribute records.
//!
//! A predicate maps attribute names to a [`Condition`]. Its JSON form mirrors
//! the filter dictionaries accepted by callers:
//!
//! ```json
//! { "source_type": "wind", "region": ["north", "east"], "power": { "min": 5, "max": 50 } }
//! ```
//!
//! Every condition must hold. A missing attribute fails any condition; an empty
//! predicate matches everything.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{AttrValue, Attributes};

/// Inclusive numeric bounds; either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NumericRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl NumericRange {
    pub fn contains(&self, value: f64) -> bool {
        if value.is_nan() { return false; }
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Range(NumericRange),
    OneOf(Vec<AttrValue>),
    Equals(AttrValue),
}

impl Condition {
    pub fn accepts(&self, value: &AttrValue) -> bool {
        match self {
            Self::Equals(expected) => value == expected,
            Self::OneOf(allowed) => allowed.iter().any(|a| a == value),
            Self::Range(range) => value.as_f64().is_some_and(|v| range.contains(v)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Predicate {
    conditions: BTreeMap<String, Condition>,
}

impl Predicate {
    pub fn new() -> Self { Self::default() }

    pub fn equals(mut self, attribute: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.conditions.insert(attribute.into(), Condition::Equals(value.into()));
        self
    }

    pub fn one_of<V: Into<AttrValue>>(mut self, attribute: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.conditions.insert(attribute.into(), Condition::OneOf(values));
        self
    }

    pub fn range(mut self, attribute: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        self.conditions.insert(attribute.into(), Condition::Range(NumericRange { min, max }));
        self
    }

    pub fn is_empty(&self) -> bool { self.conditions.is_empty() }

    pub fn len(&self) -> usize { self.conditions.len() }

    pub fn conditions(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.conditions.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn matches(&self, attributes: &Attributes) -> bool {
        self.conditions
            .iter()
            .all(|(name, condition)| attributes.get(name).is_some_and(|value| condition.accepts(value)))
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> { serde_json::from_str(s) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, AttrValue)]) -> Attributes {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn exact_set_and_range_conditions() {
        let a = attrs(&[("source_type", "wind".into()), ("power", 12.0.into())]);
        assert!(Predicate::new().equals("source_type", "wind").matches(&a));
        assert!(!Predicate::new().equals("source_type", "solar").matches(&a));
        assert!(Predicate::new().one_of("source_type", ["solar", "wind"]).matches(&a));
        assert!(Predicate::new().range("power", Some(10.0), Some(12.0)).matches(&a));
        assert!(!Predicate::new().range("power", Some(12.5), None).matches(&a));
    }

    #[test]
    fn missing_or_non_numeric_attribute_never_matches() {
        let a = attrs(&[("source_type", "wind".into()), ("power", AttrValue::Null)]);
        assert!(!Predicate::new().equals("region", "north").matches(&a));
        assert!(!Predicate::new().range("power", None, None).matches(&a));
        assert!(!Predicate::new().range("source_type", Some(0.0), None).matches(&a));
    }

    #[test]
    fn empty_predicate_matches_everything() {
        assert!(Predicate::new().matches(&Attributes::new()));
    }

    #[test]
    fn parses_filter_json() {
        let p = Predicate::from_json(r#"{"source_type":"wind","region":["n","e"],"power":{"min":5}}"#).expect("parse");
        assert_eq!(p.len(), 3);
        let a = attrs(&[("source_type", "wind".into()), ("region", "e".into()), ("power", 5.0.into())]);
        assert!(p.matches(&a));
        let conds: Vec<_> = p.conditions().map(|(k, _)| k).collect();
        assert_eq!(conds, vec!["power", "region", "source_type"]);
    }

    #[test]
    fn rejects_unknown_range_keys() {
        assert!(Predicate::from_json(r#"{"power":{"foo":1}}"#).is_err());
    }
}
