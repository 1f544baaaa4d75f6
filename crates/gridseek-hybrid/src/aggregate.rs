use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use gridseek_core::types::{AttrValue, RecordId, RetrievalResult};

/// Group for results that lack the group-by attribute.
pub const UNKNOWN_GROUP: &str = "Unknown";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub count: usize,
    /// Sum of the numeric values of the summed attribute; missing or
    /// non-numeric values are skipped but still counted.
    pub sum: f64,
    pub ids: Vec<RecordId>,
    /// Mean of `similarity_score`; boosts do not move it.
    pub mean_score: f32,
}

fn group_key(value: Option<&AttrValue>) -> String {
    match value {
        Some(AttrValue::Text(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(v @ AttrValue::Number(_)) => v.to_string(),
        _ => UNKNOWN_GROUP.to_string(),
    }
}

pub fn aggregate(results: &[RetrievalResult], group_by: &str, sum_attribute: &str) -> BTreeMap<String, GroupSummary> {
    let mut groups: BTreeMap<String, GroupSummary> = BTreeMap::new();
    let mut score_totals: BTreeMap<String, f32> = BTreeMap::new();
    for r in results {
        let key = group_key(r.attributes.get(group_by));
        let group = groups.entry(key.clone()).or_default();
        group.count += 1;
        group.ids.push(r.record_id);
        if let Some(v) = r.attributes.get(sum_attribute).and_then(AttrValue::as_f64) { group.sum += v; }
        *score_totals.entry(key).or_default() += r.similarity_score;
    }
    for (key, group) in groups.iter_mut() {
        group.mean_score = score_totals.get(key).copied().unwrap_or_default() / group.count as f32;
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridseek_core::types::Attributes;

    fn result(id: u64, source_type: Option<&str>, power: Option<f64>, score: f32) -> RetrievalResult {
        let mut attributes = Attributes::new();
        if let Some(s) = source_type { attributes.insert("source_type".into(), s.into()); }
        attributes.insert("power_installed".into(), power.into());
        RetrievalResult { record_id: id, attributes, raw_distance: 0.0, similarity_score: score, rank: 1, boosted_score: None }
    }

    #[test]
    fn null_power_is_counted_but_not_summed() {
        let results = vec![
            result(1, Some("solar"), Some(5.0), 1.0),
            result(2, Some("solar"), None, 0.5),
            result(3, Some("solar"), Some(10.0), 0.0),
        ];
        let groups = aggregate(&results, "source_type", "power_installed");
        let solar = &groups["solar"];
        assert_eq!(solar.count, 3);
        assert_eq!(solar.sum, 15.0);
        assert_eq!(solar.ids, vec![1, 2, 3]);
        assert!((solar.mean_score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn mean_score_ignores_boosts() {
        let mut boosted = result(1, Some("wind"), Some(1.0), 0.4);
        boosted.boosted_score = Some(0.8);
        let groups = aggregate(&[boosted, result(2, Some("wind"), Some(1.0), 0.2)], "source_type", "power_installed");
        assert!((groups["wind"].mean_score - 0.3).abs() < 1e-6);
    }

    #[test]
    fn missing_group_attribute_goes_to_unknown() {
        let results = vec![result(1, None, Some(2.0), 1.0), result(2, Some("wind"), Some(3.0), 1.0), result(3, Some("  "), None, 1.0)];
        let groups = aggregate(&results, "source_type", "power_installed");
        assert_eq!(groups[UNKNOWN_GROUP].count, 2);
        assert_eq!(groups[UNKNOWN_GROUP].sum, 2.0);
        assert_eq!(groups["wind"].ids, vec![2]);
    }

    #[test]
    fn empty_input() {
        assert!(aggregate(&[], "source_type", "power_installed").is_empty());
    }
}
