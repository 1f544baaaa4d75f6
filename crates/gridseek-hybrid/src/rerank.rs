use std::collections::BTreeMap;

use gridseek_core::types::RetrievalResult;

/// Multiply each result's score by `factor` for every boost attribute it
/// carries with a non-empty value, then re-sort by the boosted score (ties by
/// ascending id) and reassign ranks. `similarity_score` is left untouched.
pub fn apply_boosts(results: &mut [RetrievalResult], boosts: &BTreeMap<String, f32>) {
    if boosts.is_empty() { return; }
    for r in results.iter_mut() {
        let factor: f32 = boosts
            .iter()
            .filter(|(attribute, _)| r.attributes.get(attribute.as_str()).is_some_and(|v| v.is_truthy()))
            .map(|(_, factor)| *factor)
            .product();
        r.boosted_score = Some(r.similarity_score * factor);
    }
    results.sort_by(|a, b| b.effective_score().total_cmp(&a.effective_score()).then(a.record_id.cmp(&b.record_id)));
    for (i, r) in results.iter_mut().enumerate() { r.rank = i + 1; }
}
