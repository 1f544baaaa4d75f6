use std::collections::HashMap;

use gridseek_core::predicate::Predicate;
use gridseek_core::types::{Attributes, RecordId};

/// Record id -> attribute record.
#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    records: HashMap<RecordId, Attributes>,
}

impl MetadataStore {
    pub fn new() -> Self { Self::default() }

    pub fn put(&mut self, id: RecordId, attributes: Attributes) { self.records.insert(id, attributes); }

    pub fn get(&self, id: RecordId) -> Option<&Attributes> { self.records.get(&id) }

    /// An unknown id only satisfies the empty predicate.
    pub fn matches(&self, id: RecordId, predicate: &Predicate) -> bool {
        match self.records.get(&id) {
            Some(attributes) => predicate.matches(attributes),
            None => predicate.is_empty(),
        }
    }

    pub fn len(&self) -> usize { self.records.len() }
    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    /// Records ordered by id.
    pub fn iter_sorted(&self) -> impl Iterator<Item = (RecordId, &Attributes)> {
        let mut ids: Vec<RecordId> = self.records.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter().filter_map(move |id| self.records.get(&id).map(|a| (id, a)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridseek_core::types::AttrValue;

    fn attrs(source_type: &str, power: Option<f64>) -> Attributes {
        let mut a = Attributes::new();
        a.insert("source_type".into(), source_type.into());
        a.insert("power_installed".into(), power.into());
        a
    }

    #[test]
    fn predicate_evaluation() {
        let mut store = MetadataStore::new();
        store.put(1, attrs("wind", Some(12.0)));
        store.put(2, attrs("solar", None));
        let wind = Predicate::new().equals("source_type", "wind");
        assert!(store.matches(1, &wind));
        assert!(!store.matches(2, &wind));
        let big = Predicate::new().range("power_installed", Some(10.0), None);
        assert!(store.matches(1, &big));
        assert!(!store.matches(2, &big), "null never satisfies a range");
        assert!(store.matches(2, &Predicate::new()));
    }

    #[test]
    fn unknown_ids() {
        let store = MetadataStore::new();
        assert!(store.get(9).is_none());
        assert!(store.matches(9, &Predicate::new()));
        assert!(!store.matches(9, &Predicate::new().equals("source_type", "wind")));
    }

    #[test]
    fn put_replaces_and_iterates_in_id_order() {
        let mut store = MetadataStore::new();
        store.put(5, attrs("hydro", None));
        store.put(2, attrs("wind", None));
        store.put(5, attrs("solar", None));
        let order: Vec<_> = store.iter_sorted().map(|(id, a)| (id, a["source_type"].clone())).collect();
        assert_eq!(order, vec![(2, AttrValue::from("wind")), (5, AttrValue::from("solar"))]);
    }
}
