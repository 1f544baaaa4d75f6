use gridseek_vector::{IndexStrategy, PartitionParams, VectorIndex};
use proptest::prelude::*;

fn vectors(dim: usize) -> impl Strategy<Value = Vec<Vec<f32>>> {
    prop::collection::vec(prop::collection::vec(-10.0f32..10.0, dim), 0..60)
}

proptest! {
    #[test]
    fn exact_search_is_sorted_and_bounded(data in vectors(3), q in prop::collection::vec(-10.0f32..10.0, 3), k in 0usize..20) {
        let mut index = VectorIndex::build(IndexStrategy::Exact, 3).unwrap();
        let ids: Vec<u64> = (0..data.len() as u64).collect();
        index.insert_all(&data, &ids).unwrap();
        let hits = index.search(&q, k).unwrap();
        prop_assert_eq!(hits.len(), k.min(data.len()));
        for pair in hits.windows(2) {
            prop_assert!(pair[0].distance < pair[1].distance || (pair[0].distance == pair[1].distance && pair[0].id < pair[1].id));
        }
    }

    #[test]
    fn partitioned_search_returns_min_k_n(data in vectors(4), q in prop::collection::vec(-10.0f32..10.0, 4), k in 1usize..30) {
        let params = PartitionParams { partitions: 16, probes: 1, ..PartitionParams::default() };
        let mut index = VectorIndex::build(IndexStrategy::Partitioned(params), 4).unwrap();
        let ids: Vec<u64> = (0..data.len() as u64).collect();
        index.insert_all(&data, &ids).unwrap();
        prop_assert_eq!(index.search(&q, k).unwrap().len(), k.min(data.len()));
        if let Some(eff) = index.effective_partitions() {
            prop_assert!(eff >= 1 && eff <= 16.min(data.len().max(1)));
        }
    }
}
