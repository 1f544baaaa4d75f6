use gridseek_core::predicate::Predicate;
use gridseek_core::types::{Attributes, DISPLAY_TEXT, SOURCE_COLLECTION, SOURCE_LOCATION};
use gridseek_hybrid::{HybridRetriever, RetrieverOptions, ScoreNormalizer};
use gridseek_vector::IndexStrategy;
use proptest::prelude::*;

const SOURCES: [&str; 3] = ["wind", "solar", "hydro"];

fn record(v: Vec<f32>, source: usize) -> (Vec<f32>, Attributes) {
    let mut a = Attributes::new();
    a.insert(SOURCE_COLLECTION.into(), "plants".into());
    a.insert(SOURCE_LOCATION.into(), "generated".into());
    a.insert(DISPLAY_TEXT.into(), SOURCES[source].into());
    a.insert("source_type".into(), SOURCES[source].into());
    (v, a)
}

fn corpus() -> impl Strategy<Value = Vec<(Vec<f32>, usize)>> {
    prop::collection::vec((prop::collection::vec(-5.0f32..5.0, 3), 0usize..3), 0..40)
}

fn normalizer() -> impl Strategy<Value = ScoreNormalizer> {
    prop_oneof![Just(ScoreNormalizer::Reciprocal), Just(ScoreNormalizer::MinMax), Just(ScoreNormalizer::Rank)]
}

fn retriever(data: Vec<(Vec<f32>, usize)>, normalizer: ScoreNormalizer) -> HybridRetriever {
    let r = HybridRetriever::new(RetrieverOptions { normalizer, ..RetrieverOptions::default() });
    r.build(IndexStrategy::Exact, 3, "prop").unwrap();
    r.insert(data.into_iter().map(|(v, s)| record(v, s)).collect()).unwrap();
    r
}

proptest! {
    #[test]
    fn scores_bounded_ordered_and_at_most_k(
        data in corpus(),
        q in prop::collection::vec(-5.0f32..5.0, 3),
        k in 0usize..15,
        norm in normalizer(),
    ) {
        let n = data.len();
        let results = retriever(data, norm).retrieve(&q, k, None, None).unwrap();
        prop_assert_eq!(results.len(), k.min(n));
        for (i, r) in results.iter().enumerate() {
            prop_assert!(r.similarity_score > 0.0 && r.similarity_score <= 1.0);
            prop_assert_eq!(r.rank, i + 1);
        }
        for w in results.windows(2) {
            prop_assert!(w[0].similarity_score > w[1].similarity_score
                || (w[0].similarity_score == w[1].similarity_score && w[0].record_id < w[1].record_id));
        }
    }

    #[test]
    fn predicate_is_sound(
        data in corpus(),
        q in prop::collection::vec(-5.0f32..5.0, 3),
        k in 1usize..10,
        wanted in 0usize..3,
    ) {
        let predicate = Predicate::new().equals("source_type", SOURCES[wanted]);
        let results = retriever(data, ScoreNormalizer::Reciprocal).retrieve(&q, k, Some(&predicate), None).unwrap();
        prop_assert!(results.len() <= k);
        prop_assert!(results.iter().all(|r| r.attributes["source_type"].as_str() == Some(SOURCES[wanted])));
    }

    #[test]
    fn min_similarity_is_a_floor(data in corpus(), q in prop::collection::vec(-5.0f32..5.0, 3), floor in 0.0f32..1.0) {
        let results = retriever(data, ScoreNormalizer::Reciprocal).retrieve(&q, 10, None, Some(floor)).unwrap();
        prop_assert!(results.iter().all(|r| r.similarity_score >= floor));
    }
}
