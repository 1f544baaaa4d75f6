use gridseek_core::traits::Embedder;
use gridseek_embed::{get_default_embedder, EmbedSettings};

#[test]
fn default_embedder_shapes_and_determinism() {
    let embedder = get_default_embedder(&EmbedSettings::default()).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 384, "embedding dim is 384");
    assert_eq!(embedder.dim(), 384);

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Deterministic for same input
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn batch_matches_single_calls() {
    let embedder = get_default_embedder(&EmbedSettings { dimension: 32, ..EmbedSettings::default() }).expect("embedder");
    let texts: Vec<String> = ["Energy source: wind", "Energy source: solar", ""].iter().map(|s| s.to_string()).collect();
    let batch = embedder.embed_batch(&texts).expect("batch");
    for (text, vector) in texts.iter().zip(&batch) {
        assert_eq!(&embedder.embed(text).expect("single"), vector);
    }
    assert!(batch[2].iter().all(|x| *x == 0.0), "empty text embeds to the zero vector");
}

#[test]
fn settings_deserialize_with_defaults() {
    let settings: EmbedSettings = serde_json::from_str(r#"{"dimension": 128}"#).expect("settings");
    assert_eq!(settings.model, "hashing");
    assert_eq!(settings.dimension, 128);
}
