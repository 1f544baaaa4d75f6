use gridseek_embed::{char_trigrams, l2_norm, l2_normalize, tokenize};

#[test]
fn l2_normalize_basic() {
    let mut v = [1.0f32, 2.0, 3.0, 4.0];
    l2_normalize(&mut v);
    let norm: f32 = (1.0f32 * 1.0 + 2.0 * 2.0 + 3.0 * 3.0 + 4.0 * 4.0).sqrt();
    let expected = [1.0 / norm, 2.0 / norm, 3.0 / norm, 4.0 / norm];
    for (a, b) in v.iter().cloned().zip(expected) {
        assert!((a - b).abs() < 1e-5, "a={} b={}", a, b);
    }
    assert!((l2_norm(&v) - 1.0).abs() < 1e-5);
}

#[test]
fn l2_normalize_leaves_zero_vector() {
    let mut v = [0.0f32; 4];
    l2_normalize(&mut v);
    assert_eq!(v, [0.0; 4]);
}

#[test]
fn tokenize_and_trigrams() {
    assert_eq!(tokenize("Putere: 12,5 MW; Eolian-Nord"), vec!["putere", "12", "5", "mw", "eolian", "nord"]);
    assert_eq!(char_trigrams("wind"), vec!["#wi", "win", "ind", "nd#"]);
    assert_eq!(char_trigrams("a"), vec!["#a#"]);
}
