/// Lowercased alphanumeric words; everything else separates tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Character trigrams of a token padded with `#`, e.g. `#wi`, `win`, `ind`, `nd#`.
pub fn char_trigrams(token: &str) -> Vec<String> {
    let padded: Vec<char> = std::iter::once('#').chain(token.chars()).chain(std::iter::once('#')).collect();
    if padded.len() < 3 { return vec![padded.iter().collect()]; }
    padded.windows(3).map(|w| w.iter().collect()).collect()
}

/// Token ids and attention masks for `texts`, each truncated or padded to
/// `max_len`, flattened row-major.
#[cfg(feature = "candle")]
pub fn encode_padded(
    tokenizer: &tokenizers::Tokenizer,
    texts: &[String],
    max_len: usize,
    pad_id: u32,
) -> anyhow::Result<(Vec<u32>, Vec<u32>)> {
    let mut ids = Vec::with_capacity(texts.len() * max_len);
    let mut mask = Vec::with_capacity(texts.len() * max_len);
    for text in texts {
        let enc = tokenizer.encode(text.as_str(), true).map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;
        let n = enc.get_ids().len().min(max_len);
        ids.extend_from_slice(&enc.get_ids()[..n]);
        mask.extend_from_slice(&enc.get_attention_mask()[..n]);
        ids.extend(std::iter::repeat(pad_id).take(max_len - n));
        mask.extend(std::iter::repeat(0).take(max_len - n));
    }
    Ok((ids, mask))
}
