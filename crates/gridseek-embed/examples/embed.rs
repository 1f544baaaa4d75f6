use gridseek_core::traits::Embedder;
use gridseek_embed::{get_default_embedder, EmbedSettings};

fn main() -> anyhow::Result<()> {
    let embedder = get_default_embedder(&EmbedSettings::default())?;
    let texts = vec!["Energy source: wind".to_string(), "Energy source: solar".to_string()];
    let embs = embedder.embed_batch(&texts)?;
    println!("B={} dim={} id={}", embs.len(), embedder.dim(), embedder.embedder_id());
    Ok(())
}
