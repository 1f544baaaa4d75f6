use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    let dir = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("dev_data/index"));
    let manifest = gridseek_vector::persist::read_manifest(&dir)?;
    println!("index: {}", dir.display());
    println!("  records={} dimension={} next_id={}", manifest.record_count, manifest.dimension, manifest.next_id);
    println!("  strategy={}", serde_json::to_string(&manifest.strategy)?);
    println!("  embedder={} created={}", manifest.embedder_id, manifest.created_at);
    println!("  files={} {}", manifest.blob_file, manifest.attributes_file);
    if let Some(p) = manifest.effective_partitions { println!("  effective_partitions={}", p); }
    Ok(())
}
