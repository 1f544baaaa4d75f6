use std::path::PathBuf;

use gridseek_core::types::{Attributes, DISPLAY_TEXT, SOURCE_COLLECTION, SOURCE_LOCATION};
use gridseek_vector::{RecordIndex, StrategyPolicy};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn main() -> anyhow::Result<()> {
    // Usage: train_build [out_dir] [count] [dim]
    let args: Vec<String> = std::env::args().collect();
    let out = args.get(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("dev_data/index"));
    let count: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(20_000);
    let dim: usize = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(64);

    let policy = StrategyPolicy::default();
    let strategy = policy.select(count);
    println!("Training params: count={} dim={} strategy={:?}", count, dim, strategy);

    let mut rng = StdRng::seed_from_u64(policy.seed);
    let records = (0..count)
        .map(|i| {
            let v: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let mut a = Attributes::new();
            a.insert(SOURCE_COLLECTION.into(), "synthetic".into());
            a.insert(SOURCE_LOCATION.into(), format!("row {}", i).into());
            a.insert(DISPLAY_TEXT.into(), format!("synthetic record {}", i).into());
            (v, a)
        })
        .collect();

    let started = std::time::Instant::now();
    let mut index = RecordIndex::build(strategy, dim, "synthetic")?;
    index.insert_records(records)?;
    println!("Built index in {:?}", started.elapsed());

    let manifest = index.persist(&out)?;
    println!("Persisted {} records to {} (effective partitions: {:?})", manifest.record_count, out.display(), manifest.effective_partitions);
    Ok(())
}
