use std::fs;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

use gridseek_core::error::Error;
use gridseek_core::types::{Attributes, DISPLAY_TEXT, SOURCE_COLLECTION, SOURCE_LOCATION};
use gridseek_vector::persist::{read_manifest, MANIFEST_FILE};
use gridseek_vector::{GraphParams, IndexStrategy, PartitionParams, RecordIndex};

fn records(n: usize, dim: usize, seed: u64) -> Vec<(Vec<f32>, Attributes)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let v = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let mut a = Attributes::new();
            a.insert(SOURCE_COLLECTION.into(), "plants".into());
            a.insert(SOURCE_LOCATION.into(), format!("plants.jsonl:{}", i + 1).into());
            a.insert(DISPLAY_TEXT.into(), format!("plant {}", i).into());
            a.insert("source_type".into(), if i % 2 == 0 { "wind".into() } else { "solar".into() });
            (v, a)
        })
        .collect()
}

fn strategies() -> Vec<IndexStrategy> {
    vec![
        IndexStrategy::Exact,
        IndexStrategy::Partitioned(PartitionParams { partitions: 8, probes: 3, ..PartitionParams::default() }),
        IndexStrategy::Graph(GraphParams { m: 8, ef_construction: 64, ef_search: 64, seed: 11 }),
    ]
}

#[test]
fn persist_and_load_round_trip() {
    let data = records(200, 16, 1);
    let queries: Vec<Vec<f32>> = records(10, 16, 2).into_iter().map(|(v, _)| v).collect();
    for strategy in strategies() {
        let tmp = TempDir::new().unwrap();
        let mut index = RecordIndex::build(strategy, 16, "hashing:d16:s0").unwrap();
        index.insert_records(data.clone()).unwrap();
        let manifest = index.persist(tmp.path()).expect("persist");
        assert_eq!(manifest.record_count, 200);
        assert_eq!(manifest.strategy, strategy);

        let loaded = RecordIndex::load(tmp.path(), 16, "hashing:d16:s0").expect("load");
        assert_eq!(loaded.statistics(), index.statistics());
        for q in &queries {
            let before = index.search(q, 5).unwrap();
            let after = loaded.search(q, 5).unwrap();
            match strategy {
                IndexStrategy::Exact => assert_eq!(before, after),
                _ => assert_eq!(before[0].id, after[0].id),
            }
        }
        assert_eq!(loaded.attributes(7), index.attributes(7));
    }
}

#[test]
fn loaded_index_keeps_assigning_fresh_ids() {
    let tmp = TempDir::new().unwrap();
    let mut index = RecordIndex::build(IndexStrategy::Exact, 4, "e").unwrap();
    index.insert_records(records(3, 4, 5)).unwrap();
    index.persist(tmp.path()).unwrap();
    let mut loaded = RecordIndex::load(tmp.path(), 4, "e").unwrap();
    assert_eq!(loaded.insert_records(records(1, 4, 6)).unwrap(), vec![3]);
}

#[test]
fn load_rejects_mismatched_embedder() {
    let tmp = TempDir::new().unwrap();
    let mut index = RecordIndex::build(IndexStrategy::Exact, 8, "hashing:d8:s0").unwrap();
    index.insert_records(records(4, 8, 3)).unwrap();
    index.persist(tmp.path()).unwrap();

    assert!(matches!(RecordIndex::load(tmp.path(), 16, "hashing:d8:s0"), Err(Error::IncompatibleIndex(_))));
    assert!(matches!(RecordIndex::load(tmp.path(), 8, "hashing:d8:s9"), Err(Error::IncompatibleIndex(_))));
}

#[test]
fn load_detects_tampering() {
    let tmp = TempDir::new().unwrap();
    let mut index = RecordIndex::build(IndexStrategy::Exact, 8, "e").unwrap();
    index.insert_records(records(4, 8, 3)).unwrap();
    index.persist(tmp.path()).unwrap();

    let blob_path = tmp.path().join(read_manifest(tmp.path()).unwrap().blob_file);
    let mut blob = fs::read(&blob_path).unwrap();
    let last = blob.len() - 1;
    blob[last] ^= 0xff;
    fs::write(&blob_path, &blob).unwrap();
    assert!(matches!(RecordIndex::load(tmp.path(), 8, "e"), Err(Error::IncompatibleIndex(_))));

    let manifest = index.persist(tmp.path()).unwrap();
    fs::write(tmp.path().join(&manifest.attributes_file), b"[]").unwrap();
    assert!(matches!(RecordIndex::load(tmp.path(), 8, "e"), Err(Error::IncompatibleIndex(_))));

    fs::remove_file(tmp.path().join(&manifest.blob_file)).unwrap();
    assert!(matches!(RecordIndex::load(tmp.path(), 8, "e"), Err(Error::IncompatibleIndex(_))));
}

/// A persist that dies after writing its data files but before the manifest
/// rename leaves the previous generation intact and loadable.
#[test]
fn interrupted_persist_keeps_previous_generation() {
    let committed = TempDir::new().unwrap();
    let mut old = RecordIndex::build(IndexStrategy::Exact, 8, "e").unwrap();
    old.insert_records(records(4, 8, 3)).unwrap();
    let old_manifest = old.persist(committed.path()).unwrap();

    let mut new = old.clone();
    new.insert_records(records(3, 8, 7)).unwrap();
    let staging = TempDir::new().unwrap();
    let new_manifest = new.persist(staging.path()).unwrap();
    assert_ne!(new_manifest.blob_file, old_manifest.blob_file);
    for name in [&new_manifest.blob_file, &new_manifest.attributes_file] {
        fs::copy(staging.path().join(name), committed.path().join(name)).unwrap();
    }

    let loaded = RecordIndex::load(committed.path(), 8, "e").unwrap();
    assert_eq!(loaded.len(), 4);
    assert_eq!(loaded.statistics(), old.statistics());

    // the next completed persist commits and sweeps the older files
    let manifest = new.persist(committed.path()).unwrap();
    assert_eq!(RecordIndex::load(committed.path(), 8, "e").unwrap().len(), 7);
    let mut names: Vec<String> =
        fs::read_dir(committed.path()).unwrap().map(|e| e.unwrap().file_name().to_string_lossy().into_owned()).collect();
    names.sort();
    let mut expected = vec![manifest.attributes_file, manifest.blob_file, MANIFEST_FILE.to_string()];
    expected.sort();
    assert_eq!(names, expected);
}

#[test]
fn manifest_cannot_point_outside_the_index_dir() {
    let tmp = TempDir::new().unwrap();
    let mut index = RecordIndex::build(IndexStrategy::Exact, 4, "e").unwrap();
    index.insert_records(records(2, 4, 1)).unwrap();
    let mut manifest = index.persist(tmp.path()).unwrap();
    manifest.blob_file = "../index.0000.bin".into();
    fs::write(tmp.path().join(MANIFEST_FILE), serde_json::to_vec(&manifest).unwrap()).unwrap();
    assert!(matches!(RecordIndex::load(tmp.path(), 4, "e"), Err(Error::IncompatibleIndex(_))));
}

#[test]
fn missing_index_is_not_found() {
    let tmp = TempDir::new().unwrap();
    assert!(matches!(RecordIndex::load(tmp.path(), 8, "e"), Err(Error::NotFound(_))));
    fs::write(tmp.path().join(MANIFEST_FILE), b"{ not json").unwrap();
    assert!(matches!(RecordIndex::load(tmp.path(), 8, "e"), Err(Error::IncompatibleIndex(_))));
}

#[test]
fn same_vectors_same_results() {
    let data = records(150, 8, 9);
    let q = vec![0.1; 8];
    for strategy in strategies() {
        let mut a = RecordIndex::build(strategy, 8, "e").unwrap();
        let mut b = RecordIndex::build(strategy, 8, "e").unwrap();
        a.insert_records(data.clone()).unwrap();
        b.insert_records(data.clone()).unwrap();
        assert_eq!(a.search(&q, 10).unwrap(), b.search(&q, 10).unwrap());
    }
}

#[test]
fn tiny_partitioned_index_auto_reduces() {
    let mut index = RecordIndex::build(IndexStrategy::Partitioned(PartitionParams::default()), 4, "e").unwrap();
    index.insert_records(records(22, 4, 4)).unwrap();
    let stats = index.statistics();
    assert!(stats.effective_partitions.unwrap() <= 2);
    assert_eq!(index.search(&[0.0; 4], 50).unwrap().len(), 22);

    let mut single = RecordIndex::build(IndexStrategy::Partitioned(PartitionParams::default()), 4, "e").unwrap();
    single.insert_records(records(1, 4, 4)).unwrap();
    assert_eq!(single.statistics().effective_partitions, Some(1));
}
