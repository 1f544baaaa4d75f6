//! On-disk layout of a persisted [`RecordIndex`]:
//!
//! - `index.<hash>.bin`: vector blob (see `VectorIndex::encode`)
//! - `attributes.<hash>.json`: attribute table, one row per record id
//! - `manifest.json`: dimension, strategy, counts, embedder id, the names of
//!   the two data files and their blake3 checksums
//!
//! Data files are named after their content, so writing a new generation
//! never touches the files the current manifest points at. The manifest is
//! renamed into place last; that rename is the commit point. Files no longer
//! referenced are removed afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

use gridseek_core::error::{Error, Result};
use gridseek_core::types::{Attributes, RecordId};

use crate::index::VectorIndex;
use crate::metadata::MetadataStore;
use crate::record_index::RecordIndex;
use crate::strategy::IndexStrategy;

pub const FORMAT_VERSION: u32 = 2;
pub const MANIFEST_FILE: &str = "manifest.json";
const BLOB_PREFIX: &str = "index.";
const BLOB_SUFFIX: &str = ".bin";
const ATTRIBUTES_PREFIX: &str = "attributes.";
const ATTRIBUTES_SUFFIX: &str = ".json";
/// Hex digits of the checksum used in data file names.
const GENERATION_DIGITS: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub dimension: usize,
    pub strategy: IndexStrategy,
    pub record_count: usize,
    pub next_id: RecordId,
    pub embedder_id: String,
    pub effective_partitions: Option<usize>,
    pub created_at: DateTime<Utc>,
    pub blob_file: String,
    pub attributes_file: String,
    pub blob_checksum: String,
    pub attributes_checksum: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct AttributeRow {
    id: RecordId,
    attributes: Attributes,
}

pub fn manifest_exists(dir: &Path) -> bool { dir.join(MANIFEST_FILE).is_file() }

fn write_atomic(dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dir.join(name)).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

fn checksum(bytes: &[u8]) -> String { blake3::hash(bytes).to_hex().to_string() }

fn generation_name(prefix: &str, checksum: &str, suffix: &str) -> String {
    format!("{}{}{}", prefix, &checksum[..GENERATION_DIGITS.min(checksum.len())], suffix)
}

fn is_generation_file(name: &str) -> bool {
    (name.starts_with(BLOB_PREFIX) && name.ends_with(BLOB_SUFFIX))
        || (name.starts_with(ATTRIBUTES_PREFIX) && name.ends_with(ATTRIBUTES_SUFFIX))
}

/// Manifest-supplied data file names must stay inside the index directory.
fn data_file_name(name: &str) -> Result<&str> {
    let plain = !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != "..";
    if plain && is_generation_file(name) { Ok(name) } else { Err(Error::IncompatibleIndex(format!("invalid data file name '{}'", name))) }
}

/// Remove data files from earlier generations. Failures only cost disk space.
fn remove_stale_generations(dir: &Path, manifest: &IndexManifest) {
    let Ok(entries) = fs::read_dir(dir) else { return };
    for entry in entries.filter_map(|e| e.ok()) {
        let name = entry.file_name().to_string_lossy().to_string();
        if !is_generation_file(&name) || name == manifest.blob_file || name == manifest.attributes_file { continue; }
        if let Err(e) = fs::remove_file(entry.path()) {
            tracing::warn!(file = %name, error = %e, "could not remove stale index file");
        }
    }
}

impl RecordIndex {
    pub fn persist(&self, dir: &Path) -> Result<IndexManifest> {
        fs::create_dir_all(dir)?;
        let blob = self.index.encode();
        let rows: Vec<AttributeRow> =
            self.metadata.iter_sorted().map(|(id, attributes)| AttributeRow { id, attributes: attributes.clone() }).collect();
        let table = serde_json::to_vec(&rows)?;
        let blob_checksum = checksum(&blob);
        let attributes_checksum = checksum(&table);
        let manifest = IndexManifest {
            format_version: FORMAT_VERSION,
            dimension: self.dimension(),
            strategy: self.strategy(),
            record_count: self.len(),
            next_id: self.next_id,
            embedder_id: self.embedder_id.clone(),
            effective_partitions: self.index.effective_partitions(),
            created_at: Utc::now(),
            blob_file: generation_name(BLOB_PREFIX, &blob_checksum, BLOB_SUFFIX),
            attributes_file: generation_name(ATTRIBUTES_PREFIX, &attributes_checksum, ATTRIBUTES_SUFFIX),
            blob_checksum,
            attributes_checksum,
        };
        write_atomic(dir, &manifest.blob_file, &blob)?;
        write_atomic(dir, &manifest.attributes_file, &table)?;
        write_atomic(dir, MANIFEST_FILE, &serde_json::to_vec_pretty(&manifest)?)?;
        remove_stale_generations(dir, &manifest);
        tracing::info!(dir = %dir.display(), records = manifest.record_count, strategy = manifest.strategy.kind().as_str(), "persisted index");
        Ok(manifest)
    }

    /// Load an index persisted by [`RecordIndex::persist`] and check it against
    /// the configured embedder. `NotFound` when there is no manifest;
    /// `IncompatibleIndex` for any disagreement.
    pub fn load(dir: &Path, dimension: usize, embedder_id: &str) -> Result<Self> {
        let manifest = read_manifest(dir)?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(Error::IncompatibleIndex(format!("format version {} (expected {})", manifest.format_version, FORMAT_VERSION)));
        }
        if manifest.dimension != dimension {
            return Err(Error::IncompatibleIndex(format!(
                "index dimension {} does not match embedder dimension {}",
                manifest.dimension, dimension
            )));
        }
        if manifest.embedder_id != embedder_id {
            return Err(Error::IncompatibleIndex(format!(
                "index built with embedder '{}', configured embedder is '{}'",
                manifest.embedder_id, embedder_id
            )));
        }

        let blob_file = data_file_name(&manifest.blob_file)?;
        let blob = read_data_file(dir, blob_file)?;
        if checksum(&blob) != manifest.blob_checksum {
            return Err(Error::IncompatibleIndex(format!("{} checksum mismatch", blob_file)));
        }
        let attributes_file = data_file_name(&manifest.attributes_file)?;
        let table = read_data_file(dir, attributes_file)?;
        if checksum(&table) != manifest.attributes_checksum {
            return Err(Error::IncompatibleIndex(format!("{} checksum mismatch", attributes_file)));
        }

        let index = VectorIndex::decode(&blob, manifest.strategy)?;
        if index.len() != manifest.record_count || index.dimension() != manifest.dimension {
            return Err(Error::IncompatibleIndex("index blob disagrees with manifest".into()));
        }
        let rows: Vec<AttributeRow> =
            serde_json::from_slice(&table).map_err(|e| Error::IncompatibleIndex(format!("attribute table: {}", e)))?;
        let mut metadata = MetadataStore::new();
        for row in rows { metadata.put(row.id, row.attributes); }
        if metadata.len() != index.len() {
            return Err(Error::IncompatibleIndex(format!("{} attribute rows for {} vectors", metadata.len(), index.len())));
        }

        tracing::info!(dir = %dir.display(), records = index.len(), strategy = manifest.strategy.kind().as_str(), "loaded index");
        Ok(Self { index, metadata, next_id: manifest.next_id, embedder_id: manifest.embedder_id })
    }
}

/// A manifest naming a data file that is gone cannot be served.
fn read_data_file(dir: &Path, name: &str) -> Result<Vec<u8>> {
    match fs::read(dir.join(name)) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::IncompatibleIndex(format!("manifest references missing file {}", name)))
        }
        other => Ok(other?),
    }
}

pub fn read_manifest(dir: &Path) -> Result<IndexManifest> {
    let path = dir.join(MANIFEST_FILE);
    if !path.is_file() { return Err(Error::NotFound(format!("no index manifest at {}", path.display()))); }
    let bytes = fs::read(&path)?;
    serde_json::from_slice(&bytes).map_err(|e| Error::IncompatibleIndex(format!("unreadable manifest: {}", e)))
}
