//! Manifest loading: file IDs and expected checksums.

use crate::error::SyncError;
use crate::types::{DataType, Dataset};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Which of the three per-dataset manifests to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    /// `<id> <filename>` pairs for every archive.
    Ids,
    /// `<sha256> <filename>` for every archive.
    TarDigests,
    /// `<sha256> <member path>` for every file inside the archives.
    TrackDigests,
}

impl ManifestKind {
    fn suffix(&self) -> &'static str {
        match self {
            ManifestKind::Ids => "gids",
            ManifestKind::TarDigests => "sha256_tars",
            ManifestKind::TrackDigests => "sha256_tracks",
        }
    }
}

/// One archive to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Remote identifier (Google Drive file ID).
    pub id: String,
    /// Local filename, also the name on the MTG server.
    pub filename: String,
}

/// Expected SHA-256 digests keyed by filename or member path.
pub type DigestManifest = HashMap<String, String>;

/// Constructs the path of a manifest for a dataset and data type.
///
/// # Example
///
/// ```
/// use jamendo_sync::manifest::{manifest_path, ManifestKind};
/// use jamendo_sync::{DataType, Dataset};
/// use std::path::Path;
///
/// let path = manifest_path(Path::new("data/download"), Dataset::Raw30s, DataType::Audio, ManifestKind::Ids);
/// assert_eq!(path, Path::new("data/download/raw_30s_audio_gids.txt"));
/// ```
pub fn manifest_path(
    manifest_dir: &Path,
    dataset: Dataset,
    data_type: DataType,
    kind: ManifestKind,
) -> PathBuf {
    manifest_dir.join(format!("{}_{}_{}.txt", dataset, data_type, kind.suffix()))
}

fn fields(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
}

fn records(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(n, line)| (n + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

/// Parses an ID manifest, keeping file order.
///
/// Both IDs and filenames must be unique: every worker writes a distinct file.
pub fn parse_id_manifest(text: &str, path: &Path) -> Result<Vec<ManifestEntry>, SyncError> {
    let mut entries = Vec::new();
    let mut ids = HashSet::new();
    let mut filenames = HashSet::new();

    for (line_no, line) in records(text) {
        let mut parts = fields(line);
        let (id, filename) = match (parts.next(), parts.next()) {
            (Some(id), Some(filename)) => (id, filename),
            _ => {
                return Err(SyncError::Manifest {
                    path: path.to_path_buf(),
                    reason: format!("line {}: expected `<id> <filename>`", line_no),
                })
            }
        };

        if !ids.insert(id.to_string()) {
            return Err(SyncError::Manifest {
                path: path.to_path_buf(),
                reason: format!("line {}: duplicate id {}", line_no, id),
            });
        }
        if !filenames.insert(filename.to_string()) {
            return Err(SyncError::Manifest {
                path: path.to_path_buf(),
                reason: format!("line {}: duplicate filename {}", line_no, filename),
            });
        }

        entries.push(ManifestEntry {
            id: id.to_string(),
            filename: filename.to_string(),
        });
    }

    Ok(entries)
}

/// Parses a `<digest> <name>` checksum manifest. Later lines win on duplicate names.
pub fn parse_digest_manifest(text: &str, path: &Path) -> Result<DigestManifest, SyncError> {
    let mut digests = HashMap::new();

    for (line_no, line) in records(text) {
        let mut parts = fields(line);
        match (parts.next(), parts.next()) {
            (Some(digest), Some(name)) => {
                if !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(SyncError::Manifest {
                        path: path.to_path_buf(),
                        reason: format!("line {}: `{}` is not a hex digest", line_no, digest),
                    });
                }
                digests.insert(name.to_string(), digest.to_ascii_lowercase());
            }
            _ => {
                return Err(SyncError::Manifest {
                    path: path.to_path_buf(),
                    reason: format!("line {}: expected `<digest> <name>`", line_no),
                })
            }
        }
    }

    Ok(digests)
}

/// Reads and parses an ID manifest from disk.
pub fn load_id_manifest(path: &Path) -> Result<Vec<ManifestEntry>, SyncError> {
    let text = std::fs::read_to_string(path)?;
    let entries = parse_id_manifest(&text, path)?;
    debug!("Loaded {} entries from {}", entries.len(), path.display());
    Ok(entries)
}

/// Reads and parses a checksum manifest from disk.
pub fn load_digest_manifest(path: &Path) -> Result<DigestManifest, SyncError> {
    let text = std::fs::read_to_string(path)?;
    let digests = parse_digest_manifest(&text, path)?;
    debug!("Loaded {} checksums from {}", digests.len(), path.display());
    Ok(digests)
}
