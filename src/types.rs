//! Data structures for dataset download operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Dataset split published by MTG-Jamendo.
#[derive(clap::ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    /// Full dataset, 30 second excerpts.
    #[value(name = "raw_30s")]
    #[serde(rename = "raw_30s")]
    Raw30s,
    /// Mood/theme auto-tagging subset.
    #[value(name = "autotagging_moodtheme")]
    #[serde(rename = "autotagging_moodtheme")]
    AutotaggingMoodtheme,
}

impl Dataset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dataset::Raw30s => "raw_30s",
            Dataset::AutotaggingMoodtheme => "autotagging_moodtheme",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of data stored in the archives.
#[derive(clap::ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// MP3 audio.
    Audio,
    /// Mel-spectrograms.
    Melspecs,
    /// AcousticBrainz features.
    Acousticbrainz,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Audio => "audio",
            DataType::Melspecs => "melspecs",
            DataType::Acousticbrainz => "acousticbrainz",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote backend the archives are fetched from.
#[derive(clap::ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Google Drive, addressed by file ID. Fast but bumpy.
    Gdrive,
    /// MTG server, addressed by dataset/type/filename. Slow but stable.
    Mtg,
}

impl Source {
    /// Human readable backend name used in log lines.
    pub fn display_name(&self) -> &'static str {
        match self {
            Source::Gdrive => "GDrive",
            Source::Mtg => "MTG",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A pair of storage roots that are interchangeable for locating existing files.
///
/// Large datasets are sometimes split across volumes; a file expected under
/// `from` may already live under `to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlternateBasepath {
    pub from: PathBuf,
    pub to: PathBuf,
}

impl AlternateBasepath {
    pub fn new(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Orients the pair so that `from` is the root `output_dir` lives under.
    pub fn normalized_for(&self, output_dir: &Path) -> Self {
        if output_dir.starts_with(&self.to) {
            Self::new(self.to.clone(), self.from.clone())
        } else {
            self.clone()
        }
    }

    /// Swaps the `from` prefix of `path` for `to`, if `path` lives under `from`.
    pub fn relocate(&self, path: &Path) -> Option<PathBuf> {
        path.strip_prefix(&self.from)
            .ok()
            .map(|rest| self.to.join(rest))
    }
}

/// Configuration for downloading a dataset.
///
/// # Example
///
/// ```
/// use jamendo_sync::{DataType, Dataset, DownloadConfig, Source};
///
/// let config = DownloadConfig {
///     dataset: Dataset::AutotaggingMoodtheme,
///     data_type: DataType::Melspecs,
///     source: Source::Mtg,
///     output_dir: "/data/jamendo".into(),
///     parallel: true,
///     validate: true,
///     ..DownloadConfig::default()
/// };
/// assert_eq!(config.max_concurrent_downloads, 0);
/// ```
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub dataset: Dataset,
    pub data_type: DataType,
    pub source: Source,
    /// Directory the archives are written to.
    pub output_dir: PathBuf,
    /// Directory holding the `<dataset>_<type>_*.txt` manifests.
    pub manifest_dir: PathBuf,
    /// Fetch through a worker pool instead of one item at a time.
    pub parallel: bool,
    /// Suppress per-item progress output.
    pub quiet: bool,
    /// Recompute and compare each archive's SHA-256 after download.
    pub validate: bool,
    /// Optional second storage root checked for already downloaded files.
    pub alternate_basepath: Option<AlternateBasepath>,
    /// Worker pool size in parallel mode (0 = number of available CPUs).
    pub max_concurrent_downloads: usize,
    /// Extra attempts per item after a failed fetch (0 = single attempt).
    pub retry_attempts: usize,
    /// Delay between attempts of the same item.
    pub retry_delay: Duration,
    /// TCP connect timeout for each request.
    pub connect_timeout: Duration,
    /// Google Drive direct download endpoint.
    pub gdrive_url: String,
    /// Base URL of the MTG dataset server.
    pub mtg_url: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            dataset: Dataset::Raw30s,
            data_type: DataType::Audio,
            source: Source::Gdrive,
            output_dir: PathBuf::from("mtg-jamendo"),
            manifest_dir: PathBuf::from("data/download"),
            parallel: false,
            quiet: false,
            validate: false,
            alternate_basepath: None,
            max_concurrent_downloads: 0,
            retry_attempts: 2,
            retry_delay: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(30),
            gdrive_url: "https://drive.google.com/uc".to_string(),
            mtg_url: "https://essentia.upf.edu/documentation/datasets/mtg-jamendo".to_string(),
        }
    }
}

impl DownloadConfig {
    /// Effective worker pool size for parallel mode.
    pub fn pool_size(&self) -> usize {
        if self.max_concurrent_downloads > 0 {
            return self.max_concurrent_downloads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }
}

/// Final state of a batch download.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadOutcome {
    /// Every entry is present (and verified, if requested); paths are in manifest order.
    Complete { paths: Vec<PathBuf> },
    /// Some entries failed or were corrupt; re-run to fetch `missing`.
    Incomplete { missing: Vec<String> },
}

impl DownloadOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, DownloadOutcome::Complete { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alternate_basepath_relocates_prefix() {
        let alt = AlternateBasepath::new("/media/volume", "/home/me/tmp");
        assert_eq!(
            alt.relocate(Path::new("/media/volume/audio/00.tar")),
            Some(PathBuf::from("/home/me/tmp/audio/00.tar"))
        );
        assert_eq!(alt.relocate(Path::new("/srv/audio/00.tar")), None);
    }

    #[test]
    fn test_alternate_basepath_normalizes_to_output_side() {
        let alt = AlternateBasepath::new("/media/volume", "/home/me/tmp");
        let flipped = alt.normalized_for(Path::new("/home/me/tmp/jamendo"));
        assert_eq!(flipped, AlternateBasepath::new("/home/me/tmp", "/media/volume"));

        let kept = alt.normalized_for(Path::new("/media/volume/jamendo"));
        assert_eq!(kept, alt);
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = DownloadOutcome::Incomplete {
            missing: vec!["raw_30s_audio-00.tar".to_string()],
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "incomplete");
        assert_eq!(json["missing"][0], "raw_30s_audio-00.tar");
    }

    #[test]
    fn test_pool_size_prefers_configured_value() {
        let config = DownloadConfig {
            max_concurrent_downloads: 3,
            ..DownloadConfig::default()
        };
        assert_eq!(config.pool_size(), 3);
        assert!(DownloadConfig::default().pool_size() >= 1);
    }
}
