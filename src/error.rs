//! Error types for dataset download and unpack operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a download or unpack run.
#[derive(Error, Debug)]
pub enum SyncError {
    /// I/O error during file operations.
    #[error(transparent)]
    IoError(#[from] io::Error),

    /// HTTP request error during download.
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),

    /// A manifest file could not be parsed.
    #[error("Invalid manifest {path}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    /// A file has no entry in the checksum manifest it is validated against.
    #[error("No checksum listed for {0}")]
    MissingDigest(String),

    /// An extracted member does not match its expected checksum.
    #[error("Corrupt file in the dataset: {}", .0.display())]
    CorruptMember(PathBuf),

    /// General download failure.
    #[error("Dataset download failed: {0}")]
    DownloadFailed(String),
}

/// Why a single item could not be fetched.
///
/// These never abort a batch; the batch downloader turns them into retry entries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// The request could not be sent or the body could not be read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("HTTP {0}")]
    Status(u16),

    /// The server sent an HTML page where file data was expected.
    #[error("received an HTML page instead of file data")]
    UnexpectedHtml,

    /// Writing the downloaded data to disk failed.
    #[error("local I/O error: {0}")]
    Io(String),

    /// The worker running this item stopped before returning a result.
    #[error("worker failed: {0}")]
    Worker(String),
}

impl From<reqwest::Error> for FetchFailure {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => FetchFailure::Status(status.as_u16()),
            None => FetchFailure::Transport(e.to_string()),
        }
    }
}

impl From<io::Error> for FetchFailure {
    fn from(e: io::Error) -> Self {
        FetchFailure::Io(e.to_string())
    }
}
