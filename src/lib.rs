//! jamendo-sync - Resumable downloader for the MTG-Jamendo dataset archives
//!
//! This library downloads the dataset's tar archives from Google Drive or the MTG
//! server, verifies them against published SHA-256 checksums, and unpacks them with
//! per-track verification.
//!
//! # Features
//!
//! - **Resumable Downloads**: Files already on disk (or on an alternate volume) are skipped
//! - **SHA-256 Verification**: Corrupt archives are deleted and reported for a re-run
//! - **Parallel Fetching**: Order-preserving worker pool over the manifest
//! - **Failure Isolation**: A failed item never aborts the batch
//! - **Verified Unpacking**: Every extracted track is checked against its checksum
//!
//! # Example
//!
//! ```no_run
//! use jamendo_sync::{download_dataset, unpack_archives, DownloadConfig, DownloadOutcome};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DownloadConfig { parallel: true, validate: true, ..DownloadConfig::default() };
//!
//! if let DownloadOutcome::Complete { paths } = download_dataset(&config).await? {
//!     unpack_archives(&config, &paths, false)?;
//! }
//! # Ok(())
//! # }
//! ```

mod download;
mod error;
pub mod extract;
pub mod fetch;
pub mod manifest;
mod orchestrator;
mod types;
pub mod verify;

pub use error::{FetchFailure, SyncError};
pub use extract::{unpack_archive, unpack_archives};
pub use orchestrator::download_dataset;
pub use types::{AlternateBasepath, DataType, Dataset, DownloadConfig, DownloadOutcome, Source};
