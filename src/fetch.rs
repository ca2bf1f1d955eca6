//! Single-item fetching with resume and backend selection.

use crate::download::download_file;
use crate::error::FetchFailure;
use crate::manifest::ManifestEntry;
use crate::types::{DownloadConfig, Source};
use std::path::{Path, PathBuf};
use tokio_retry2::strategy::FixedInterval;
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, info, warn};

/// Result of fetching one manifest entry.
pub type FetchResult = Result<PathBuf, FetchFailure>;

/// Builds the remote URL of an entry for the configured backend.
///
/// # Example
///
/// ```
/// use jamendo_sync::fetch::remote_url;
/// use jamendo_sync::manifest::ManifestEntry;
/// use jamendo_sync::{DownloadConfig, Source};
///
/// let entry = ManifestEntry { id: "1AbC".into(), filename: "raw_30s_audio-00.tar".into() };
/// let config = DownloadConfig { source: Source::Mtg, ..DownloadConfig::default() };
/// assert_eq!(
///     remote_url(&config, &entry),
///     "https://essentia.upf.edu/documentation/datasets/mtg-jamendo/raw_30s/audio/raw_30s_audio-00.tar"
/// );
/// ```
pub fn remote_url(config: &DownloadConfig, entry: &ManifestEntry) -> String {
    match config.source {
        Source::Gdrive => format!(
            "{}?id={}&export=download&confirm=t",
            config.gdrive_url, entry.id
        ),
        Source::Mtg => format!(
            "{}/{}/{}/{}",
            config.mtg_url.trim_end_matches('/'),
            config.dataset,
            config.data_type,
            entry.filename
        ),
    }
}

/// Returns the path of an already downloaded copy, checking the alternate basepath too.
///
/// A path that cannot be inspected is an error, not an absent file.
pub(crate) async fn existing_copy(
    config: &DownloadConfig,
    output: &Path,
) -> Result<Option<PathBuf>, FetchFailure> {
    if tokio::fs::try_exists(output).await? {
        return Ok(Some(output.to_path_buf()));
    }
    let relocated = match config
        .alternate_basepath
        .as_ref()
        .and_then(|alt| alt.relocate(output))
    {
        Some(relocated) => relocated,
        None => return Ok(None),
    };
    if tokio::fs::try_exists(&relocated).await? {
        Ok(Some(relocated))
    } else {
        Ok(None)
    }
}

fn is_transient(failure: &FetchFailure) -> bool {
    match failure {
        FetchFailure::Status(code) => *code == 429 || *code >= 500,
        FetchFailure::UnexpectedHtml | FetchFailure::Worker(_) => false,
        FetchFailure::Transport(_) | FetchFailure::Io(_) => true,
    }
}

/// Fetches one manifest entry into the output directory.
///
/// Returns immediately with the existing path when the file (or its relocated
/// copy under the alternate basepath) is already on disk. Failures are returned
/// as values so one item can never abort a batch.
///
/// `config.alternate_basepath` is expected to be normalised for `config.output_dir`.
pub async fn fetch_item(
    client: &reqwest::Client,
    config: &DownloadConfig,
    entry: &ManifestEntry,
) -> FetchResult {
    let output = config.output_dir.join(&entry.filename);

    if let Some(existing) = existing_copy(config, &output).await.map_err(|e| {
        warn!("Cannot check {} for an existing copy: {}", output.display(), e);
        e
    })? {
        if config.quiet {
            debug!("Skipping {} (file already exists)", existing.display());
        } else {
            info!("Skipping {} (file already exists)", existing.display());
        }
        return Ok(existing);
    }

    let url = remote_url(config, entry);
    if !config.quiet {
        info!("⬇️  Downloading {}", entry.filename);
    }

    let retry_strategy = FixedInterval::new(config.retry_delay).take(config.retry_attempts);
    Retry::spawn(retry_strategy, || {
        let url = url.clone();
        let output = output.clone();

        async move {
            match download_file(client, &url, &output).await {
                Ok(()) => Ok(()),
                Err(e) if is_transient(&e) => {
                    warn!("Failed to download {} due to error: {}", output.display(), e);
                    RetryError::to_transient(e)
                }
                Err(e) => {
                    warn!("Giving up on {}: {}", output.display(), e);
                    RetryError::to_permanent(e)
                }
            }
        }
    })
    .await?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AlternateBasepath;

    fn entry() -> ManifestEntry {
        ManifestEntry {
            id: "1AbCdEf".to_string(),
            filename: "raw_30s_audio-00.tar".to_string(),
        }
    }

    #[test]
    fn test_gdrive_url_uses_identifier() {
        let config = DownloadConfig::default();
        assert_eq!(
            remote_url(&config, &entry()),
            "https://drive.google.com/uc?id=1AbCdEf&export=download&confirm=t"
        );
    }

    #[test]
    fn test_mtg_url_ignores_trailing_slash() {
        let config = DownloadConfig {
            source: Source::Mtg,
            mtg_url: "http://mirror.local/jamendo/".to_string(),
            ..DownloadConfig::default()
        };
        assert_eq!(
            remote_url(&config, &entry()),
            "http://mirror.local/jamendo/raw_30s/audio/raw_30s_audio-00.tar"
        );
    }

    #[test]
    fn test_retry_classification() {
        assert!(is_transient(&FetchFailure::Status(503)));
        assert!(is_transient(&FetchFailure::Status(429)));
        assert!(!is_transient(&FetchFailure::Status(404)));
        assert!(!is_transient(&FetchFailure::UnexpectedHtml));
        assert!(is_transient(&FetchFailure::Transport("reset".into())));
        assert!(!is_transient(&FetchFailure::Worker("panicked".into())));
    }

    #[tokio::test]
    async fn test_existing_copy_under_alternate_basepath() {
        let primary = tempfile::tempdir().unwrap();
        let secondary = tempfile::tempdir().unwrap();
        std::fs::write(secondary.path().join("raw_30s_audio-00.tar"), b"data").unwrap();

        let config = DownloadConfig {
            output_dir: primary.path().to_path_buf(),
            alternate_basepath: Some(AlternateBasepath::new(primary.path(), secondary.path())),
            ..DownloadConfig::default()
        };

        let found = fetch_item(&reqwest::Client::new(), &config, &entry()).await;
        assert_eq!(found, Ok(secondary.path().join("raw_30s_audio-00.tar")));
    }

    #[tokio::test]
    async fn test_uninspectable_alternate_path_is_io_failure() {
        let primary = tempfile::tempdir().unwrap();
        let secondary = tempfile::tempdir().unwrap();
        // A regular file where the relocated copy's parent directory should be
        let blocker = secondary.path().join("volume");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let config = DownloadConfig {
            source: Source::Mtg,
            mtg_url: "http://127.0.0.1:9".to_string(),
            output_dir: primary.path().to_path_buf(),
            alternate_basepath: Some(AlternateBasepath::new(primary.path(), &blocker)),
            retry_attempts: 0,
            ..DownloadConfig::default()
        };

        let result = fetch_item(&reqwest::Client::new(), &config, &entry()).await;
        assert!(matches!(result, Err(FetchFailure::Io(_))), "got {:?}", result);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_a_failure_value() {
        let dir = tempfile::tempdir().unwrap();
        let config = DownloadConfig {
            source: Source::Mtg,
            mtg_url: "http://127.0.0.1:9".to_string(),
            output_dir: dir.path().to_path_buf(),
            retry_attempts: 0,
            ..DownloadConfig::default()
        };

        let result = fetch_item(&reqwest::Client::new(), &config, &entry()).await;
        assert!(matches!(result, Err(FetchFailure::Transport(_))));
        assert!(!dir.path().join("raw_30s_audio-00.tar").exists());
    }
}
