//! Main orchestration logic for downloading a dataset.

use crate::error::{FetchFailure, SyncError};
use crate::fetch::{fetch_item, FetchResult};
use crate::manifest::{
    load_digest_manifest, load_id_manifest, manifest_path, ManifestEntry, ManifestKind,
};
use crate::types::{DownloadConfig, DownloadOutcome};
use crate::verify::compute_file_sha256;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// Downloads every archive listed in the dataset's ID manifest.
///
/// This is the main entry point for downloading. It performs the following steps:
///
/// 1. Creates the output directory and orients the alternate basepath
/// 2. Loads the ID manifest and the archive checksum manifest
/// 3. Fetches every entry, sequentially or through a worker pool (skips files on disk)
/// 4. Optionally verifies each archive, deleting and re-queueing corrupt ones
///
/// # Returns
///
/// [`DownloadOutcome::Complete`] with one path per manifest entry in manifest
/// order, or [`DownloadOutcome::Incomplete`] listing the files to fetch again.
/// Individual fetch failures never produce an `Err`; only manifest problems and
/// unreadable files do.
///
/// # Example
///
/// ```no_run
/// use jamendo_sync::{download_dataset, DownloadConfig, DownloadOutcome};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = DownloadConfig { validate: true, ..DownloadConfig::default() };
/// match download_dataset(&config).await? {
///     DownloadOutcome::Complete { paths } => println!("{} archives ready", paths.len()),
///     DownloadOutcome::Incomplete { missing } => println!("re-run for {:?}", missing),
/// }
/// # Ok(())
/// # }
/// ```
pub async fn download_dataset(config: &DownloadConfig) -> Result<DownloadOutcome, SyncError> {
    tokio::fs::create_dir_all(&config.output_dir).await?;

    let mut config = config.clone();
    config.alternate_basepath = config
        .alternate_basepath
        .as_ref()
        .map(|alt| alt.normalized_for(&config.output_dir));

    info!("Downloading {} from {}", config.dataset, config.source);

    let tar_digests = load_digest_manifest(&manifest_path(
        &config.manifest_dir,
        config.dataset,
        config.data_type,
        ManifestKind::TarDigests,
    ))?;
    let entries = load_id_manifest(&manifest_path(
        &config.manifest_dir,
        config.dataset,
        config.data_type,
        ManifestKind::Ids,
    ))?;

    let client = reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .build()?;

    let pb = progress_bar(&config, entries.len());

    let results = if config.parallel {
        info!("Fetching with {} parallel workers", config.pool_size());
        fetch_parallel(&client, &config, &entries, pb.as_ref()).await
    } else {
        let mut results = Vec::with_capacity(entries.len());
        for entry in &entries {
            results.push(fetch_item(&client, &config, entry).await);
            if let Some(ref pb) = pb {
                pb.inc(1);
            }
        }
        results
    };

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let mut paths = Vec::with_capacity(entries.len());
    let mut to_do_again = Vec::new();

    for (result, entry) in results.into_iter().zip(&entries) {
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                warn!("Could not fetch {}: {}", entry.filename, e);
                to_do_again.push(entry.filename.clone());
                continue;
            }
        };

        if config.validate && tokio::fs::try_exists(&output).await? {
            let expected = tar_digests
                .get(&entry.filename)
                .ok_or_else(|| SyncError::MissingDigest(entry.filename.clone()))?;

            if !compute_file_sha256(&output).await?.eq_ignore_ascii_case(expected) {
                error!(
                    "{} does not match the checksum, removing the file",
                    output.display()
                );
                tokio::fs::remove_file(&output).await?;
                to_do_again.push(entry.filename.clone());
                continue;
            }
            info!("{} checksum OK", entry.filename);
        }

        paths.push(output);
    }

    if !to_do_again.is_empty() {
        info!("Missing files: {}", to_do_again.join(" "));
        info!("Re-run the download to fetch them");
        return Ok(DownloadOutcome::Incomplete {
            missing: to_do_again,
        });
    }

    info!("Download complete");
    Ok(DownloadOutcome::Complete { paths })
}

/// Fetches all entries through a pool of `config.pool_size()` concurrent tasks.
async fn fetch_parallel(
    client: &reqwest::Client,
    config: &DownloadConfig,
    entries: &[ManifestEntry],
    pb: Option<&indicatif::ProgressBar>,
) -> Vec<FetchResult> {
    // Workers share one aggregate bar, per-item lines would interleave
    let worker_config = Arc::new(DownloadConfig {
        quiet: true,
        ..config.clone()
    });
    let pb = pb.cloned();

    map_ordered(entries.to_vec(), config.pool_size(), |entry: ManifestEntry| {
        let client = client.clone();
        let config = Arc::clone(&worker_config);
        let pb = pb.clone();

        async move {
            if let Some(ref pb) = pb {
                pb.set_message(format!("| ⬇️  {}", entry.filename));
            }
            let result = fetch_item(&client, &config, &entry).await;
            if let Some(ref pb) = pb {
                pb.inc(1);
            }
            result
        }
    })
    .await
}

/// Runs `work` over `items` on at most `pool_size` tasks at a time.
///
/// Handles are awaited in spawn order, so the results line up with `items`
/// regardless of completion order. A task that panics yields a
/// [`FetchFailure::Worker`] for its own item only.
async fn map_ordered<T, F, Fut>(items: Vec<T>, pool_size: usize, work: F) -> Vec<FetchResult>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = FetchResult> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(pool_size.max(1)));

    let mut tasks = Vec::with_capacity(items.len());
    for item in items {
        let semaphore = Arc::clone(&semaphore);
        let job = work(item);

        tasks.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|e| FetchFailure::Worker(format!("worker pool closed: {}", e)))?;
            job.await
        }));
    }

    let mut results = Vec::with_capacity(tasks.len());
    for task in tasks {
        results.push(
            task.await
                .unwrap_or_else(|e| Err(FetchFailure::Worker(format!("task failed: {}", e)))),
        );
    }
    results
}

fn progress_bar(config: &DownloadConfig, total: usize) -> Option<indicatif::ProgressBar> {
    if config.quiet || !atty::is(atty::Stream::Stderr) {
        return None;
    }

    let progress_bar = indicatif::ProgressBar::new(total as u64);
    let style = indicatif::ProgressStyle::default_bar()
        .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg} | {elapsed_precise} elapsed, ETA {eta_precise}")
        .map(|s| s.progress_chars("█▓▒░ "))
        .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar());
    progress_bar.set_style(style);
    progress_bar.set_message(format!(
        "📦 Downloading {} archives of {}/{}",
        total, config.dataset, config.data_type
    ));
    Some(progress_bar)
}
