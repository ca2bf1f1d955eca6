use anyhow::Context;
use clap::Parser;
use jamendo_sync::{
    download_dataset, unpack_archives, AlternateBasepath, DataType, Dataset, DownloadConfig,
    DownloadOutcome, Source,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "jamendo-sync")]
#[command(about = "Download the MTG-Jamendo dataset", long_about = None)]
#[command(version)]
struct Args {
    /// Dataset to download
    #[arg(long, value_enum, default_value = "raw_30s")]
    dataset: Dataset,

    /// Type of data to download (audio, mel-spectrograms, AcousticBrainz features)
    #[arg(long = "type", value_enum, default_value = "audio")]
    data_type: DataType,

    /// Download from Google Drive (fast but bumpy) or MTG (server in Spain, slow but stable)
    #[arg(long = "from", value_enum, default_value = "gdrive")]
    source: Source,

    /// Directory to store the dataset
    outputdir: PathBuf,

    /// Unpack tar archives
    #[arg(long)]
    unpack: bool,

    /// Remove tar archives while unpacking one by one (use to save disk space)
    #[arg(long)]
    remove: bool,

    /// Directory holding the ID and checksum manifests
    #[arg(long, default_value = "data/download")]
    manifest_dir: PathBuf,

    /// Download several archives at once
    #[arg(long)]
    parallel: bool,

    /// Number of parallel downloads (defaults to the number of CPUs)
    #[arg(short, long, default_value_t = 0)]
    jobs: usize,

    /// Skip SHA-256 verification of downloaded archives
    #[arg(long)]
    no_validate: bool,

    /// Second storage root to look for already downloaded archives (FROM TO)
    #[arg(long, num_args = 2, value_names = ["FROM", "TO"])]
    alternate_basepath: Option<Vec<PathBuf>>,

    /// Extra attempts for each failed archive
    #[arg(long, default_value_t = 2)]
    retries: usize,

    /// Delay between attempts (e.g. "10s", "1m")
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    retry_delay: Duration,

    /// Base URL of the MTG dataset server (or a mirror)
    #[arg(long)]
    mtg_url: Option<String>,

    /// Google Drive direct download endpoint
    #[arg(long)]
    gdrive_url: Option<String>,

    /// Write the download outcome as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Hide per-archive progress lines and bars
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("jamendo_sync={}", log_level))
        .with_writer(std::io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .init();

    let alternate_basepath = args
        .alternate_basepath
        .and_then(|pair| match pair.as_slice() {
            [from, to] => Some(AlternateBasepath::new(from, to)),
            _ => None,
        });

    let defaults = DownloadConfig::default();
    let config = DownloadConfig {
        dataset: args.dataset,
        data_type: args.data_type,
        source: args.source,
        output_dir: args.outputdir,
        manifest_dir: args.manifest_dir,
        parallel: args.parallel,
        quiet: args.quiet,
        validate: !args.no_validate,
        alternate_basepath,
        max_concurrent_downloads: args.jobs,
        retry_attempts: args.retries,
        retry_delay: args.retry_delay,
        mtg_url: args.mtg_url.unwrap_or(defaults.mtg_url),
        gdrive_url: args.gdrive_url.unwrap_or(defaults.gdrive_url),
        ..defaults
    };

    info!("Output directory: {:?}", config.output_dir);

    let outcome = download_dataset(&config)
        .await
        .with_context(|| format!("downloading {} {}", config.dataset, config.data_type))?;

    if let Some(report) = &args.report {
        std::fs::write(report, serde_json::to_string_pretty(&outcome)?)
            .with_context(|| format!("writing report to {}", report.display()))?;
    }

    // download_dataset has already logged the final status line
    if let DownloadOutcome::Complete { paths } = outcome {
        if args.unpack {
            unpack_archives(&config, &paths, args.remove).context("unpacking archives")?;
        }
    }

    Ok(())
}
