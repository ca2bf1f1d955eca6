//! Tar archive extraction and member verification.

use crate::error::SyncError;
use crate::manifest::{load_digest_manifest, manifest_path, DigestManifest, ManifestKind};
use crate::types::DownloadConfig;
use crate::verify::digest_matches;
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tracing::{error, info, warn};

/// Manifest key of a member: its relative path with `/` separators.
fn member_key(member: &Path) -> String {
    member
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn open_archive(archive_path: &Path) -> Result<Archive<Box<dyn Read>>, SyncError> {
    let file = std::fs::File::open(archive_path)?;
    let reader = std::io::BufReader::with_capacity(4 * 1024 * 1024, file);
    let gzipped = matches!(
        archive_path.extension().and_then(|e| e.to_str()),
        Some("gz") | Some("tgz")
    );
    let reader: Box<dyn Read> = if gzipped {
        Box::new(GzDecoder::new(reader))
    } else {
        Box::new(reader)
    };
    Ok(Archive::new(reader))
}

/// Extracts every entry of an archive into `output_dir`.
///
/// # Returns
///
/// Relative paths of the extracted file members. Directory entries, including
/// the archive's root folder, are created on disk but are not members.
fn extract_members(
    archive_path: &Path,
    output_dir: &Path,
    extract_pb: Option<&indicatif::ProgressBar>,
) -> Result<Vec<PathBuf>, SyncError> {
    let mut archive = open_archive(archive_path)?;
    std::fs::create_dir_all(output_dir)?;

    let mut members = Vec::new();

    for (index, entry) in archive.entries()?.enumerate() {
        let mut entry = entry?;
        let member = entry.path()?.into_owned();
        let is_dir = entry.header().entry_type().is_dir();

        if let Some(pb) = extract_pb {
            if index < 10 || index % 100 == 0 {
                pb.set_message(format!("📂 Extracting: {}", member.display()));
            }
            pb.inc(1);
        }

        if !entry.unpack_in(output_dir)? {
            warn!("Skipped {} (path escapes {})", member.display(), output_dir.display());
            continue;
        }
        if !is_dir {
            members.push(member);
        }
    }

    Ok(members)
}

fn unpack_archive_inner(
    archive_path: &Path,
    remove_archive: bool,
    member_digests: Option<&DigestManifest>,
    extract_pb: Option<&indicatif::ProgressBar>,
) -> Result<Vec<PathBuf>, SyncError> {
    let output_dir = match archive_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    info!("Unpacking {}", archive_path.display());
    let members = extract_members(archive_path, &output_dir, extract_pb)?;
    let member_paths: Vec<PathBuf> = members.iter().map(|m| output_dir.join(m)).collect();

    if let Some(digests) = member_digests {
        for (member, path) in members.iter().zip(&member_paths) {
            let key = member_key(member);
            let expected = digests
                .get(&key)
                .ok_or_else(|| SyncError::MissingDigest(key.clone()))?;

            if !digest_matches(path, expected)? {
                error!("{} does not match the checksum", path.display());
                return Err(SyncError::CorruptMember(path.clone()));
            }
        }
        info!("{} track checksums OK", archive_path.display());
    }

    if remove_archive {
        std::fs::remove_file(archive_path)?;
    }

    Ok(member_paths)
}

/// Extracts an archive next to itself and optionally verifies its members.
///
/// # Arguments
///
/// * `archive_path` - Path to the tar (or `.tar.gz`/`.tgz`) file
/// * `remove_archive` - Delete the archive after a successful unpack
/// * `member_digests` - Expected SHA-256 per member path; `None` skips verification
///
/// # Returns
///
/// The extracted member paths. Any checksum mismatch fails the whole call with
/// [`SyncError::CorruptMember`] and the archive is kept.
pub fn unpack_archive(
    archive_path: &Path,
    remove_archive: bool,
    member_digests: Option<&DigestManifest>,
) -> Result<Vec<PathBuf>, SyncError> {
    unpack_archive_inner(archive_path, remove_archive, member_digests, None)
}

/// Unpacks downloaded archives one after another, verifying every member.
///
/// The member checksum manifest of `config.dataset`/`config.data_type` is read
/// once from `config.manifest_dir`.
pub fn unpack_archives(
    config: &DownloadConfig,
    archives: &[PathBuf],
    remove_archives: bool,
) -> Result<Vec<PathBuf>, SyncError> {
    info!("Unpacking tar archives");
    let track_digests = load_digest_manifest(&manifest_path(
        &config.manifest_dir,
        config.dataset,
        config.data_type,
        ManifestKind::TrackDigests,
    ))?;

    let extract_pb = if config.quiet || !atty::is(atty::Stream::Stderr) {
        None
    } else {
        let pb = indicatif::ProgressBar::new_spinner();
        if let Ok(style) = indicatif::ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} {pos} files | {elapsed_precise} elapsed")
        {
            pb.set_style(style);
        }
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Some(pb)
    };

    let mut tracks_checked = Vec::new();
    for archive in archives {
        tracks_checked.extend(unpack_archive_inner(
            archive,
            remove_archives,
            Some(&track_digests),
            extract_pb.as_ref(),
        )?);
    }

    if let Some(pb) = extract_pb {
        pb.finish_with_message(format!("✅ Extracted {} files", tracks_checked.len()));
    }
    info!("Unpacking complete");
    Ok(tracks_checked)
}
