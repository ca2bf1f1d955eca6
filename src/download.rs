//! Streaming file download.

use crate::error::FetchFailure;
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};

fn partial_path(filename: &Path) -> PathBuf {
    let mut name = filename.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Downloads `url` to `filename`.
///
/// The body is streamed into `<filename>.part` and renamed once complete, so an
/// interrupted transfer never leaves a file that looks finished.
///
/// # Arguments
///
/// * `client` - Shared HTTP client
/// * `url` - The URL to download from
/// * `filename` - The local path to save to
pub(crate) async fn download_file(
    client: &reqwest::Client,
    url: &str,
    filename: &Path,
) -> Result<(), FetchFailure> {
    if let Some(parent) = filename.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let response = client.get(url).send().await?.error_for_status()?;

    // Drive answers quota and virus-scan interstitials with HTML and a 200 status
    let is_html = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    if is_html {
        return Err(FetchFailure::UnexpectedHtml);
    }

    let content_length = response.content_length();
    let part = partial_path(filename);
    let result = stream_to_file(response, &part).await;
    let written = match result {
        Ok(written) => written,
        Err(e) => {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(e);
        }
    };

    if let Some(expected) = content_length {
        if written != expected {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(FetchFailure::Transport(format!(
                "size mismatch for {}: expected {} bytes, got {} bytes",
                filename.display(),
                expected,
                written
            )));
        }
    } else {
        warn!(
            "Content-Length header was not present for {}. Cannot verify file size.",
            url
        );
    }

    tokio::fs::rename(&part, filename).await?;
    debug!("Saved {} ({} bytes)", filename.display(), written);
    Ok(())
}

async fn stream_to_file(
    response: reqwest::Response,
    part: &Path,
) -> Result<u64, FetchFailure> {
    let mut file = BufWriter::new(tokio::fs::File::create(part).await?);
    let mut byte_stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(piece) = byte_stream.next().await {
        let chunk = piece?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/data/raw_30s_audio-00.tar")),
            PathBuf::from("/data/raw_30s_audio-00.tar.part")
        );
    }
}
