use sha2::{Digest, Sha256};
use std::path::Path;
use std::process::{Command, Output};

fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

fn write_manifests(dir: &Path, filename: &str, expected: &[u8]) {
    std::fs::write(
        dir.join("raw_30s_audio_gids.txt"),
        format!("abc123   {}\n", filename),
    )
    .unwrap();
    std::fs::write(
        dir.join("raw_30s_audio_sha256_tars.txt"),
        format!("{} {}\n", sha256_hex(expected), filename),
    )
    .unwrap();
}

fn run(server_url: &str, manifests: &Path, output: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_jamendo-sync"))
        .args(["--from", "mtg", "--retries", "0", "--mtg-url", server_url])
        .arg("--manifest-dir")
        .arg(manifests)
        .arg(output)
        .env("NO_COLOR", "1")
        .output()
        .unwrap()
}

#[test]
fn test_checksum_mismatch_is_reported_on_stderr() {
    let mut server = mockito::Server::new();
    let manifests = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_manifests(manifests.path(), "track1.mp3", b"track one");

    let _mock = server
        .mock("GET", "/raw_30s/audio/track1.mp3")
        .with_body("bit rot")
        .create();

    let result = run(&server.url(), manifests.path(), output.path());
    let stdout = String::from_utf8_lossy(&result.stdout);
    let stderr = String::from_utf8_lossy(&result.stderr);

    assert!(result.status.success(), "stderr: {}", stderr);
    assert!(stderr.contains("does not match the checksum"), "stderr: {}", stderr);
    assert!(!stdout.contains("does not match the checksum"), "stdout: {}", stdout);
    assert!(!output.path().join("track1.mp3").exists());
}

#[test]
fn test_final_status_is_printed_once() {
    let mut server = mockito::Server::new();
    let manifests = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_manifests(manifests.path(), "p.tar", b"payload");

    let _mock = server
        .mock("GET", "/raw_30s/audio/p.tar")
        .with_status(404)
        .create();

    let result = run(&server.url(), manifests.path(), output.path());
    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&result.stdout),
        String::from_utf8_lossy(&result.stderr)
    );

    assert!(result.status.success(), "output: {}", combined);
    assert_eq!(combined.matches("Missing files: p.tar").count(), 1, "output: {}", combined);
    assert!(result.stdout.is_empty(), "output: {}", combined);
}
