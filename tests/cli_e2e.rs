//! End-to-end CLI tests for the trackfetch binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Command isolated from any user config file.
fn trackfetch(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("trackfetch").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_binary_help_displays_usage() {
    let home = TempDir::new().unwrap();
    trackfetch(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Search catalog sites"));
}

#[test]
fn test_binary_version_displays_version() {
    let home = TempDir::new().unwrap();
    trackfetch(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("trackfetch"));
}

#[test]
fn test_binary_requires_tracks_file() {
    let home = TempDir::new().unwrap();
    trackfetch(&home)
        .assert()
        .failure()
        .stderr(predicate::str::contains("TRACKS_FILE"));
}

#[test]
fn test_missing_primary_endpoint_fails_fast() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let tracks = work.path().join("tracks.txt");
    std::fs::write(&tracks, "Rowdy Baby - Dhanush\n").unwrap();

    trackfetch(&home)
        .arg(&tracks)
        .arg("-o")
        .arg(work.path().join("out"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no primary catalog endpoint"));
}

#[test]
fn test_invalid_config_file_fails_fast() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let config = work.path().join("config.toml");
    std::fs::write(&config, "concurrency = 40\n").unwrap();

    trackfetch(&home)
        .arg(work.path().join("tracks.txt"))
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("concurrency"));
}

#[test]
fn test_empty_track_list_exits_zero() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let tracks = work.path().join("tracks.txt");
    std::fs::write(&tracks, "# nothing yet\n\n").unwrap();

    trackfetch(&home)
        .arg(&tracks)
        .args(["--primary-endpoint", "http://127.0.0.1:9", "--fast", "-q"])
        .arg("-o")
        .arg(work.path().join("out"))
        .assert()
        .success()
        .stdout(predicate::str::contains("No tracks to fetch"));
}

#[test]
fn test_every_track_failing_exits_two() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let tracks = work.path().join("tracks.txt");
    std::fs::write(&tracks, "Ghost Song - Nobody\n").unwrap();

    trackfetch(&home)
        .arg(&tracks)
        .args([
            "--primary-endpoint",
            "http://127.0.0.1:9",
            "--fast",
            "-q",
            "-r",
            "1",
        ])
        .arg("-o")
        .arg(work.path().join("out"))
        .assert()
        .code(2)
        .stdout(predicate::str::contains("0/1 tracks stored"))
        .stdout(predicate::str::contains("no-results"));
}

#[tokio::test]
async fn test_successful_batch_writes_file_and_manifest() {
    let catalog = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<a href="/songs/vaathi-coming">Vaathi Coming - Master</a>"#,
        ))
        .mount(&catalog)
        .await;
    Mock::given(method("GET"))
        .and(path("/songs/vaathi-coming"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<a href="{}/files/vaathi.mp3">Download 320kbps</a>"#,
            catalog.uri()
        )))
        .mount(&catalog)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/vaathi.mp3"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/mpeg")
                .set_body_bytes(vec![9u8; 3000]),
        )
        .mount(&catalog)
        .await;

    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let tracks = work.path().join("tracks.json");
    std::fs::write(&tracks, r#"[{"title": "Vaathi Coming", "artist": "Anirudh"}]"#).unwrap();
    let out = work.path().join("out");

    let mut cmd = trackfetch(&home);
    cmd.arg(&tracks)
        .args(["--primary-endpoint", &catalog.uri(), "--fast", "-q", "--manifest"])
        .arg("-o")
        .arg(&out);
    // The binary blocks; run it off the async runtime that serves the mocks.
    let assert = tokio::task::spawn_blocking(move || cmd.assert())
        .await
        .unwrap();

    assert
        .success()
        .stdout(predicate::str::contains("1/1 tracks stored"));
    let stored = out.join("01_Vaathi Coming - Anirudh.mp3");
    assert_eq!(std::fs::read(&stored).unwrap().len(), 3000);
    let manifest = std::fs::read_to_string(out.join("manifest.json")).unwrap();
    assert!(manifest.contains("01_Vaathi Coming - Anirudh.mp3"));
}
