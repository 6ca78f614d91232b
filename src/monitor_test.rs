// Unit tests for download completion detection

use super::*;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn monitor() -> DownloadMonitor {
    DownloadMonitor::from_settings(&DownloadSettings::default(), Duration::from_millis(250))
}

fn write_later(dir: &Path, name: &str, after: Duration) {
    let path = dir.join(name);
    tokio::spawn(async move {
        sleep(after).await;
        fs::write(path, b"data").unwrap();
    });
}

fn remove_later(dir: &Path, name: &str, after: Duration) {
    let path = dir.join(name);
    tokio::spawn(async move {
        sleep(after).await;
        fs::remove_file(path).unwrap();
    });
}

#[tokio::test(start_paused = true)]
async fn test_waits_for_partial_marker_to_clear() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("drawing.pdf.crdownload"), b"").unwrap();
    let baseline = OutputDirectorySnapshot::default();
    write_later(dir.path(), "drawing.pdf", Duration::from_secs(2));
    remove_later(dir.path(), "drawing.pdf.crdownload", Duration::from_secs(3));

    let started = Instant::now();
    let path = monitor()
        .confirm_since(dir.path(), &baseline, Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(path, dir.path().join("drawing.pdf"));
    assert!(started.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_times_out_without_new_file() {
    let dir = TempDir::new().unwrap();

    let started = Instant::now();
    let err = monitor()
        .confirm(dir.path(), Duration::from_secs(5))
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::DownloadTimeout);
    assert!(err.detail.contains("no new artifact"));
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert!(started.elapsed() < Duration::from_millis(5250));
}

#[tokio::test(start_paused = true)]
async fn test_stale_file_does_not_count() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("ARISE.pdf"), b"old").unwrap();

    let err = monitor()
        .confirm(dir.path(), Duration::from_secs(2))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::DownloadTimeout);
}

#[tokio::test(start_paused = true)]
async fn test_stuck_partial_reports_in_progress() {
    let dir = TempDir::new().unwrap();
    let baseline = monitor().snapshot(dir.path());
    fs::write(dir.path().join("ARISE.pdf"), b"new").unwrap();
    fs::write(dir.path().join("other.zip.part"), b"").unwrap();

    let err = monitor()
        .confirm_since(dir.path(), &baseline, Duration::from_secs(2))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::DownloadTimeout);
    assert!(err.detail.contains("still in progress"));
}

#[tokio::test(start_paused = true)]
async fn test_leftover_partial_from_earlier_session_is_ignored() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("old.pdf.crdownload"), b"").unwrap();
    let monitor = monitor();
    let baseline = monitor.snapshot(dir.path());
    write_later(dir.path(), "ARISE.pdf", Duration::from_secs(1));

    let started = Instant::now();
    let path = monitor
        .confirm_since(dir.path(), &baseline, Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(path, dir.path().join("ARISE.pdf"));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(dir.path().join("old.pdf.crdownload").exists());
}

#[tokio::test(start_paused = true)]
async fn test_file_landing_before_first_poll_counts() {
    let dir = TempDir::new().unwrap();
    let monitor = monitor();
    let baseline = monitor.snapshot(dir.path());
    fs::write(dir.path().join("ARISE.DWG"), b"new").unwrap();

    let started = Instant::now();
    let path = monitor
        .confirm_since(dir.path(), &baseline, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(path, dir.path().join("ARISE.DWG"));
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[test]
fn test_snapshot_of_missing_dir_is_empty() {
    let dir = TempDir::new().unwrap();
    let snapshot = monitor().snapshot(&dir.path().join("not-yet-created"));
    assert!(snapshot.is_empty());
}

#[test]
fn test_evaluate_ignores_unknown_extensions_and_dirs() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("nested.pdf")).unwrap();
    fs::write(dir.path().join("notes.txt"), b"").unwrap();
    let monitor = monitor();

    let current = monitor.snapshot(dir.path());
    assert_eq!(current.len(), 1);
    assert_eq!(
        monitor.evaluate(dir.path(), &OutputDirectorySnapshot::default(), &current),
        DownloadState::NoArtifact
    );
}

#[test]
fn test_partial_names_are_flagged() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.pdf.crdownload"), b"").unwrap();
    fs::write(dir.path().join("b.PART"), b"").unwrap();
    fs::write(dir.path().join("c.pdf"), b"").unwrap();

    let snapshot = monitor().snapshot(dir.path());
    let partial: Vec<&str> = snapshot.partial().collect();
    assert_eq!(partial, vec!["a.pdf.crdownload", "b.PART"]);
}
