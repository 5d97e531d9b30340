use renderfleet::jobs::{wait_for_artifacts, ArtifactTarget, WaitError, WaitPolicy};
use renderfleet::runtime::FleetPaths;
use std::fs;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn policy(straggler_ms: u64, global_ms: u64) -> WaitPolicy {
    WaitPolicy {
        poll_interval: Duration::from_millis(10),
        straggler_timeout: Duration::from_millis(straggler_ms),
        global_timeout: Duration::from_millis(global_ms),
    }
}

#[test]
fn full_set_is_returned_sorted_and_other_extensions_ignored() {
    let dir = tempdir().expect("tempdir");
    let paths = FleetPaths::new(dir.path().join("sync"), dir.path().join("rt"), "w1");
    let downloads = dir.path().join("downloads");
    fs::create_dir_all(&downloads).expect("downloads");
    fs::write(downloads.join("b.mp4"), b"b").expect("b");
    fs::write(downloads.join("a.mp4"), b"a").expect("a");
    fs::write(downloads.join("c.part"), b"c").expect("partial");
    fs::write(downloads.join(".hidden.mp4"), b"h").expect("hidden");

    let target = ArtifactTarget {
        dir: downloads.clone(),
        count: 2,
        extension: ".mp4".to_string(),
    };
    let files = wait_for_artifacts(&target, policy(500, 2_000), &AtomicBool::new(false), &paths)
        .expect("ready");
    assert_eq!(files, vec![downloads.join("a.mp4"), downloads.join("b.mp4")]);
}

#[test]
fn straggler_window_accepts_partial_set_before_global_timeout() {
    let dir = tempdir().expect("tempdir");
    let paths = FleetPaths::new(dir.path().join("sync"), dir.path().join("rt"), "w1");
    let downloads = dir.path().join("downloads");
    fs::create_dir_all(&downloads).expect("downloads");

    let writer = thread::spawn({
        let downloads = downloads.clone();
        move || {
            thread::sleep(Duration::from_millis(50));
            fs::write(downloads.join("take.mp4"), b"only one").expect("write take");
        }
    });

    let started = Instant::now();
    let target = ArtifactTarget {
        dir: downloads.clone(),
        count: 2,
        extension: ".mp4".to_string(),
    };
    let files = wait_for_artifacts(&target, policy(150, 5_000), &AtomicBool::new(false), &paths)
        .expect("partial accepted");
    writer.join().expect("join writer");

    assert_eq!(files, vec![downloads.join("take.mp4")]);
    assert!(started.elapsed() < Duration::from_secs(3));
    let log = fs::read_to_string(paths.runtime_log_path()).expect("log");
    assert!(log.contains("artifacts.straggler"));
}

#[test]
fn nothing_produced_fails_at_global_timeout() {
    let dir = tempdir().expect("tempdir");
    let paths = FleetPaths::new(dir.path().join("sync"), dir.path().join("rt"), "w1");
    let downloads = dir.path().join("downloads");
    fs::create_dir_all(&downloads).expect("downloads");

    let started = Instant::now();
    let target = ArtifactTarget {
        dir: downloads,
        count: 2,
        extension: ".mp4".to_string(),
    };
    let err = wait_for_artifacts(&target, policy(50, 200), &AtomicBool::new(false), &paths)
        .expect_err("timeout");
    assert!(matches!(err, WaitError::GlobalTimeout { .. }));
    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[test]
fn stop_flag_interrupts_the_wait() {
    let dir = tempdir().expect("tempdir");
    let paths = FleetPaths::new(dir.path().join("sync"), dir.path().join("rt"), "w1");
    let downloads = dir.path().join("downloads");
    fs::create_dir_all(&downloads).expect("downloads");

    let target = ArtifactTarget {
        dir: downloads,
        count: 1,
        extension: ".png".to_string(),
    };
    let err = wait_for_artifacts(&target, policy(50, 60_000), &AtomicBool::new(true), &paths)
        .expect_err("interrupted");
    assert!(matches!(err, WaitError::Interrupted));
}
