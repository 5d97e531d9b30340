use renderfleet::config::{Settings, WorkerRole};
use renderfleet::jobs::JobKind;
use renderfleet::runtime::{
    bootstrap_fleet_paths, load_status, run_daemon, signal_stop, FleetPaths,
};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn write_script(path: &Path, body: &str) {
    fs::write(path, body).expect("write script");
    let mut perms = fs::metadata(path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod");
}

fn fast_settings(root: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.worker_id = "w1".to_string();
    settings.roles = vec![WorkerRole::VideoWorker];
    settings.sync_root = root.join("sync");
    settings.runtime_root = root.join("rt");
    settings.action.binary = "/bin/sh".to_string();
    settings.action.args = vec!["{script}".to_string()];
    settings.action.reap_stale_processes = false;
    settings.policy.artifact_poll_ms = 10;
    settings.policy.debounce_ms = 50;
    settings.policy.drain_yield_ms = 20;
    settings.policy.pause_backoff_ms = 50;
    settings.policy.inbox_scan_ms = 20;
    settings.policy.write_stability_ms = 0;
    settings
}

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(25));
    }
    done()
}

#[test]
fn daemon_recovers_ingests_publishes_and_stops() {
    let dir = tempdir().expect("tempdir");
    let settings = fast_settings(dir.path());
    let paths = FleetPaths::from_settings(&settings);
    bootstrap_fleet_paths(&paths, &[JobKind::Video]).expect("bootstrap");

    write_script(
        &paths.tool_script(JobKind::Video, "RunwayVideo.ascr"),
        "#!/bin/sh\nprintf '%s' \"$RF_IMAGE_NAME\" > \"$RF_DOWNLOAD_DIR/one.mp4\"\nprintf '%s' \"$RF_IMAGE_NAME\" > \"$RF_DOWNLOAD_DIR/two.mp4\"\n",
    );

    let recovered = paths.job_dir(JobKind::Video, "yt__R1__recovered");
    fs::create_dir_all(&recovered).expect("recovered job");
    fs::write(recovered.join("b.png"), b"pixels").expect("recovered image");

    let daemon = thread::spawn({
        let paths = paths.clone();
        let settings = settings.clone();
        move || run_daemon(&paths, settings)
    });

    let inbox_job = paths.inbox_dir(JobKind::Video).join("yt__J1__clip");
    fs::create_dir_all(&inbox_job).expect("inbox job");
    fs::write(inbox_job.join("a.png"), b"pixels").expect("image");
    fs::write(inbox_job.join("READY"), b"").expect("ready");

    let outbox = paths.outbox_dir(JobKind::Video);
    let published = wait_until(Duration::from_secs(20), || {
        outbox.join("yt__R1__recovered/output/b_take02.mp4").is_file()
            && outbox.join("yt__J1__clip/output/a_take02.mp4").is_file()
            && !paths.job_dir(JobKind::Video, "yt__R1__recovered").exists()
            && !paths.job_dir(JobKind::Video, "yt__J1__clip").exists()
    });

    signal_stop(&paths).expect("signal stop");
    let result = daemon.join().expect("join daemon");
    assert!(published, "jobs were not published");
    result.expect("daemon exits cleanly");

    assert_eq!(
        fs::read_to_string(outbox.join("yt__J1__clip/output/a_take01.mp4")).expect("take"),
        "a.png"
    );
    assert!(outbox.join("yt__J1__clip/input/READY").is_file());
    assert!(!paths.stop_signal_path().exists());

    let status = load_status(&paths).expect("status");
    assert!(!status.running);
    assert!(status.queue.is_empty());

    let log = fs::read_to_string(paths.runtime_log_path()).expect("node log");
    assert!(log.contains("queue.recovered"));
    assert!(log.contains("ingest.promoted"));
    assert!(log.contains("job.finished"));
}

#[test]
fn paused_daemon_leaves_recovered_job_untouched() {
    let dir = tempdir().expect("tempdir");
    let settings = fast_settings(dir.path());
    let paths = FleetPaths::from_settings(&settings);
    bootstrap_fleet_paths(&paths, &[JobKind::Video]).expect("bootstrap");
    fs::write(paths.pause_file(), b"").expect("pause");

    let job = paths.job_dir(JobKind::Video, "yt__P1__waiting");
    fs::create_dir_all(&job).expect("job");
    fs::write(job.join("a.png"), b"pixels").expect("image");

    let daemon = thread::spawn({
        let paths = paths.clone();
        let settings = settings.clone();
        move || run_daemon(&paths, settings)
    });

    let reported = wait_until(Duration::from_secs(10), || {
        load_status(&paths)
            .map(|status| status.running && status.queue.len() == 1)
            .unwrap_or(false)
    });
    thread::sleep(Duration::from_millis(200));
    signal_stop(&paths).expect("signal stop");
    daemon.join().expect("join daemon").expect("daemon exits cleanly");

    assert!(reported, "status never listed the queued job");
    assert!(job.join("a.png").is_file());
    assert!(!job.join("output").exists());
}
