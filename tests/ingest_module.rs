use renderfleet::ingest::{Debouncer, InboxWatcher, Ingestor, WatchRoot};
use renderfleet::jobs::{JobKey, JobKind};
use renderfleet::queue::ActiveJobs;
use renderfleet::runtime::{bootstrap_fleet_paths, FleetPaths};
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

fn ingestor(paths: &FleetPaths, active: ActiveJobs) -> Ingestor {
    let watcher = InboxWatcher::new(
        vec![
            WatchRoot {
                kind: JobKind::Video,
                dir: paths.inbox_dir(JobKind::Video),
            },
            WatchRoot {
                kind: JobKind::Image,
                dir: paths.inbox_dir(JobKind::Image),
            },
        ],
        2,
        Duration::ZERO,
    );
    Ingestor::new(paths.clone(), watcher, secs(3.0), active)
}

fn drop_video_job(inbox: &Path, name: &str) {
    let folder = inbox.join(name);
    fs::create_dir_all(&folder).expect("job folder");
    fs::write(folder.join("a.png"), b"pixels").expect("image");
    fs::write(folder.join("READY"), b"").expect("ready");
}

#[test]
fn readiness_events_at_t_t1_t2_promote_once_at_t5() {
    let t = Instant::now();
    let mut debouncer = Debouncer::new(secs(3.0));
    for offset in [0.0, 1.0, 2.0] {
        debouncer.arm("yt__1__clip".to_string(), (), t + secs(offset));
        assert!(debouncer.take_due(t + secs(offset)).is_empty());
    }
    assert!(debouncer.take_due(t + secs(4.9)).is_empty());
    assert_eq!(debouncer.take_due(t + secs(5.0)).len(), 1);
    assert!(debouncer.take_due(t + secs(9.0)).is_empty());
}

#[test]
fn repeated_ready_marker_collapses_into_one_promotion() {
    let tmp = tempdir().expect("tempdir");
    let paths = FleetPaths::new(tmp.path().join("sync"), tmp.path().join("rt"), "w1");
    bootstrap_fleet_paths(&paths, &JobKind::ALL).expect("bootstrap");
    let inbox = paths.inbox_dir(JobKind::Video);
    let mut ingestor = ingestor(&paths, ActiveJobs::default());
    let t = Instant::now();

    drop_video_job(&inbox, "yt__J1__clip");
    assert!(ingestor.tick(t).is_empty());

    fs::remove_file(inbox.join("yt__J1__clip/READY")).expect("remove marker");
    assert!(ingestor.tick(t + secs(1.0)).is_empty());
    fs::write(inbox.join("yt__J1__clip/READY"), b"").expect("marker again");
    assert!(ingestor.tick(t + secs(2.0)).is_empty());
    assert_eq!(ingestor.pending_timers(), 1);

    assert!(ingestor.tick(t + secs(4.5)).is_empty());
    let promoted = ingestor.tick(t + secs(5.0));
    assert_eq!(promoted, vec![JobKey::new(JobKind::Video, "yt__J1__clip")]);
    assert!(paths
        .job_dir(JobKind::Video, "yt__J1__clip")
        .join("a.png")
        .is_file());
    assert!(!inbox.join("yt__J1__clip").exists());
    assert!(ingestor.tick(t + secs(9.0)).is_empty());
}

#[test]
fn active_jobs_are_not_promoted_again() {
    let tmp = tempdir().expect("tempdir");
    let paths = FleetPaths::new(tmp.path().join("sync"), tmp.path().join("rt"), "w1");
    bootstrap_fleet_paths(&paths, &JobKind::ALL).expect("bootstrap");
    let active = ActiveJobs::default();
    let key = JobKey::new(JobKind::Video, "yt__J2__busy");
    active.insert(&key);

    let mut ingestor = ingestor(&paths, active.clone());
    drop_video_job(&paths.inbox_dir(JobKind::Video), "yt__J2__busy");
    let t = Instant::now();
    assert!(ingestor.tick(t).is_empty());
    assert_eq!(ingestor.pending_timers(), 0);
    assert!(ingestor.tick(t + secs(10.0)).is_empty());
    assert!(paths.inbox_dir(JobKind::Video).join("yt__J2__busy").exists());
}

#[test]
fn image_prompt_files_promote_and_bad_names_are_ignored() {
    let tmp = tempdir().expect("tempdir");
    let paths = FleetPaths::new(tmp.path().join("sync"), tmp.path().join("rt"), "w1");
    bootstrap_fleet_paths(&paths, &JobKind::ALL).expect("bootstrap");
    let inbox = paths.inbox_dir(JobKind::Image);
    fs::write(inbox.join("tt__J3__cats.txt"), "a cat\n").expect("prompt file");
    fs::write(inbox.join("no_delimiters.txt"), "x\n").expect("bad name");
    fs::write(inbox.join("tt__J4__upload.txt.tmp"), "x\n").expect("temp upload");

    let mut ingestor = ingestor(&paths, ActiveJobs::default());
    let t = Instant::now();
    assert!(ingestor.tick(t).is_empty());
    let promoted = ingestor.tick(t + secs(3.0));
    assert_eq!(promoted, vec![JobKey::new(JobKind::Image, "tt__J3__cats")]);
    assert_eq!(
        fs::read_to_string(
            paths
                .job_dir(JobKind::Image, "tt__J3__cats")
                .join("tt__J3__cats.txt")
        )
        .expect("moved prompt"),
        "a cat\n"
    );
    assert!(inbox.join("no_delimiters.txt").exists());
}

#[test]
fn already_relocated_job_is_enqueued_without_moving() {
    let tmp = tempdir().expect("tempdir");
    let paths = FleetPaths::new(tmp.path().join("sync"), tmp.path().join("rt"), "w1");
    bootstrap_fleet_paths(&paths, &JobKind::ALL).expect("bootstrap");
    fs::create_dir_all(paths.job_dir(JobKind::Video, "yt__J5__dup")).expect("existing job");
    drop_video_job(&paths.inbox_dir(JobKind::Video), "yt__J5__dup");

    let mut ingestor = ingestor(&paths, ActiveJobs::default());
    let t = Instant::now();
    ingestor.tick(t);
    let promoted = ingestor.tick(t + secs(3.0));
    assert_eq!(promoted, vec![JobKey::new(JobKind::Video, "yt__J5__dup")]);
    assert!(paths.inbox_dir(JobKind::Video).join("yt__J5__dup").exists());
}
