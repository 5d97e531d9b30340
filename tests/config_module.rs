use renderfleet::config::{load_or_init, SettingsSource, WorkerRole};
use renderfleet::jobs::JobKind;
use renderfleet::runtime::FleetPaths;
use std::fs;
use tempfile::tempdir;

#[test]
fn node_config_drives_every_derived_location() {
    let dir = tempdir().expect("tempdir");
    let sync = dir.path().join("sync");
    let runtime = dir.path().join("runtime");
    let path = dir.path().join("node_config.yaml");
    fs::write(
        &path,
        format!(
            r#"
worker_id: worker042
roles: [video-worker, image-dispatcher]
sync_root: {}
runtime_root: {}
pipelines:
  video:
    script: Custom.ascr
    expected_artifacts: 3
    artifact_extension: .mov
    abort_flags: [Issue.txt]
"#,
            sync.display(),
            runtime.display()
        ),
    )
    .expect("write config");

    let loaded = load_or_init(&path);
    assert_eq!(loaded.source, SettingsSource::File);
    let settings = loaded.settings;
    assert_eq!(
        settings.roles,
        vec![WorkerRole::VideoWorker, WorkerRole::ImageDispatcher]
    );
    assert_eq!(settings.enabled_kinds(), vec![JobKind::Video]);
    assert_eq!(settings.pipeline(JobKind::Video).expected_artifacts, 3);
    assert_eq!(settings.pipeline(JobKind::Image).expected_artifacts, 4);

    let paths = FleetPaths::from_settings(&settings);
    assert_eq!(
        paths.inbox_dir(JobKind::Video),
        sync.join("video/assigned/worker042/inbox")
    );
    assert_eq!(paths.outbox_dir(JobKind::Video), sync.join("video/outbox"));
    assert_eq!(
        paths.tool_script(JobKind::Video, "Custom.ascr"),
        sync.join("video/tools/Custom.ascr")
    );
    assert_eq!(
        paths.job_dir(JobKind::Video, "yt__1__a"),
        runtime.join("processing/video/yt__1__a")
    );
    assert_eq!(paths.pause_file(), runtime.join("PAUSED"));
}

#[test]
fn relative_roots_fail_validation_and_fall_back() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("node_config.yaml");
    fs::write(&path, "sync_root: relative/sync\n").expect("write config");

    let loaded = load_or_init(&path);
    match loaded.source {
        SettingsSource::FallbackDefault { reason } => assert!(reason.contains("sync_root")),
        other => panic!("unexpected source: {other:?}"),
    }
}
