use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn renderfleet(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_renderfleet"))
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .expect("run binary")
}

fn write_config(root: &Path) -> std::path::PathBuf {
    let path = root.join("node_config.yaml");
    fs::write(
        &path,
        format!(
            "worker_id: w9\nroles: [image-worker]\nsync_root: {}\nruntime_root: {}\n",
            root.join("sync").display(),
            root.join("rt").display()
        ),
    )
    .expect("write config");
    path
}

#[test]
fn pause_status_resume_and_stop_operate_on_runtime_files() {
    let dir = tempdir().expect("tempdir");
    let config = write_config(dir.path());
    let runtime = dir.path().join("rt");

    let output = renderfleet(&config, &["pause"]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(runtime.join("PAUSED").exists());

    let output = renderfleet(&config, &["status"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("running=false"), "stdout: {stdout}");
    assert!(stdout.contains("activity=paused"), "stdout: {stdout}");

    let output = renderfleet(&config, &["resume"]);
    assert!(output.status.success());
    assert!(!runtime.join("PAUSED").exists());

    let output = renderfleet(&config, &["stop"]);
    assert!(output.status.success());
    assert!(runtime.join("daemon/stop").exists());
}

#[test]
fn help_needs_no_config_and_unknown_command_fails() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("fresh/node_config.yaml");

    let output = renderfleet(&config, &["help"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Commands:"));

    let output = renderfleet(&config, &["launch"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown command `launch`"));
}
