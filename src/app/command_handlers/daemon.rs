use crate::app::command_support::CommandContext;
use crate::queue::set_paused;
use crate::runtime::{load_status, run_daemon, signal_stop, DaemonStatus, NodeActivity};

pub fn cmd_run(context: CommandContext) -> Result<String, String> {
    let CommandContext { loaded, paths } = context;
    run_daemon(&paths, loaded.settings).map_err(|e| e.to_string())?;
    Ok(format!("stopped\nworker={}", paths.worker_id))
}

pub fn cmd_pause(context: &CommandContext) -> Result<String, String> {
    let sentinel = context.paths.pause_file();
    set_paused(&sentinel, true).map_err(|e| format!("{}: {e}", sentinel.display()))?;
    Ok(format!("paused\nsentinel={}", sentinel.display()))
}

pub fn cmd_resume(context: &CommandContext) -> Result<String, String> {
    let sentinel = context.paths.pause_file();
    set_paused(&sentinel, false).map_err(|e| format!("{}: {e}", sentinel.display()))?;
    Ok("resumed".to_string())
}

pub fn cmd_status(context: &CommandContext) -> Result<String, String> {
    let status = load_status(&context.paths).map_err(|e| e.to_string())?;
    Ok(render_status(&status, context.paths.pause_file().exists()))
}

pub fn cmd_stop(context: &CommandContext) -> Result<String, String> {
    signal_stop(&context.paths).map_err(|e| e.to_string())?;
    Ok(format!(
        "stop requested\nsignal={}",
        context.paths.stop_signal_path().display()
    ))
}

pub(crate) fn render_status(status: &DaemonStatus, paused: bool) -> String {
    let mut lines = vec![
        format!("running={}", status.running),
        format!(
            "pid={}",
            status
                .pid
                .map(|pid| pid.to_string())
                .unwrap_or_else(|| "none".to_string())
        ),
        format!("worker={}", status.worker_id),
        format!("activity={}", activity_label(status, paused)),
        format!(
            "current_job={}",
            status.current_job.as_deref().unwrap_or("none")
        ),
        format!("queued={}", status.queue.len()),
    ];
    for key in &status.queue {
        lines.push(format!("  {key}"));
    }
    for (worker_id, health) in &status.workers {
        lines.push(format!(
            "worker:{worker_id}={:?} last_heartbeat={}",
            health.state,
            health
                .last_heartbeat
                .map(|at| at.to_string())
                .unwrap_or_else(|| "none".to_string())
        ));
    }
    if let Some(error) = &status.last_error {
        lines.push(format!("last_error={error}"));
    }
    lines.join("\n")
}

fn activity_label(status: &DaemonStatus, paused: bool) -> &'static str {
    if paused {
        return "paused";
    }
    if !status.running {
        return "stopped";
    }
    match status.activity {
        NodeActivity::Idle => "idle",
        NodeActivity::Busy => "busy",
        NodeActivity::Paused => "paused",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_render_reflects_sentinel_and_queue() {
        let status = DaemonStatus {
            running: true,
            pid: Some(42),
            worker_id: "worker001".to_string(),
            current_job: Some("video/yt__1__clip".to_string()),
            queue: vec!["video/yt__1__clip".to_string(), "image/tt__2__b".to_string()],
            ..DaemonStatus::default()
        };
        let rendered = render_status(&status, true);
        assert!(rendered.contains("pid=42"));
        assert!(rendered.contains("activity=paused"));
        assert!(rendered.contains("queued=2"));
        assert!(rendered.contains("  image/tt__2__b"));
    }
}
