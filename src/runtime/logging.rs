use super::FleetPaths;
use crate::shared::time::now_rfc3339;
use std::fs;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Appends one JSON line to the node log and echoes it to stderr for the journal.
/// Logging is best-effort and never fails the caller.
pub fn append_runtime_log(paths: &FleetPaths, level: LogLevel, event: &str, message: &str) {
    eprintln!("[{}] {event}: {message}", level.as_str());

    let payload = serde_json::json!({
        "timestamp": now_rfc3339(),
        "level": level.as_str(),
        "worker": paths.worker_id,
        "event": event,
        "message": message,
    });
    let Ok(line) = serde_json::to_string(&payload) else {
        return;
    };

    let path = paths.runtime_log_path();
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(mut file) = fs::OpenOptions::new().create(true).append(true).open(path) else {
        return;
    };
    let _ = writeln!(file, "{line}");
}

pub fn log_info(paths: &FleetPaths, event: &str, message: &str) {
    append_runtime_log(paths, LogLevel::Info, event, message);
}

pub fn log_warn(paths: &FleetPaths, event: &str, message: &str) {
    append_runtime_log(paths, LogLevel::Warn, event, message);
}

pub fn log_error(paths: &FleetPaths, event: &str, message: &str) {
    append_runtime_log(paths, LogLevel::Error, event, message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn log_lines_are_json_objects_with_event_and_level() {
        let dir = tempdir().expect("tempdir");
        let paths = FleetPaths::new(dir.path().join("sync"), dir.path().join("rt"), "w1");

        log_info(&paths, "queue.enqueued", "video/ch__1__a");
        log_warn(&paths, "artifacts.straggler", "accepting 1/2");

        let raw = fs::read_to_string(paths.runtime_log_path()).expect("read log");
        let lines = raw.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).expect("json");
        assert_eq!(first["event"], "queue.enqueued");
        assert_eq!(first["level"], "info");
        assert_eq!(first["worker"], "w1");
        let second: serde_json::Value = serde_json::from_str(lines[1]).expect("json");
        assert_eq!(second["level"], "warn");
    }
}
