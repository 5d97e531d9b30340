use super::types::{io_error, ActionError, ActionReport, ActionRequest, ActionRunner};
use crate::config::Settings;
use crate::runtime::logging::{log_error, log_info, log_warn};
use crate::runtime::FleetPaths;
use std::collections::{BTreeMap, VecDeque};
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const STDERR_TAIL_LINES: usize = 20;
const CHILD_POLL: Duration = Duration::from_millis(50);
/// How long pipe readers get to drain after a kill before they are left behind.
const READER_GRACE: Duration = Duration::from_secs(1);

/// Launches the automation engine binary as a child process.
#[derive(Debug, Clone)]
pub struct ProcessActionRunner {
    pub binary: String,
    /// Argument template; `{script}` is replaced by the request's script path.
    pub args: Vec<String>,
    pub base_env: BTreeMap<String, String>,
    pub benign_stderr: Vec<String>,
    paths: FleetPaths,
    stop: Arc<AtomicBool>,
}

impl ProcessActionRunner {
    pub fn new(
        binary: impl Into<String>,
        args: Vec<String>,
        paths: FleetPaths,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            binary: binary.into(),
            args,
            base_env: BTreeMap::new(),
            benign_stderr: Vec::new(),
            paths,
            stop,
        }
    }

    pub fn from_settings(settings: &Settings, paths: FleetPaths, stop: Arc<AtomicBool>) -> Self {
        let mut runner = Self::new(
            settings.action.binary.clone(),
            settings.action.args.clone(),
            paths,
            stop,
        );
        runner.base_env = settings.action.env.clone();
        runner.benign_stderr = settings.action.benign_stderr.clone();
        runner
    }

    fn render_args(&self, script: &Path) -> Vec<String> {
        let script = script.display().to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{script}", &script))
            .collect()
    }
}

impl ActionRunner for ProcessActionRunner {
    fn run(&self, request: &ActionRequest) -> Result<ActionReport, ActionError> {
        if !request.script.is_file() {
            return Err(ActionError::MissingScript {
                path: request.script.display().to_string(),
            });
        }

        let mut command = Command::new(&self.binary);
        command
            .args(self.render_args(&request.script))
            .envs(&self.base_env)
            .envs(&request.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &request.cwd {
            command.current_dir(cwd);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        log_info(
            &self.paths,
            "action.started",
            &format!("{} script={}", request.label, request.script.display()),
        );
        let started = Instant::now();
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ActionError::MissingBinary {
                    binary: self.binary.clone(),
                })
            }
            Err(err) => return Err(io_error(&request.script, err)),
        };

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io_error(&request.script, std::io::Error::other("missing stdout pipe")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io_error(&request.script, std::io::Error::other("missing stderr pipe")))?;

        let stdout_reader = thread::spawn({
            let paths = self.paths.clone();
            let label = request.label.clone();
            move || {
                for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                    let line = line.trim();
                    if !line.is_empty() {
                        log_info(&paths, "action.stdout", &format!("[{label}] {line}"));
                    }
                }
            }
        });
        let stderr_reader = thread::spawn({
            let paths = self.paths.clone();
            let label = request.label.clone();
            let benign = self.benign_stderr.clone();
            move || {
                let mut tail = VecDeque::new();
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    let line = line.trim().to_string();
                    if line.is_empty() || is_benign_stderr(&line, &benign) {
                        continue;
                    }
                    log_warn(&paths, "action.stderr", &format!("[{label}] {line}"));
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                tail.into_iter().collect::<Vec<_>>()
            }
        });

        let exit_status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    let timed_out = request
                        .timeout
                        .map(|timeout| started.elapsed() > timeout)
                        .unwrap_or(false);
                    let interrupted = self.stop.load(Ordering::Relaxed);
                    if timed_out || interrupted {
                        kill_process_group(child.id());
                        let _ = child.kill();
                        let _ = child.wait();
                        detach_after(stdout_reader, READER_GRACE);
                        detach_after(stderr_reader, READER_GRACE);
                        if interrupted {
                            log_warn(&self.paths, "action.interrupted", &request.label);
                            return Err(ActionError::Interrupted {
                                label: request.label.clone(),
                            });
                        }
                        let timeout_ms = request.timeout.unwrap_or_default().as_millis() as u64;
                        log_error(
                            &self.paths,
                            "action.timeout",
                            &format!("{} killed after {timeout_ms}ms", request.label),
                        );
                        return Err(ActionError::Timeout {
                            label: request.label.clone(),
                            timeout_ms,
                        });
                    }
                    thread::sleep(CHILD_POLL);
                }
                Err(err) => return Err(io_error(&request.script, err)),
            }
        };

        let _ = stdout_reader.join();
        let stderr_lines = stderr_reader.join().unwrap_or_default();
        let exit_code = exit_status.code().unwrap_or(-1);
        if !exit_status.success() {
            log_error(
                &self.paths,
                "action.failed",
                &format!("{} exit_code={exit_code}", request.label),
            );
            return Err(ActionError::NonZeroExit {
                label: request.label.clone(),
                exit_code,
                stderr: stderr_lines.join("\n"),
            });
        }

        log_info(
            &self.paths,
            "action.finished",
            &format!("{} elapsed_ms={}", request.label, started.elapsed().as_millis()),
        );
        Ok(ActionReport {
            exit_code,
            elapsed: started.elapsed(),
            stderr_lines,
        })
    }
}

/// The engine runs as its own process group leader, so this also reaches anything it
/// spawned. Those descendants would otherwise keep the output pipes open.
fn kill_process_group(pid: u32) {
    #[cfg(unix)]
    {
        let _ = Command::new("kill")
            .args(["-KILL", "--", &format!("-{pid}")])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
    }
}

/// Joins a pipe reader if it finishes within `grace`; otherwise leaves it running.
fn detach_after<T>(reader: thread::JoinHandle<T>, grace: Duration) {
    let deadline = Instant::now() + grace;
    while !reader.is_finished() && Instant::now() < deadline {
        thread::sleep(CHILD_POLL);
    }
    if reader.is_finished() {
        let _ = reader.join();
    }
}

/// Known diagnostic noise from the engine's windowing layer.
pub fn is_benign_stderr(line: &str, patterns: &[String]) -> bool {
    patterns
        .iter()
        .any(|pattern| !pattern.is_empty() && line.contains(pattern.as_str()))
}

/// Kills engine processes left over from a previous daemon run. Best-effort.
pub fn reap_stale_processes(binary: &str, paths: &FleetPaths) {
    let name = Path::new(binary)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(binary);
    match Command::new("pkill")
        .args(["-f", name])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) if status.success() => {
            log_info(paths, "action.reaped", &format!("killed stale `{name}` processes"))
        }
        Ok(_) => log_info(paths, "action.reaped", &format!("no stale `{name}` processes")),
        Err(err) => log_warn(paths, "action.reap_failed", &err.to_string()),
    }
}
