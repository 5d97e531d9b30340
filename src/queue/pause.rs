use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Polled at the points where pausing is allowed: before dequeuing and between work items.
pub trait PauseSignal {
    fn is_paused(&self) -> bool;
}

impl<F> PauseSignal for F
where
    F: Fn() -> bool,
{
    fn is_paused(&self) -> bool {
        self()
    }
}

/// Pause driven by the presence of a sentinel file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PauseSentinel {
    pub path: PathBuf,
}

impl PauseSentinel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PauseSignal for PauseSentinel {
    fn is_paused(&self) -> bool {
        self.path.exists()
    }
}

pub fn set_paused(path: &Path, paused: bool) -> std::io::Result<()> {
    if paused {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, b"")
    } else {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}
