//! Polling inbox scanner.
//!
//! Each call to [`InboxWatcher::poll`] walks the inbox roots (depth-bounded, hidden entries
//! skipped) and reports files that appeared or disappeared since the last call. A new file
//! is reported only once its size and modification time have stayed unchanged for the
//! stability threshold, so half-written uploads are never seen.

use crate::jobs::JobKind;
use crate::shared::fs_ops::is_hidden_name;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsChange {
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub kind: JobKind,
    pub root: PathBuf,
    pub path: PathBuf,
    pub change: FsChange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRoot {
    pub kind: JobKind,
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Copy)]
struct Observed {
    size: u64,
    modified: Option<SystemTime>,
    unchanged_since: Instant,
    reported: bool,
}

#[derive(Debug)]
pub struct InboxWatcher {
    roots: Vec<WatchRoot>,
    /// 1 = direct children of a root only.
    depth: usize,
    stability: Duration,
    seen: HashMap<PathBuf, (usize, Observed)>,
}

impl InboxWatcher {
    pub fn new(roots: Vec<WatchRoot>, depth: usize, stability: Duration) -> Self {
        Self {
            roots,
            depth: depth.max(1),
            stability,
            seen: HashMap::new(),
        }
    }

    /// Scans once. Unreadable or missing roots yield no events.
    pub fn poll(&mut self, now: Instant) -> Vec<FsEvent> {
        let mut current = HashMap::new();
        for (index, root) in self.roots.iter().enumerate() {
            let mut files = Vec::new();
            collect_files(&root.dir, self.depth, &mut files);
            for (path, size, modified) in files {
                current.insert(path, (index, size, modified));
            }
        }

        let mut events = Vec::new();
        let mut vanished = self
            .seen
            .iter()
            .filter(|(path, _)| !current.contains_key(*path))
            .map(|(path, (index, observed))| (path.clone(), *index, observed.reported))
            .collect::<Vec<_>>();
        vanished.sort();
        for (path, index, reported) in vanished {
            self.seen.remove(&path);
            if reported {
                events.push(self.event(index, path, FsChange::Removed));
            }
        }

        let mut paths = current.into_iter().collect::<Vec<_>>();
        paths.sort_by(|a, b| a.0.cmp(&b.0));
        for (path, (index, size, modified)) in paths {
            let entry = self.seen.entry(path.clone()).or_insert((
                index,
                Observed {
                    size,
                    modified,
                    unchanged_since: now,
                    reported: false,
                },
            ));
            let observed = &mut entry.1;
            if observed.size != size || observed.modified != modified {
                observed.size = size;
                observed.modified = modified;
                observed.unchanged_since = now;
            }
            if !observed.reported
                && now.saturating_duration_since(observed.unchanged_since) >= self.stability
            {
                observed.reported = true;
                events.push(self.event(index, path, FsChange::Added));
            }
        }
        events
    }

    fn event(&self, index: usize, path: PathBuf, change: FsChange) -> FsEvent {
        let root = &self.roots[index];
        FsEvent {
            kind: root.kind,
            root: root.dir.clone(),
            path,
            change,
        }
    }
}

fn collect_files(dir: &Path, depth: usize, out: &mut Vec<(PathBuf, u64, Option<SystemTime>)>) {
    if depth == 0 {
        return;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        if name.to_str().map(is_hidden_name).unwrap_or(true) {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if meta.is_dir() {
            collect_files(&entry.path(), depth - 1, out);
        } else if meta.is_file() {
            out.push((entry.path(), meta.len(), meta.modified().ok()));
        }
    }
}
