use super::watcher::{FsChange, FsEvent};
use crate::jobs::{parse_job_name, JobIdentity, JobKey, JobKind};
use std::path::{Path, PathBuf};

/// Marker a dispatcher drops into a video job folder once every source image is uploaded.
pub const READY_MARKER: &str = "READY";
pub const PROMPT_EXTENSION: &str = ".txt";

/// A job whose source is complete in the inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyJob {
    pub key: JobKey,
    pub identity: JobIdentity,
    /// Video: the job folder. Image: the prompt file.
    pub source: PathBuf,
}

/// Maps a watcher event to the job it makes ready, if any. Video jobs are folders holding
/// a `READY` marker; image jobs are prompt files directly in the inbox.
pub fn ready_job(event: &FsEvent) -> Option<ReadyJob> {
    if event.change != FsChange::Added {
        return None;
    }
    let parent = event.path.parent()?;
    let file_name = event.path.file_name()?.to_str()?;
    match event.kind {
        JobKind::Video => {
            if file_name != READY_MARKER || parent.parent() != Some(event.root.as_path()) {
                return None;
            }
            let folder = parent.file_name()?.to_str()?;
            build(JobKind::Video, folder, parent)
        }
        JobKind::Image => {
            if parent != event.root.as_path() {
                return None;
            }
            let stem = file_name.strip_suffix(PROMPT_EXTENSION)?;
            build(JobKind::Image, stem, &event.path).filter(|_| !stem.is_empty())
        }
    }
}

fn build(kind: JobKind, name: &str, source: &Path) -> Option<ReadyJob> {
    let identity = parse_job_name(name, kind)?;
    Some(ReadyJob {
        key: JobKey::new(kind, name),
        identity,
        source: source.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn added(kind: JobKind, root: &str, path: &str) -> FsEvent {
        FsEvent {
            kind,
            root: PathBuf::from(root),
            path: PathBuf::from(path),
            change: FsChange::Added,
        }
    }

    #[test]
    fn video_ready_marker_names_its_folder() {
        let ready = ready_job(&added(JobKind::Video, "/in", "/in/yt__7__clip/READY"))
            .expect("ready video");
        assert_eq!(ready.key, JobKey::new(JobKind::Video, "yt__7__clip"));
        assert_eq!(ready.source, PathBuf::from("/in/yt__7__clip"));

        assert!(ready_job(&added(JobKind::Video, "/in", "/in/yt__7__clip/a.png")).is_none());
        assert!(ready_job(&added(JobKind::Video, "/in", "/in/READY")).is_none());
        assert!(ready_job(&added(JobKind::Video, "/in", "/in/badname/READY")).is_none());
    }

    #[test]
    fn image_prompt_file_must_sit_in_the_inbox_root() {
        let ready = ready_job(&added(JobKind::Image, "/in", "/in/tt__3__cats.txt"))
            .expect("ready image");
        assert_eq!(ready.key.name, "tt__3__cats");
        assert_eq!(ready.identity.name, "cats");

        assert!(ready_job(&added(JobKind::Image, "/in", "/in/sub/tt__3__cats.txt")).is_none());
        assert!(ready_job(&added(JobKind::Image, "/in", "/in/tt__3__cats.png")).is_none());

        let mut removed = added(JobKind::Image, "/in", "/in/tt__3__cats.txt");
        removed.change = FsChange::Removed;
        assert!(ready_job(&removed).is_none());
    }
}
