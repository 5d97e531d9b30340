//! On-disk shape of a job in the processing area.
//!
//! ```text
//! {processing}/{kind}/{name}/
//!     .passes            driver pass counter
//!     input/             consumed sources (prompt text, images, prompts.json)
//!     output/            takes plus one `<item>.done` marker per finished item
//! ```

use super::JobKind;
use crate::shared::fs_ops::{is_hidden_name, move_path};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const INPUT_DIR: &str = "input";
pub const OUTPUT_DIR: &str = "output";
pub const DONE_SUFFIX: &str = ".done";
pub const PROMPT_MAP_FILE: &str = "prompts.json";
pub const PASS_COUNTER_FILE: &str = ".passes";

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDir {
    pub root: PathBuf,
}

impl JobDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn input_dir(&self) -> PathBuf {
        self.root.join(INPUT_DIR)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    pub fn marker_path(&self, item_name: &str) -> PathBuf {
        self.output_dir().join(format!("{item_name}{DONE_SUFFIX}"))
    }

    pub fn is_done(&self, item_name: &str) -> bool {
        self.marker_path(item_name).exists()
    }

    /// Commit point for one work item.
    pub fn mark_done(&self, item_name: &str) -> std::io::Result<()> {
        fs::create_dir_all(self.output_dir())?;
        fs::File::create(self.marker_path(item_name)).map(|_| ())
    }

    /// Ensures `input/` and `output/` exist and moves loose root files into `input/`.
    /// Returns how many files were moved.
    pub fn normalize(&self) -> std::io::Result<usize> {
        let input = self.input_dir();
        fs::create_dir_all(&input)?;
        fs::create_dir_all(self.output_dir())?;

        let mut moved = 0;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name == INPUT_DIR || name == OUTPUT_DIR || is_hidden_name(name) {
                continue;
            }
            if entry.file_type()?.is_file() {
                move_path(&entry.path(), &input.join(name))?;
                moved += 1;
            }
        }
        Ok(moved)
    }

    /// Increments and returns the number of driver passes over this job.
    pub fn bump_pass_counter(&self) -> std::io::Result<u32> {
        let passes = self.read_pass_counter()?.saturating_add(1);
        fs::write(self.root.join(PASS_COUNTER_FILE), passes.to_string())?;
        Ok(passes)
    }

    /// Takes back the pass recorded by the current run. Paused and stopped runs end here,
    /// so only passes that ran to the end or died mid-way count toward the limit.
    pub fn rewind_pass_counter(&self) -> std::io::Result<u32> {
        let passes = self.read_pass_counter()?.saturating_sub(1);
        fs::write(self.root.join(PASS_COUNTER_FILE), passes.to_string())?;
        Ok(passes)
    }

    fn read_pass_counter(&self) -> std::io::Result<u32> {
        match fs::read_to_string(self.root.join(PASS_COUNTER_FILE)) {
            Ok(raw) => Ok(raw.trim().parse::<u32>().unwrap_or(0)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(0),
            Err(err) => Err(err),
        }
    }

    pub fn prompt_map_path(&self) -> PathBuf {
        self.input_dir().join(PROMPT_MAP_FILE)
    }

    /// Optional `input/prompts.json`: image file name to prompt text. A missing file is an
    /// empty map; an unparsable one is reported so the caller can log it.
    pub fn load_prompt_map(&self) -> Result<BTreeMap<String, String>, String> {
        let path = self.prompt_map_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(format!("{}: {err}", path.display())),
        };
        serde_json::from_str(&raw).map_err(|err| format!("{}: {err}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemSource {
    PromptLine { index: usize, text: String },
    Image { path: PathBuf, prompt: String },
}

/// Smallest retryable unit of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Stable name; the completion marker is `<name>.done`.
    pub name: String,
    /// Prefix of produced takes: `<artifact_base>_take01<ext>`.
    pub artifact_base: String,
    pub source: ItemSource,
}

impl WorkItem {
    pub fn prompt(&self) -> &str {
        match &self.source {
            ItemSource::PromptLine { text, .. } => text,
            ItemSource::Image { prompt, .. } => prompt,
        }
    }

    pub fn take_file_name(&self, take: usize, extension: &str) -> String {
        format!("{}_take{take:02}{extension}", self.artifact_base)
    }
}

/// Enumerates the work items of a normalized job directory in a deterministic order.
pub fn discover_items(
    kind: JobKind,
    job: &JobDir,
    prompts: &BTreeMap<String, String>,
    default_prompt: &str,
) -> std::io::Result<Vec<WorkItem>> {
    let files = sorted_input_files(&job.input_dir())?;
    let items = match kind {
        JobKind::Image => {
            let mut lines = Vec::new();
            for path in files.iter().filter(|path| has_extension(path, &["txt"])) {
                let raw = fs::read_to_string(path)?;
                lines.extend(
                    raw.lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .map(str::to_string),
                );
            }
            lines
                .into_iter()
                .enumerate()
                .map(|(index, text)| {
                    let name = format!("prompt{:03}", index + 1);
                    WorkItem {
                        artifact_base: name.clone(),
                        name,
                        source: ItemSource::PromptLine { index, text },
                    }
                })
                .collect()
        }
        JobKind::Video => files
            .into_iter()
            .filter(|path| has_extension(path, &IMAGE_EXTENSIONS))
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?.to_string();
                let stem = path.file_stem()?.to_str()?.to_string();
                let prompt = prompts
                    .get(&name)
                    .cloned()
                    .unwrap_or_else(|| default_prompt.to_string());
                Some(WorkItem {
                    name,
                    artifact_base: stem,
                    source: ItemSource::Image { path, prompt },
                })
            })
            .collect(),
    };
    Ok(items)
}

fn sorted_input_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let hidden = entry.file_name().to_str().map(is_hidden_name).unwrap_or(true);
        if !hidden && entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            extensions
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn normalize_moves_loose_files_but_keeps_hidden_and_subdirs() {
        let dir = tempdir().expect("tempdir");
        let job = JobDir::new(dir.path().join("job"));
        fs::create_dir_all(job.root.join("extras")).expect("extras");
        fs::write(job.root.join("a.png"), "img").expect("image");
        fs::write(job.root.join("READY"), "").expect("ready");
        fs::write(job.root.join(PASS_COUNTER_FILE), "1").expect("counter");

        assert_eq!(job.normalize().expect("normalize"), 2);
        assert!(job.input_dir().join("a.png").exists());
        assert!(job.input_dir().join("READY").exists());
        assert!(job.root.join("extras").is_dir());
        assert!(job.root.join(PASS_COUNTER_FILE).exists());
        assert!(job.output_dir().is_dir());
        assert_eq!(job.normalize().expect("idempotent"), 0);
    }

    #[test]
    fn image_items_are_non_empty_prompt_lines() {
        let dir = tempdir().expect("tempdir");
        let job = JobDir::new(dir.path());
        fs::create_dir_all(job.input_dir()).expect("input");
        fs::write(
            job.input_dir().join("ch__1__cats.txt"),
            "a cat\n\n   \n  a dog  \n",
        )
        .expect("prompts");

        let items =
            discover_items(JobKind::Image, &job, &BTreeMap::new(), "").expect("discover");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "prompt001");
        assert_eq!(items[1].prompt(), "a dog");
        assert_eq!(items[1].take_file_name(3, ".png"), "prompt002_take03.png");
    }

    #[test]
    fn video_items_are_sorted_images_with_mapped_or_default_prompts() {
        let dir = tempdir().expect("tempdir");
        let job = JobDir::new(dir.path());
        fs::create_dir_all(job.input_dir()).expect("input");
        for name in ["b.JPG", "a.png", "notes.txt", "READY"] {
            fs::write(job.input_dir().join(name), "x").expect("file");
        }
        let prompts = BTreeMap::from([("a.png".to_string(), "slow pan".to_string())]);

        let items = discover_items(JobKind::Video, &job, &prompts, "Dynamic Motion")
            .expect("discover");
        let names = items.iter().map(|i| i.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["a.png", "b.JPG"]);
        assert_eq!(items[0].prompt(), "slow pan");
        assert_eq!(items[1].prompt(), "Dynamic Motion");
        assert_eq!(items[1].take_file_name(1, ".mp4"), "b_take01.mp4");
    }

    #[test]
    fn markers_and_pass_counter_persist() {
        let dir = tempdir().expect("tempdir");
        let job = JobDir::new(dir.path());
        assert!(!job.is_done("a.png"));
        job.mark_done("a.png").expect("mark");
        assert!(job.is_done("a.png"));
        assert_eq!(
            fs::metadata(job.marker_path("a.png")).expect("meta").len(),
            0
        );

        assert_eq!(job.bump_pass_counter().expect("first"), 1);
        assert_eq!(job.bump_pass_counter().expect("second"), 2);
        assert_eq!(job.rewind_pass_counter().expect("rewind"), 1);
        assert_eq!(job.bump_pass_counter().expect("third"), 2);
    }

    #[test]
    fn invalid_prompt_map_is_reported() {
        let dir = tempdir().expect("tempdir");
        let job = JobDir::new(dir.path());
        assert!(job.load_prompt_map().expect("missing is empty").is_empty());
        fs::create_dir_all(job.input_dir()).expect("input");
        fs::write(job.prompt_map_path(), "{oops").expect("write");
        assert!(job.load_prompt_map().is_err());
    }
}
