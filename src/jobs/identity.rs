use crate::shared::fs_ops::is_hidden_name;
use crate::shared::time::today_stamp;
use serde::{Deserialize, Serialize};

pub const NAME_DELIMITER: &str = "__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Single-item job: one prompt text file, one work item per non-empty line.
    Image,
    /// Multi-item job: a folder of source images, one work item per image.
    Video,
}

impl JobKind {
    pub const ALL: [JobKind; 2] = [JobKind::Image, JobKind::Video];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Queue key: one processing directory per kind and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobKey {
    pub kind: JobKind,
    pub name: String,
}

impl JobKey {
    pub fn new(kind: JobKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobIdentity {
    pub kind: JobKind,
    pub channel: String,
    pub job_id: String,
    pub name: String,
    /// The file or folder name the identity was parsed from.
    pub source_name: String,
    pub date: String,
}

impl JobIdentity {
    /// `{channel}__{job_id}__{name}`, the outbox folder for this job.
    pub fn outbox_folder_name(&self) -> String {
        [
            self.channel.as_str(),
            self.job_id.as_str(),
            self.name.as_str(),
        ]
        .join(NAME_DELIMITER)
    }
}

/// Names that never denote a job: hidden entries and in-flight temporary files.
pub fn is_ignored_name(name: &str) -> bool {
    is_hidden_name(name) || name.ends_with(".tmp")
}

/// Splits `channel__jobId__name...` into an identity. The name may itself contain the
/// delimiter; everything after the job id is rejoined. Returns `None` for ignored names
/// and names without at least a channel and a job id.
pub fn parse_job_name(source_name: &str, kind: JobKind) -> Option<JobIdentity> {
    if is_ignored_name(source_name) {
        return None;
    }
    let parts = source_name.split(NAME_DELIMITER).collect::<Vec<_>>();
    if parts.len() < 2 {
        return None;
    }

    let rest = parts[2..].join(NAME_DELIMITER);
    let name = rest
        .strip_suffix(".txt")
        .or_else(|| rest.strip_suffix(".json"))
        .unwrap_or(&rest)
        .to_string();

    Some(JobIdentity {
        kind,
        channel: parts[0].to_string(),
        job_id: parts[1].to_string(),
        name,
        source_name: source_name.to_string(),
        date: today_stamp(),
    })
}
