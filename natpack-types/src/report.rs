use crate::artifact::RenamedArtifact;
use crate::platform::{ArchivePlatform, PlatformTarget};
use crate::publish::{Publication, PublishRepository};
use crate::stage::Stage;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// One platform directory inside the natives archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveDir {
    pub platform: ArchivePlatform,
    pub files: Vec<String>,
}

/// Summary of a packaged natives archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSummary {
    pub path: Utf8PathBuf,
    pub dirs: Vec<ArchiveDir>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl ArchiveSummary {
    pub fn total_files(&self) -> usize {
        self.dirs.iter().map(|d| d.files.len()).sum()
    }

    pub fn files_for(&self, platform: ArchivePlatform) -> &[String] {
        self.dirs
            .iter()
            .find(|d| d.platform == platform)
            .map(|d| d.files.as_slice())
            .unwrap_or(&[])
    }
}

/// Report written at the end of every run, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub schema: String,
    pub tool: ToolInfo,
    /// Last stage reached (`done` or `failed` for finished runs).
    pub stage: Stage,
    pub publication: Publication,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<PlatformTarget>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collected: Vec<RenamedArtifact>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<ArchiveSummary>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PublishRepository>,

    /// URLs written by the upload stage.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uploaded: Vec<String>,

    /// Stage that failed, when `stage == failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    pub fn new(tool: ToolInfo, publication: Publication) -> Self {
        Self {
            schema: crate::schema::NATPACK_REPORT_V1.to_string(),
            tool,
            stage: Stage::Idle,
            publication,
            target: None,
            collected: Vec::new(),
            archive: None,
            destination: None,
            uploaded: Vec::new(),
            failed_stage: None,
            error: None,
        }
    }
}
