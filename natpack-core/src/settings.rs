//! Clap-free settings for pipeline runs.

use crate::publish::{DEFAULT_ARTIFACTORY_HOST, Properties};
use camino::{Utf8Path, Utf8PathBuf};
use natpack_types::publish::Publication;
use std::time::Duration;

pub const REPORT_FILE_NAME: &str = "natpack-report.json";

/// Directory layout of a natives project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub project_dir: Utf8PathBuf,
    /// Cargo crate holding the native sources; the compiler runs here.
    pub natives_dir: Utf8PathBuf,
    /// Where renamed natives from every platform accumulate.
    pub natives_out_dir: Utf8PathBuf,
    /// Archive and report destination.
    pub build_dir: Utf8PathBuf,
}

impl Layout {
    /// Conventional layout: `natives/`, `build/natives/`, `build/`.
    pub fn under(project_dir: impl Into<Utf8PathBuf>) -> Self {
        let project_dir = project_dir.into();
        Self {
            natives_dir: project_dir.join("natives"),
            natives_out_dir: project_dir.join("build").join("natives"),
            build_dir: project_dir.join("build"),
            project_dir,
        }
    }

    /// Toolchain output directory for a target triple.
    pub fn compiler_output_dir(&self, triple: &str, release: bool) -> Utf8PathBuf {
        let profile = if release { "release" } else { "debug" };
        self.natives_dir.join("target").join(triple).join(profile)
    }

    pub fn archive_path(&self, publication: &Publication) -> Utf8PathBuf {
        self.build_dir.join(publication.archive_file_name())
    }

    pub fn report_path(&self) -> Utf8PathBuf {
        self.build_dir.join(REPORT_FILE_NAME)
    }

    /// Resolve `path` against the project dir unless it is already absolute.
    pub fn project_path(&self, path: &Utf8Path) -> Utf8PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::under(".")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerSettings {
    pub program: String,
    pub release: bool,
    /// `None` waits forever.
    pub timeout: Option<Duration>,
}

pub const DEFAULT_COMPILER_TIMEOUT: Duration = Duration::from_secs(30 * 60);

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            program: "cargo".to_string(),
            release: false,
            timeout: Some(DEFAULT_COMPILER_TIMEOUT),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishSettings {
    pub host: String,
    pub upload_timeout: Duration,
    /// Resolve the destination but skip the upload.
    pub dry_run: bool,
    pub properties: Properties,
    /// Value of `PUBLISH_ORG`, if set.
    pub publish_org: Option<String>,
    /// Value of `RESOLUTION_REPO`, if set.
    pub resolution_repo: Option<String>,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_ARTIFACTORY_HOST.to_string(),
            upload_timeout: Duration::from_secs(300),
            dry_run: false,
            properties: Properties::default(),
            publish_org: None,
            resolution_repo: None,
        }
    }
}

/// Settings for one pipeline invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSettings {
    pub layout: Layout,
    pub compiler: CompilerSettings,
    pub publication: Publication,
    pub publish: PublishSettings,
    /// Package natives already present in `natives_out_dir` instead of building.
    pub skip_build: bool,
}
