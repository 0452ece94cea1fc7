//! Error types for the natpack pipeline.
//!
//! Every stage fails with a [`PipelineError`]. The pipeline wraps it in a
//! [`StageError`] naming the stage, without translating the original error.

use camino::Utf8PathBuf;
use natpack_types::stage::Stage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The host OS has no target mapping. Raised before anything is compiled.
    #[error("unsupported platform: {os}")]
    UnsupportedPlatform { os: String },

    /// The compiler process could not be started at all.
    #[error("failed to launch `{program}`: {message}")]
    CompilerSpawn { program: String, message: String },

    /// The compiler ran and exited unsuccessfully.
    #[error("compiler exited with {}", describe_exit(.exit_code))]
    CompilerInvocation { exit_code: Option<i32> },

    #[error("compiler did not finish within {timeout_secs}s and was killed")]
    CompilerTimeout { timeout_secs: u64 },

    #[error("no native artifacts (*.so, *.dll, *.dylib) found in {dir}")]
    ArtifactNotFound { dir: Utf8PathBuf },

    /// A credential property is present but is not a string.
    #[error("invalid credentials: property `{property}` is not a string")]
    InvalidCredentials { property: String },

    #[error("upload to {url} failed: {message}")]
    Upload { url: String, message: String },

    #[error("invalid stage transition: {from} -> {to}")]
    InvalidTransition { from: Stage, to: Stage },

    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

/// A pipeline error tagged with the stage that raised it.
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    pub source: PipelineError,
}

impl StageError {
    pub fn new(stage: Stage, source: PipelineError) -> Self {
        Self { stage, source }
    }

    /// Process exit code for this failure.
    ///
    /// A failed compiler hands its own exit status through; everything else is 1.
    pub fn exit_code(&self) -> u8 {
        match self.source {
            PipelineError::CompilerInvocation {
                exit_code: Some(code),
            } if (1..=255).contains(&code) => code as u8,
            _ => 1,
        }
    }
}
