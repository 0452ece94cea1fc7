//! Port traits abstracting all I/O away from the pipeline.

use camino::Utf8Path;
use natpack_types::publish::Credentials;
use std::time::Duration;

/// How an external process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The process exited. `code` is `None` when it was terminated by a signal.
    Exited { code: Option<i32> },
    /// The process outlived its timeout and was killed.
    TimedOut,
}

/// Runs an external executable to completion.
pub trait ProcessRunner {
    /// Spawn `program` with `args` in `working_dir` and block until it exits or
    /// `timeout` elapses. Errors are reserved for failing to start the process.
    fn invoke(
        &self,
        program: &str,
        args: &[String],
        working_dir: &Utf8Path,
        timeout: Option<Duration>,
    ) -> anyhow::Result<ProcessOutcome>;
}

/// Stores a blob at a repository URL.
pub trait UploadPort {
    fn put(&self, url: &str, body: &[u8], credentials: Option<&Credentials>) -> anyhow::Result<()>;
}

/// File-system write operations.
pub trait WritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()>;
    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()>;
}
