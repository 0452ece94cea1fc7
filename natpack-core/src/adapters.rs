//! Default port implementations backed by processes, HTTP and the filesystem.

use crate::error::PipelineError;
use crate::ports::{ProcessOutcome, ProcessRunner, UploadPort, WritePort};
use anyhow::{Context, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use natpack_types::publish::Credentials;
use std::process::Command;
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Runs programs with inherited stdio so compiler output stays visible.
#[derive(Debug, Clone, Default)]
pub struct ShellProcessRunner;

impl ProcessRunner for ShellProcessRunner {
    fn invoke(
        &self,
        program: &str,
        args: &[String],
        working_dir: &Utf8Path,
        timeout: Option<Duration>,
    ) -> anyhow::Result<ProcessOutcome> {
        let mut child = Command::new(program)
            .args(args)
            .current_dir(working_dir)
            .spawn()
            .with_context(|| format!("spawn {program} in {working_dir}"))?;

        let status = match timeout {
            Some(limit) => match child.wait_timeout(limit).context("wait for child")? {
                Some(status) => status,
                None => {
                    warn!(program, secs = limit.as_secs(), "timeout elapsed; killing");
                    // Only the direct child is killed. Processes it spawned
                    // (rustc, linkers) are left to finish on their own.
                    child.kill().context("kill timed-out child")?;
                    child.wait().context("reap timed-out child")?;
                    return Ok(ProcessOutcome::TimedOut);
                }
            },
            None => child.wait().context("wait for child")?,
        };

        debug!(program, status = ?status, "process exited");
        Ok(ProcessOutcome::Exited {
            code: status.code(),
        })
    }
}

/// `Authorization` header value for HTTP basic auth.
pub fn basic_auth_header(credentials: &Credentials) -> String {
    let raw = format!("{}:{}", credentials.username, credentials.password);
    format!("Basic {}", STANDARD.encode(raw))
}

/// HTTP PUT uploads, as accepted by Maven-style repositories.
#[derive(Debug, Clone)]
pub struct HttpUploadPort {
    agent: ureq::Agent,
}

impl HttpUploadPort {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl UploadPort for HttpUploadPort {
    fn put(&self, url: &str, body: &[u8], credentials: Option<&Credentials>) -> anyhow::Result<()> {
        let mut request = self
            .agent
            .put(url)
            .set("Content-Type", "application/octet-stream");
        if let Some(credentials) = credentials {
            request = request.set("Authorization", &basic_auth_header(credentials));
        }

        match request.send_bytes(body) {
            Ok(response) => {
                debug!(url, status = response.status(), "PUT ok");
                Ok(())
            }
            Err(ureq::Error::Status(code, response)) => {
                bail!("server responded {code} {}", response.status_text())
            }
            Err(err) => Err(err).with_context(|| format!("PUT {url}")),
        }
    }
}

/// Uploads into a local directory addressed by a `file://` URL.
#[derive(Debug, Clone, Default)]
pub struct FsUploadPort;

impl FsUploadPort {
    fn path_for(url: &str) -> anyhow::Result<Utf8PathBuf> {
        match url.strip_prefix("file://") {
            Some(path) if !path.is_empty() => Ok(Utf8PathBuf::from(path)),
            _ => bail!("not a file URL: {url}"),
        }
    }
}

impl UploadPort for FsUploadPort {
    fn put(&self, url: &str, body: &[u8], _credentials: Option<&Credentials>) -> anyhow::Result<()> {
        let path = Self::path_for(url)?;
        FsWritePort.write_file(&path, body)
    }
}

/// Filesystem write operations.
#[derive(Debug, Clone, Default)]
pub struct FsWritePort;

impl WritePort for FsWritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create parent dir for {path}"))?;
        }
        fs::write(path, contents).with_context(|| format!("write {path}"))
    }

    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()> {
        fs::create_dir_all(path).with_context(|| format!("create_dir_all {path}"))
    }
}

/// Pick an uploader for the repository URL's scheme.
pub fn upload_port_for(url: &str, timeout: Duration) -> Result<Box<dyn UploadPort>, PipelineError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(Box::new(HttpUploadPort::new(timeout)))
    } else if url.starts_with("file://") {
        Ok(Box::new(FsUploadPort))
    } else {
        Err(PipelineError::Upload {
            url: url.to_string(),
            message: "unsupported URL scheme (expected http, https or file)".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
        (temp, root)
    }

    #[test]
    fn basic_auth_is_base64_of_user_colon_pass() {
        let creds = Credentials {
            username: "Aladdin".to_string(),
            password: "open sesame".to_string(),
        };
        assert_eq!(basic_auth_header(&creds), "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }

    #[test]
    fn fs_upload_writes_and_creates_parents() {
        let (_temp, root) = temp_root();
        let url = format!("file://{root}/libs-release-local/org/x/1.0/x-1.0.zip");

        FsUploadPort.put(&url, b"zip", None).expect("put");

        let written = root.join("libs-release-local/org/x/1.0/x-1.0.zip");
        assert_eq!(std::fs::read(written).expect("read"), b"zip");
    }

    #[test]
    fn fs_upload_rejects_non_file_url() {
        let err = FsUploadPort
            .put("http://example.invalid/x", b"", None)
            .expect_err("not a file url");
        assert!(err.to_string().contains("not a file URL"));
    }

    #[test]
    fn upload_port_selection_by_scheme() {
        let timeout = Duration::from_secs(1);
        assert!(upload_port_for("http://repo/x", timeout).is_ok());
        assert!(upload_port_for("https://repo/x", timeout).is_ok());
        assert!(upload_port_for("file:///tmp/x", timeout).is_ok());

        let err = upload_port_for("ftp://repo/x", timeout).err().expect("unsupported");
        assert!(matches!(err, PipelineError::Upload { ref url, .. } if url == "ftp://repo/x"));
    }

    #[test]
    fn write_port_creates_parent_dirs() {
        let (_temp, root) = temp_root();
        let path = root.join("a/b/report.json");
        FsWritePort.write_file(&path, b"{}").expect("write");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "{}");
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let (_temp, root) = temp_root();
        let result = ShellProcessRunner.invoke(
            "natpack-definitely-not-a-real-program",
            &[],
            &root,
            None,
        );
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn exit_code_is_reported() {
        let (_temp, root) = temp_root();
        let outcome = ShellProcessRunner
            .invoke(
                "sh",
                &["-c".to_string(), "exit 3".to_string()],
                &root,
                Some(Duration::from_secs(30)),
            )
            .expect("run sh");
        assert_eq!(outcome, ProcessOutcome::Exited { code: Some(3) });
    }

    #[cfg(unix)]
    #[test]
    fn slow_process_times_out() {
        let (_temp, root) = temp_root();
        let outcome = ShellProcessRunner
            .invoke(
                "sh",
                &["-c".to_string(), "sleep 10".to_string()],
                &root,
                Some(Duration::from_millis(100)),
            )
            .expect("run sh");
        assert_eq!(outcome, ProcessOutcome::TimedOut);
    }
}
