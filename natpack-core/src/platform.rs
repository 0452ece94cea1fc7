//! Host platform detection and target resolution.

use crate::error::PipelineError;
use natpack_types::platform::{HostOs, OsFamily, PlatformTarget};
use tracing::debug;

pub const LINUX_TRIPLE: &str = "x86_64-unknown-linux-gnu";
pub const LINUX_MODULE: &str = "linux-amd64";
pub const WINDOWS_TRIPLE: &str = "x86_64-pc-windows-msvc";
pub const WINDOWS_MODULE: &str = "windows-amd64";
pub const MAC_TRIPLE: &str = "x86_64-apple-darwin";
/// Must contain `osx` so the packager routes it into `macosx/`.
pub const MAC_MODULE: &str = "osx-amd64";

/// The OS this binary was built for.
pub fn detect_host() -> HostOs {
    HostOs::from_os_name(std::env::consts::OS)
}

/// Map a host OS to its compiler triple and module suffix.
pub fn resolve_target(host: &HostOs) -> Result<PlatformTarget, PipelineError> {
    let target = match host {
        HostOs::Mac => PlatformTarget::new(OsFamily::Mac, MAC_TRIPLE, MAC_MODULE),
        HostOs::Unix => PlatformTarget::new(OsFamily::Unix, LINUX_TRIPLE, LINUX_MODULE),
        HostOs::Windows => PlatformTarget::new(OsFamily::Windows, WINDOWS_TRIPLE, WINDOWS_MODULE),
        HostOs::Other(name) => {
            return Err(PipelineError::UnsupportedPlatform { os: name.clone() });
        }
    };
    debug!(host = %host, triple = %target.compiler_triple, "resolved platform target");
    Ok(target)
}
