use serde::{Deserialize, Serialize};
use std::fmt;

/// Host operating system as seen at configuration time.
///
/// Consumers match on this exhaustively; `Other` carries the raw OS name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "family", content = "name", rename_all = "snake_case")]
pub enum HostOs {
    Mac,
    Unix,
    Windows,
    Other(String),
}

impl HostOs {
    /// Classify an OS identifier in the `std::env::consts::OS` vocabulary.
    pub fn from_os_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "macos" | "ios" => HostOs::Mac,
            "linux" | "android" | "freebsd" | "netbsd" | "openbsd" | "dragonfly" | "solaris"
            | "illumos" => HostOs::Unix,
            "windows" => HostOs::Windows,
            _ => HostOs::Other(name.to_string()),
        }
    }
}

impl fmt::Display for HostOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostOs::Mac => f.write_str("macos"),
            HostOs::Unix => f.write_str("unix"),
            HostOs::Windows => f.write_str("windows"),
            HostOs::Other(name) => write!(f, "{name}"),
        }
    }
}

/// Operating system family of a resolved target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsFamily {
    Mac,
    Unix,
    Windows,
}

/// The single compile target active for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformTarget {
    pub os_family: OsFamily,
    /// Compiler target triple, e.g. `x86_64-unknown-linux-gnu`.
    pub compiler_triple: String,
    /// Suffix embedded in every renamed artifact, e.g. `linux-amd64`.
    pub module_suffix: String,
}

impl PlatformTarget {
    pub fn new(
        os_family: OsFamily,
        compiler_triple: impl Into<String>,
        module_suffix: impl Into<String>,
    ) -> Self {
        Self {
            os_family,
            compiler_triple: compiler_triple.into(),
            module_suffix: module_suffix.into(),
        }
    }
}

impl fmt::Display for PlatformTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.compiler_triple, self.module_suffix)
    }
}

/// Archive subdirectory for each platform, and the filename substring that routes
/// a collected native into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchivePlatform {
    Linux,
    Macosx,
    Windows,
}

impl ArchivePlatform {
    pub const ALL: [ArchivePlatform; 3] = [
        ArchivePlatform::Linux,
        ArchivePlatform::Macosx,
        ArchivePlatform::Windows,
    ];

    pub fn dir_name(self) -> &'static str {
        match self {
            ArchivePlatform::Linux => "linux",
            ArchivePlatform::Macosx => "macosx",
            ArchivePlatform::Windows => "windows",
        }
    }

    pub fn name_marker(self) -> &'static str {
        match self {
            ArchivePlatform::Linux => "linux",
            ArchivePlatform::Macosx => "osx",
            ArchivePlatform::Windows => "windows",
        }
    }

    pub fn matches(self, file_name: &str) -> bool {
        file_name.contains(self.name_marker())
    }
}
