use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Shared-library extensions the collector picks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeExtension {
    So,
    Dll,
    Dylib,
}

impl NativeExtension {
    pub const ALL: [NativeExtension; 3] = [
        NativeExtension::So,
        NativeExtension::Dll,
        NativeExtension::Dylib,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NativeExtension::So => "so",
            NativeExtension::Dll => "dll",
            NativeExtension::Dylib => "dylib",
        }
    }

    /// Match a file extension exactly (case-sensitive, like the toolchain emits it).
    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == ext)
    }
}

/// A shared library found in the compiler output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArtifact {
    pub source_path: Utf8PathBuf,
    pub extension: NativeExtension,
    /// File stem without the extension, e.g. `libcore` for `libcore.so`.
    pub base_name: String,
}

/// A collected artifact after the per-platform renaming rule was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenamedArtifact {
    pub final_name: String,
    pub platform_module: String,
    /// Where the renamed copy lives in the natives directory.
    pub path: Utf8PathBuf,
}
