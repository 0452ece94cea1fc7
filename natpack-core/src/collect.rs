//! Artifact collection and per-platform renaming.

use crate::error::PipelineError;
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use glob::{Pattern, glob};
use natpack_types::artifact::{BuildArtifact, NativeExtension, RenamedArtifact};
use natpack_types::platform::PlatformTarget;
use tracing::{debug, info};

/// Apply the naming convention:
/// - `name.so` -> `name-<suffix>.so`
/// - `name.dylib` -> `name-<suffix>.dylib`
/// - `name.dll` -> `libname-<suffix>.dll`
pub fn renamed_file_name(base_name: &str, extension: NativeExtension, module_suffix: &str) -> String {
    match extension {
        NativeExtension::So | NativeExtension::Dylib => {
            format!("{base_name}-{module_suffix}.{}", extension.as_str())
        }
        NativeExtension::Dll => format!("lib{base_name}-{module_suffix}.dll"),
    }
}

/// Top-level shared libraries in `dir`, sorted by path.
pub fn scan_artifacts(dir: &Utf8Path) -> anyhow::Result<Vec<BuildArtifact>> {
    let escaped = Pattern::escape(dir.as_str());
    let mut out = Vec::new();

    for extension in NativeExtension::ALL {
        let pattern = format!("{escaped}/*.{}", extension.as_str());
        debug!(pattern = %pattern, "scanning for native artifacts");

        for entry in glob(&pattern).with_context(|| format!("glob {pattern}"))? {
            let path = entry.map_err(|e| anyhow::anyhow!("glob error: {e}"))?;
            let path = Utf8PathBuf::from_path_buf(path)
                .map_err(|p| anyhow::anyhow!("non-UTF-8 artifact path: {}", p.display()))?;
            if !path.is_file() {
                continue;
            }
            let Some(base_name) = path.file_stem() else {
                continue;
            };
            out.push(BuildArtifact {
                base_name: base_name.to_string(),
                extension,
                source_path: path.clone(),
            });
        }
    }

    out.sort_by(|a, b| a.source_path.cmp(&b.source_path));
    Ok(out)
}

/// Copy every artifact in `output_dir` into `natives_out_dir` under its
/// platform-specific name. Existing files are overwritten.
pub fn collect_artifacts(
    output_dir: &Utf8Path,
    natives_out_dir: &Utf8Path,
    target: &PlatformTarget,
) -> Result<Vec<RenamedArtifact>, PipelineError> {
    if !output_dir.is_dir() {
        return Err(PipelineError::ArtifactNotFound {
            dir: output_dir.to_path_buf(),
        });
    }

    let artifacts = scan_artifacts(output_dir)?;
    if artifacts.is_empty() {
        return Err(PipelineError::ArtifactNotFound {
            dir: output_dir.to_path_buf(),
        });
    }

    fs::create_dir_all(natives_out_dir).with_context(|| format!("create {natives_out_dir}"))?;

    let mut renamed = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let final_name =
            renamed_file_name(&artifact.base_name, artifact.extension, &target.module_suffix);
        let dest = natives_out_dir.join(&final_name);
        fs::copy(&artifact.source_path, &dest)
            .with_context(|| format!("copy {} to {}", artifact.source_path, dest))?;
        debug!(from = %artifact.source_path, to = %dest, "collected native");

        renamed.push(RenamedArtifact {
            final_name,
            platform_module: target.module_suffix.clone(),
            path: dest,
        });
    }

    info!(count = renamed.len(), dir = %natives_out_dir, "collected natives");
    Ok(renamed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use natpack_types::platform::OsFamily;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn linux() -> PlatformTarget {
        PlatformTarget::new(OsFamily::Unix, "x86_64-unknown-linux-gnu", "linux-amd64")
    }

    fn windows() -> PlatformTarget {
        PlatformTarget::new(OsFamily::Windows, "x86_64-pc-windows-msvc", "windows-amd64")
    }

    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
        (temp, root)
    }

    #[test]
    fn so_gets_suffix_before_extension() {
        assert_eq!(
            renamed_file_name("foo", NativeExtension::So, "linux-amd64"),
            "foo-linux-amd64.so"
        );
    }

    #[test]
    fn dll_gets_lib_prefix_and_suffix() {
        assert_eq!(
            renamed_file_name("foo", NativeExtension::Dll, "windows-amd64"),
            "libfoo-windows-amd64.dll"
        );
    }

    #[test]
    fn dylib_follows_so_rule() {
        assert_eq!(
            renamed_file_name("libfoo", NativeExtension::Dylib, "osx-amd64"),
            "libfoo-osx-amd64.dylib"
        );
    }

    #[test]
    fn scan_ignores_other_files_and_subdirectories() {
        let (_temp, root) = temp_root();
        std::fs::write(root.join("libcore.so"), b"elf").expect("write");
        std::fs::write(root.join("core.dll"), b"pe").expect("write");
        std::fs::write(root.join("libcore.rlib"), b"rlib").expect("write");
        std::fs::write(root.join("libcore.d"), b"deps").expect("write");
        std::fs::create_dir_all(root.join("deps")).expect("mkdir");
        std::fs::write(root.join("deps").join("libdep.so"), b"elf").expect("write");

        let found = scan_artifacts(&root).expect("scan");
        let names: Vec<_> = found.iter().map(|a| a.base_name.as_str()).collect();
        assert_eq!(names, vec!["core", "libcore"]);
        assert_eq!(found[0].extension, NativeExtension::Dll);
        assert_eq!(found[1].extension, NativeExtension::So);
    }

    #[test]
    fn scan_handles_glob_metacharacters_in_dir() {
        let (_temp, root) = temp_root();
        let dir = root.join("weird[dir]");
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(dir.join("libcore.so"), b"elf").expect("write");

        let found = scan_artifacts(&dir).expect("scan");
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn collect_copies_and_renames() {
        let (_temp, root) = temp_root();
        let out_dir = root.join("target/x86_64-unknown-linux-gnu/debug");
        let natives = root.join("build/natives");
        std::fs::create_dir_all(&out_dir).expect("mkdir");
        std::fs::write(out_dir.join("libcore.so"), b"elf").expect("write");

        let renamed = collect_artifacts(&out_dir, &natives, &linux()).expect("collect");

        assert_eq!(renamed.len(), 1);
        assert_eq!(renamed[0].final_name, "libcore-linux-amd64.so");
        assert_eq!(renamed[0].platform_module, "linux-amd64");
        assert_eq!(
            std::fs::read(natives.join("libcore-linux-amd64.so")).expect("read"),
            b"elf"
        );
        // Copy, not move.
        assert!(out_dir.join("libcore.so").exists());
    }

    #[test]
    fn collect_windows_dll() {
        let (_temp, root) = temp_root();
        let out_dir = root.join("out");
        let natives = root.join("natives");
        std::fs::create_dir_all(&out_dir).expect("mkdir");
        std::fs::write(out_dir.join("core.dll"), b"pe").expect("write");

        let renamed = collect_artifacts(&out_dir, &natives, &windows()).expect("collect");
        assert_eq!(renamed[0].final_name, "libcore-windows-amd64.dll");
        assert!(natives.join("libcore-windows-amd64.dll").is_file());
    }

    #[test]
    fn collect_is_idempotent() {
        let (_temp, root) = temp_root();
        let out_dir = root.join("out");
        let natives = root.join("natives");
        std::fs::create_dir_all(&out_dir).expect("mkdir");
        std::fs::write(out_dir.join("libcore.so"), b"v1").expect("write");

        let first = collect_artifacts(&out_dir, &natives, &linux()).expect("first");
        let second = collect_artifacts(&out_dir, &natives, &linux()).expect("second");
        assert_eq!(first, second);

        let entries: Vec<_> = std::fs::read_dir(&natives)
            .expect("read dir")
            .map(|e| e.expect("entry").file_name())
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn rerun_overwrites_previous_output() {
        let (_temp, root) = temp_root();
        let out_dir = root.join("out");
        let natives = root.join("natives");
        std::fs::create_dir_all(&out_dir).expect("mkdir");
        std::fs::write(out_dir.join("libcore.so"), b"v1").expect("write");
        collect_artifacts(&out_dir, &natives, &linux()).expect("first");

        std::fs::write(out_dir.join("libcore.so"), b"v2").expect("write");
        collect_artifacts(&out_dir, &natives, &linux()).expect("second");

        assert_eq!(
            std::fs::read(natives.join("libcore-linux-amd64.so")).expect("read"),
            b"v2"
        );
    }

    #[test]
    fn empty_output_dir_is_an_error() {
        let (_temp, root) = temp_root();
        let out_dir = root.join("out");
        std::fs::create_dir_all(&out_dir).expect("mkdir");
        std::fs::write(out_dir.join("libcore.rlib"), b"rlib").expect("write");

        let err = collect_artifacts(&out_dir, &root.join("natives"), &linux())
            .expect_err("no artifacts");
        assert!(matches!(err, PipelineError::ArtifactNotFound { .. }));
    }

    #[test]
    fn missing_output_dir_is_an_error() {
        let (_temp, root) = temp_root();
        let err = collect_artifacts(&root.join("nope"), &root.join("natives"), &linux())
            .expect_err("missing dir");
        assert!(matches!(err, PipelineError::ArtifactNotFound { ref dir } if dir.ends_with("nope")));
    }
}
