//! Multi-platform natives archive.

use crate::error::PipelineError;
use anyhow::Context;
use camino::Utf8Path;
use fs_err as fs;
use natpack_types::platform::ArchivePlatform;
use natpack_types::report::{ArchiveDir, ArchiveSummary};
use std::io::Write;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Group the top-level files of `natives_dir` by archive platform.
///
/// A file lands in every platform whose marker its name contains; a file
/// matching none is left out. A missing directory yields empty groups.
pub fn plan_archive(natives_dir: &Utf8Path) -> anyhow::Result<Vec<ArchiveDir>> {
    let mut names = Vec::new();
    if natives_dir.is_dir() {
        for entry in natives_dir
            .read_dir_utf8()
            .with_context(|| format!("read {natives_dir}"))?
        {
            let entry = entry.with_context(|| format!("read {natives_dir}"))?;
            if entry.path().is_file() {
                names.push(entry.file_name().to_string());
            }
        }
    } else {
        warn!(dir = %natives_dir, "natives directory missing; archive will be empty");
    }
    names.sort();

    for name in &names {
        if !ArchivePlatform::ALL.iter().any(|p| p.matches(name)) {
            debug!(file = %name, "no platform marker; skipping");
        }
    }

    Ok(ArchivePlatform::ALL
        .iter()
        .map(|&platform| ArchiveDir {
            platform,
            files: names
                .iter()
                .filter(|name| platform.matches(name))
                .cloned()
                .collect(),
        })
        .collect())
}

/// Write the archive at `archive_path` from the contents of `natives_dir`.
///
/// The archive always has `linux/`, `macosx/` and `windows/` directories.
/// Entries are sorted and carry a fixed timestamp, so identical inputs give
/// byte-identical archives.
pub fn package_natives(
    natives_dir: &Utf8Path,
    archive_path: &Utf8Path,
) -> Result<ArchiveSummary, PipelineError> {
    let dirs = plan_archive(natives_dir)?;

    if let Some(parent) = archive_path.parent() {
        if !parent.as_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("create {parent}"))?;
        }
    }

    let file = fs::File::create(archive_path).with_context(|| format!("create {archive_path}"))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    for dir in &dirs {
        let dir_name = dir.platform.dir_name();
        zip.add_directory(format!("{dir_name}/"), options.unix_permissions(0o755))
            .with_context(|| format!("add {dir_name}/ to {archive_path}"))?;

        for name in &dir.files {
            let source = natives_dir.join(name);
            let bytes = fs::read(&source).with_context(|| format!("read {source}"))?;
            zip.start_file(format!("{dir_name}/{name}"), options)
                .with_context(|| format!("add {dir_name}/{name} to {archive_path}"))?;
            zip.write_all(&bytes)
                .with_context(|| format!("write {dir_name}/{name}"))?;
        }
    }

    zip.finish()
        .with_context(|| format!("finish {archive_path}"))?;

    let sha256 = {
        let file = fs::File::open(archive_path).with_context(|| format!("open {archive_path}"))?;
        natpack_hash::sha256_hex_reader(file).with_context(|| format!("hash {archive_path}"))?
    };

    let summary = ArchiveSummary {
        path: archive_path.to_path_buf(),
        dirs,
        sha256: Some(sha256),
    };
    info!(
        archive = %archive_path,
        files = summary.total_files(),
        "packaged natives"
    );
    Ok(summary)
}
