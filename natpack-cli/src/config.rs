//! Configuration file loading for natpack.
//!
//! Discovers and loads `natpack.toml` from the project directory.
//! Merges config file settings with CLI arguments (CLI takes precedence).

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use natpack_core::publish::Properties;
use natpack_core::settings::{CompilerSettings, Layout, PublishSettings, RunSettings};
use natpack_types::publish::Publication;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "natpack.toml";

/// Top-level configuration from natpack.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NatpackConfig {
    /// Directory layout, relative to the project directory.
    pub layout: LayoutConfig,

    /// Native toolchain invocation.
    pub compiler: CompilerConfig,

    /// Coordinates of the published archive.
    pub publication: PublicationConfig,

    /// Repository host and upload limits.
    pub publish: PublishConfig,

    /// Build properties (`publishRepo`, `mavenUser`, `mavenPass`, ...).
    pub properties: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub natives_dir: Option<Utf8PathBuf>,
    pub natives_out_dir: Option<Utf8PathBuf>,
    pub build_dir: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Compiler executable. Defaults to `cargo`.
    pub program: Option<String>,

    /// Kill the compiler after this many seconds. `0` disables the limit.
    pub timeout_secs: Option<u64>,

    /// Build with `--release`.
    pub release: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublicationConfig {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

impl Default for PublicationConfig {
    fn default() -> Self {
        let publication = Publication::default();
        Self {
            group: publication.group,
            artifact: publication.artifact,
            version: publication.version,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub host: Option<String>,
    pub upload_timeout_secs: Option<u64>,
}

/// Discover the natpack.toml config file.
///
/// Returns `None` if the project directory has no config file.
pub fn discover_config(project_dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let config_path = project_dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        debug!("found config file at {}", config_path);
        Some(config_path)
    } else {
        debug!("no config file found at {}", config_path);
        None
    }
}

/// Load and parse a natpack.toml config file.
pub fn load_config(path: &Utf8Path) -> anyhow::Result<NatpackConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    parse_config(&contents).with_context(|| format!("parse config file {}", path))
}

/// Parse a config file from a string.
pub fn parse_config(contents: &str) -> anyhow::Result<NatpackConfig> {
    let config: NatpackConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load config from the project dir, or return default if not found.
pub fn load_or_default(project_dir: &Utf8Path) -> anyhow::Result<NatpackConfig> {
    match discover_config(project_dir) {
        Some(path) => load_config(&path),
        None => Ok(NatpackConfig::default()),
    }
}

/// CLI arguments that feed into [`RunSettings`].
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub release: bool,
    pub no_build: bool,
    pub dry_run: bool,
    pub properties: Properties,
    pub publish_org: Option<String>,
    pub resolution_repo: Option<String>,
}

/// Builder for merging config file with CLI arguments.
pub struct ConfigMerger {
    config: NatpackConfig,
}

impl ConfigMerger {
    pub fn new(config: NatpackConfig) -> Self {
        Self { config }
    }

    /// Produce run settings for `project_dir`.
    ///
    /// CLI booleans are OR-ed with the config file; CLI properties override
    /// file properties key by key.
    pub fn merge(self, project_dir: &Utf8Path, cli: CliOverrides) -> RunSettings {
        let NatpackConfig {
            layout: layout_cfg,
            compiler: compiler_cfg,
            publication,
            publish: publish_cfg,
            properties,
        } = self.config;

        let mut layout = Layout::under(project_dir);
        if let Some(dir) = layout_cfg.natives_dir {
            layout.natives_dir = layout.project_path(&dir);
        }
        if let Some(dir) = layout_cfg.build_dir {
            layout.build_dir = layout.project_path(&dir);
            layout.natives_out_dir = layout.build_dir.join("natives");
        }
        if let Some(dir) = layout_cfg.natives_out_dir {
            layout.natives_out_dir = layout.project_path(&dir);
        }

        let mut compiler = CompilerSettings {
            release: cli.release || compiler_cfg.release,
            ..Default::default()
        };
        if let Some(program) = compiler_cfg.program {
            compiler.program = program;
        }
        match compiler_cfg.timeout_secs {
            Some(0) => compiler.timeout = None,
            Some(secs) => compiler.timeout = Some(Duration::from_secs(secs)),
            None => {}
        }

        let mut merged_properties: Properties = properties.into_iter().collect();
        merged_properties.extend(cli.properties);

        let mut publish = PublishSettings {
            dry_run: cli.dry_run,
            properties: merged_properties,
            publish_org: cli.publish_org,
            resolution_repo: cli.resolution_repo,
            ..Default::default()
        };
        if let Some(host) = publish_cfg.host {
            publish.host = host;
        }
        if let Some(secs) = publish_cfg.upload_timeout_secs {
            publish.upload_timeout = Duration::from_secs(secs);
        }

        RunSettings {
            layout,
            compiler,
            publication: Publication {
                group: publication.group,
                artifact: publication.artifact,
                version: publication.version,
            },
            publish,
            skip_build: cli.no_build,
        }
    }
}

/// Parse CLI properties from key=value strings.
///
/// Values are kept as strings, like build properties passed on a command line.
pub fn parse_cli_properties(params: &[String]) -> anyhow::Result<Properties> {
    let mut out = Properties::new();
    for entry in params {
        let mut parts = entry.splitn(2, '=');
        let key = parts
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::anyhow!("invalid property '{}': missing key", entry))?;
        let value = parts
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::anyhow!("invalid property '{}': missing value", entry))?;
        out.insert(key, value);
    }
    Ok(out)
}
