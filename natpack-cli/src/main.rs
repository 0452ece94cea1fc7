mod config;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use config::{CliOverrides, ConfigMerger};
use natpack_core::adapters::{FsWritePort, ShellProcessRunner};
use natpack_core::pipeline::{self, Ports, RunError};
use natpack_core::platform::{detect_host, resolve_target};
use natpack_core::publish::{
    RESOLUTION_REPO_PROPERTY, ResolutionInputs, resolve_repository, resolve_resolution_repo,
};
use natpack_core::settings::RunSettings;
use natpack_types::report::{RunReport, ToolInfo};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "natpack",
    version,
    about = "Build, package and publish native libraries for every platform."
)]
struct Cli {
    /// Project directory (default: current directory).
    #[arg(long, global = true, default_value = ".")]
    project_dir: Utf8PathBuf,

    /// Config file (default: <project_dir>/natpack.toml).
    #[arg(long, global = true)]
    config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile natives for the host platform and collect them (buildNatives).
    Build(BuildArgs),
    /// Package collected natives into the multi-platform archive (zipNatives).
    Zip(ZipArgs),
    /// Package and upload the archive (publish).
    Publish(PublishArgs),
    /// Show the resolved publish and resolution repositories.
    Repos(ReposArgs),
    /// Show the compile target for this host.
    Target(TargetArgs),
}

#[derive(Debug, Parser)]
struct BuildArgs {
    /// Build with the release profile.
    #[arg(long, default_value_t = false)]
    release: bool,
}

#[derive(Debug, Parser)]
struct ZipArgs {
    /// Build with the release profile.
    #[arg(long, default_value_t = false)]
    release: bool,

    /// Package natives already collected (e.g. merged from several build agents).
    #[arg(long, default_value_t = false)]
    no_build: bool,
}

#[derive(Debug, Parser)]
struct PublishArgs {
    /// Build with the release profile.
    #[arg(long, default_value_t = false)]
    release: bool,

    /// Package natives already collected instead of building first.
    #[arg(long, default_value_t = false)]
    no_build: bool,

    /// Resolve the destination and build the archive, but skip the upload.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    #[command(flatten)]
    repo: RepoArgs,
}

#[derive(Debug, Parser)]
struct ReposArgs {
    #[command(flatten)]
    repo: RepoArgs,

    /// Output format (text, json).
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Parser)]
struct TargetArgs {
    /// Output format (text, json).
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

/// Inputs to repository resolution.
#[derive(Debug, clap::Args)]
struct RepoArgs {
    /// Build property (e.g. publishRepo=natives-local, mavenUser=ci). Repeatable.
    #[arg(long = "property", short = 'P', value_name = "KEY=VALUE")]
    properties: Vec<String>,

    /// Organisation used to deduce the publish repository name.
    #[arg(long, env = "PUBLISH_ORG")]
    publish_org: Option<String>,

    /// Repository dependencies are resolved from.
    #[arg(long, env = "RESOLUTION_REPO")]
    resolution_repo: Option<String>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    if let Err(e) = real_main() {
        error!("{:?}", e);
        return ExitCode::from(exit_code_for(&e));
    }
    ExitCode::from(0)
}

/// A failed compiler hands its own exit status through; everything else is 1.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<RunError>()
        .map(RunError::exit_code)
        .unwrap_or(1)
}

fn real_main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let global = Global {
        project_dir: cli.project_dir,
        config: cli.config,
    };
    match cli.cmd {
        Command::Build(args) => cmd_build(&global, args),
        Command::Zip(args) => cmd_zip(&global, args),
        Command::Publish(args) => cmd_publish(&global, args),
        Command::Repos(args) => cmd_repos(&global, args),
        Command::Target(args) => cmd_target(args),
    }
}

struct Global {
    project_dir: Utf8PathBuf,
    config: Option<Utf8PathBuf>,
}

impl Global {
    fn settings(&self, overrides: CliOverrides) -> anyhow::Result<RunSettings> {
        let config = match &self.config {
            Some(path) => config::load_config(path)?,
            None => config::load_or_default(&self.project_dir)?,
        };
        Ok(ConfigMerger::new(config).merge(&self.project_dir, overrides))
    }
}

impl RepoArgs {
    fn overrides(self) -> anyhow::Result<CliOverrides> {
        Ok(CliOverrides {
            properties: config::parse_cli_properties(&self.properties)?,
            publish_org: self.publish_org,
            resolution_repo: self.resolution_repo,
            ..Default::default()
        })
    }
}

fn cmd_build(global: &Global, args: BuildArgs) -> anyhow::Result<()> {
    let settings = global.settings(CliOverrides {
        release: args.release,
        ..Default::default()
    })?;
    let report = run(pipeline::Command::BuildNatives, &settings)?;
    for artifact in &report.collected {
        info!("collected {}", artifact.path);
    }
    Ok(())
}

fn cmd_zip(global: &Global, args: ZipArgs) -> anyhow::Result<()> {
    let settings = global.settings(CliOverrides {
        release: args.release,
        no_build: args.no_build,
        ..Default::default()
    })?;
    let report = run(pipeline::Command::ZipNatives, &settings)?;
    if let Some(archive) = &report.archive {
        info!("wrote {} ({} files)", archive.path, archive.total_files());
    }
    Ok(())
}

fn cmd_publish(global: &Global, args: PublishArgs) -> anyhow::Result<()> {
    let overrides = CliOverrides {
        release: args.release,
        no_build: args.no_build,
        dry_run: args.dry_run,
        ..args.repo.overrides()?
    };
    let settings = global.settings(overrides)?;
    let report = run(pipeline::Command::Publish, &settings)?;
    for url in &report.uploaded {
        info!("published {}", url);
    }
    Ok(())
}

fn run(command: pipeline::Command, settings: &RunSettings) -> anyhow::Result<RunReport> {
    let runner = ShellProcessRunner;
    let writer = FsWritePort;
    let ports = Ports {
        process: &runner,
        upload: None,
        writer: &writer,
    };
    let report = pipeline::run_command(command, settings, &detect_host(), ports, tool_info())?;
    Ok(report)
}

fn cmd_repos(global: &Global, args: ReposArgs) -> anyhow::Result<()> {
    let settings = global.settings(args.repo.overrides()?)?;
    let publish = &settings.publish;

    let repository = resolve_repository(
        &publish.properties,
        publish.publish_org.as_deref(),
        &settings.publication,
        &publish.host,
    )?;
    let resolution_property = publish.properties.text(RESOLUTION_REPO_PROPERTY);
    let resolution = resolve_resolution_repo(&ResolutionInputs {
        repo_property: resolution_property.as_deref(),
        resolution_repo: publish.resolution_repo.as_deref(),
    });

    match args.format {
        OutputFormat::Text => {
            println!("publish:     {} ({})", repository.url, repository.source);
            println!("resolution:  {} ({})", resolution.url, resolution.source);
            println!(
                "credentials: {}",
                if repository.is_authenticated() {
                    "basic auth"
                } else {
                    "none"
                }
            );
        }
        OutputFormat::Json => {
            let out = serde_json::json!({
                "publication": settings.publication,
                "publish": repository,
                "authenticated": repository.is_authenticated(),
                "resolution": resolution,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&out).context("serialize repositories")?
            );
        }
    }
    Ok(())
}

fn cmd_target(args: TargetArgs) -> anyhow::Result<()> {
    let host = detect_host();
    let target = resolve_target(&host)?;
    match args.format {
        OutputFormat::Text => {
            println!("host:   {}", host);
            println!("triple: {}", target.compiler_triple);
            println!("module: {}", target.module_suffix);
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&target).context("serialize target")?
            );
        }
    }
    Ok(())
}

fn tool_info() -> ToolInfo {
    ToolInfo {
        name: "natpack".to_string(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    }
}
