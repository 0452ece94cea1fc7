//! The natives pipeline: build, package and publish.
//!
//! [`run_command`] wires the `buildNatives`, `zipNatives` and `publish` tasks
//! into a [`TaskGraph`] and runs the requested one. Each task walks its
//! stages through a [`StateMachine`], so a run either reaches `Done` or stops
//! in `Failed` at the first error. All process, network and report I/O goes
//! through the port traits.

use crate::adapters::upload_port_for;
use crate::collect::collect_artifacts;
use crate::compile::compile_natives;
use crate::error::{PipelineError, StageError};
use crate::package::package_natives;
use crate::platform::resolve_target;
use crate::ports::{ProcessRunner, UploadPort, WritePort};
use crate::publish::{resolve_repository, upload_archive};
use crate::settings::RunSettings;
use crate::tasks::{TaskError, TaskGraph};
use anyhow::Context;
use camino::Utf8Path;
use natpack_types::platform::HostOs;
use natpack_types::report::{RunReport, ToolInfo};
use natpack_types::stage::Stage;
use tracing::{error, info, warn};

pub const BUILD_NATIVES_TASK: &str = "buildNatives";
pub const ZIP_NATIVES_TASK: &str = "zipNatives";
pub const PUBLISH_TASK: &str = "publish";

/// Per-invocation stage tracker.
///
/// Stages advance one at a time along [`Stage::next`]. The single exception
/// is `Idle -> Packaging`, used when packaging natives collected earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMachine {
    stage: Stage,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self { stage: Stage::Idle }
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn can_advance(&self, to: Stage) -> bool {
        self.stage.next() == Some(to) || (self.stage == Stage::Idle && to == Stage::Packaging)
    }

    pub fn advance(&mut self, to: Stage) -> Result<(), PipelineError> {
        if !self.can_advance(to) {
            return Err(PipelineError::InvalidTransition {
                from: self.stage,
                to,
            });
        }
        self.stage = to;
        Ok(())
    }

    /// End a successful run. Shorter commands finish after `Collecting` or
    /// `Packaging`.
    pub fn finish(&mut self) -> Result<(), PipelineError> {
        if self.stage.is_terminal() {
            return Err(PipelineError::InvalidTransition {
                from: self.stage,
                to: Stage::Done,
            });
        }
        self.stage = Stage::Done;
        Ok(())
    }

    /// Move to `Failed`. Returns the stage that was active.
    pub fn fail(&mut self) -> Stage {
        let from = self.stage;
        self.stage = Stage::Failed;
        from
    }
}

/// A top-level task the CLI can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    BuildNatives,
    ZipNatives,
    Publish,
}

impl Command {
    pub fn task_name(self) -> &'static str {
        match self {
            Command::BuildNatives => BUILD_NATIVES_TASK,
            Command::ZipNatives => ZIP_NATIVES_TASK,
            Command::Publish => PUBLISH_TASK,
        }
    }
}

/// I/O used by a run.
#[derive(Clone, Copy)]
pub struct Ports<'a> {
    pub process: &'a dyn ProcessRunner,
    /// `None` picks an uploader from the repository URL scheme.
    pub upload: Option<&'a dyn UploadPort>,
    pub writer: &'a dyn WritePort,
}

/// Error type for pipeline runs.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Stage(#[from] StageError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl RunError {
    /// Compiler failures pass their exit status through; everything else is 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunError::Stage(err) => err.exit_code(),
            RunError::Task(_) | RunError::Internal(_) => 1,
        }
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            RunError::Stage(err) => Some(err.stage),
            RunError::Task(_) | RunError::Internal(_) => None,
        }
    }
}

struct Run<'s> {
    settings: &'s RunSettings,
    host: &'s HostOs,
    ports: Ports<'s>,
    machine: StateMachine,
    report: RunReport,
}

impl<'s> Run<'s> {
    fn step<T>(
        &mut self,
        stage: Stage,
        action: impl FnOnce(&mut Self) -> Result<T, PipelineError>,
    ) -> Result<T, RunError> {
        self.machine
            .advance(stage)
            .map_err(|source| StageError::new(stage, source))?;
        self.report.stage = stage;
        info!(stage = %stage, "entering stage");
        action(self).map_err(|source| StageError::new(stage, source).into())
    }

    fn build_natives(&mut self) -> Result<(), RunError> {
        let settings = self.settings;

        let target = self.step(Stage::ResolvingTarget, |run| resolve_target(run.host))?;
        self.report.target = Some(target.clone());

        let output_dir = self.step(Stage::Compiling, |run| {
            compile_natives(
                &settings.layout,
                &settings.compiler,
                &target,
                run.ports.process,
                run.ports.writer,
            )
        })?;

        let collected = self.step(Stage::Collecting, |_| {
            collect_artifacts(&output_dir, &settings.layout.natives_out_dir, &target)
        })?;
        self.report.collected = collected;
        Ok(())
    }

    fn zip_natives(&mut self) -> Result<(), RunError> {
        let settings = self.settings;
        let archive_path = settings.layout.archive_path(&settings.publication);

        let archive = self.step(Stage::Packaging, |_| {
            package_natives(&settings.layout.natives_out_dir, &archive_path)
        })?;
        self.report.archive = Some(archive);
        Ok(())
    }

    fn publish(&mut self) -> Result<(), RunError> {
        let settings = self.settings;
        let publish = &settings.publish;

        let repository = self.step(Stage::ResolvingDestination, |_| {
            resolve_repository(
                &publish.properties,
                publish.publish_org.as_deref(),
                &settings.publication,
                &publish.host,
            )
        })?;
        self.report.destination = Some(repository.clone());

        let archive_path = match &self.report.archive {
            Some(archive) => archive.path.clone(),
            None => settings.layout.archive_path(&settings.publication),
        };

        let uploaded = self.step(Stage::Uploading, |run| {
            if publish.dry_run {
                info!(url = %repository.url, "dry run; skipping upload");
                return Ok(Vec::new());
            }
            let owned: Box<dyn UploadPort>;
            let uploader: &dyn UploadPort = match run.ports.upload {
                Some(uploader) => uploader,
                None => {
                    owned = upload_port_for(&repository.url, publish.upload_timeout)?;
                    owned.as_ref()
                }
            };
            upload_archive(&repository, &settings.publication, &archive_path, uploader)
        })?;
        self.report.uploaded = uploaded;
        Ok(())
    }
}

fn task_graph<'s>(skip_build: bool) -> Result<TaskGraph<'s, Run<'s>, RunError>, TaskError> {
    let mut graph = TaskGraph::new();
    graph.register(BUILD_NATIVES_TASK, &[], Run::build_natives)?;
    let zip_deps: &[&str] = if skip_build {
        &[]
    } else {
        &[BUILD_NATIVES_TASK]
    };
    graph.register(ZIP_NATIVES_TASK, zip_deps, Run::zip_natives)?;
    graph.register(PUBLISH_TASK, &[ZIP_NATIVES_TASK], Run::publish)?;
    Ok(graph)
}

/// Serialize the run report as pretty JSON.
pub fn write_report(
    report: &RunReport,
    path: &Utf8Path,
    writer: &dyn WritePort,
) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report).context("serialize report")?;
    writer.write_file(path, json.as_bytes())
}

/// Run `command` and its dependencies for `host`.
///
/// The report is written to the layout's report path whether the run
/// succeeds or fails.
pub fn run_command(
    command: Command,
    settings: &RunSettings,
    host: &HostOs,
    ports: Ports<'_>,
    tool: ToolInfo,
) -> Result<RunReport, RunError> {
    let report_path = settings.layout.report_path();
    let mut run = Run {
        settings,
        host,
        ports,
        machine: StateMachine::new(),
        report: RunReport::new(tool, settings.publication.clone()),
    };

    let result = task_graph(settings.skip_build)
        .map_err(RunError::from)
        .and_then(|mut graph| graph.run(command.task_name(), &mut run));

    match result {
        Ok(tasks) => {
            run.machine
                .finish()
                .map_err(|source| StageError::new(Stage::Done, source))?;
            run.report.stage = Stage::Done;
            info!(tasks = ?tasks, "run finished");
            write_report(&run.report, &report_path, ports.writer)?;
            Ok(run.report)
        }
        Err(err) => {
            let active = run.machine.fail();
            run.report.stage = Stage::Failed;
            run.report.failed_stage = Some(err.failed_stage().unwrap_or(active));
            run.report.error = Some(err.to_string());
            error!(stage = ?run.report.failed_stage, "run failed");
            if let Err(write_err) = write_report(&run.report, &report_path, ports.writer) {
                warn!(path = %report_path, "could not write report: {write_err:#}");
            }
            Err(err)
        }
    }
}
