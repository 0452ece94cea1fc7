//! Native compiler invocation.

use crate::error::PipelineError;
use crate::ports::{ProcessOutcome, ProcessRunner, WritePort};
use crate::settings::{CompilerSettings, Layout};
use anyhow::Context;
use camino::Utf8PathBuf;
use natpack_types::platform::PlatformTarget;
use tracing::info;

/// Arguments passed to the compiler: `build --target=<triple> [--release]`.
pub fn compiler_args(target: &PlatformTarget, release: bool) -> Vec<String> {
    let mut args = vec![
        "build".to_string(),
        format!("--target={}", target.compiler_triple),
    ];
    if release {
        args.push("--release".to_string());
    }
    args
}

/// Build the natives crate for `target`. Returns the toolchain output directory.
///
/// The collected-natives directory is created up front so later stages and
/// other agents can rely on it existing.
pub fn compile_natives(
    layout: &Layout,
    compiler: &CompilerSettings,
    target: &PlatformTarget,
    runner: &dyn ProcessRunner,
    writer: &dyn WritePort,
) -> Result<Utf8PathBuf, PipelineError> {
    writer
        .create_dir_all(&layout.natives_out_dir)
        .with_context(|| format!("create {}", layout.natives_out_dir))?;

    let args = compiler_args(target, compiler.release);
    info!(
        program = %compiler.program,
        args = ?args,
        dir = %layout.natives_dir,
        "invoking native compiler"
    );

    let outcome = runner
        .invoke(
            &compiler.program,
            &args,
            &layout.natives_dir,
            compiler.timeout,
        )
        .map_err(|err| PipelineError::CompilerSpawn {
            program: compiler.program.clone(),
            message: format!("{err:#}"),
        })?;

    match outcome {
        ProcessOutcome::Exited { code: Some(0) } => {
            Ok(layout.compiler_output_dir(&target.compiler_triple, compiler.release))
        }
        ProcessOutcome::Exited { code } => {
            Err(PipelineError::CompilerInvocation { exit_code: code })
        }
        ProcessOutcome::TimedOut => Err(PipelineError::CompilerTimeout {
            timeout_secs: compiler.timeout.map(|t| t.as_secs()).unwrap_or_default(),
        }),
    }
}
