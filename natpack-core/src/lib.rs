//! Embeddable core library for natpack.
//!
//! Builds a native library for the host platform, collects and renames the
//! shared libraries, packages natives from every platform into one archive
//! and publishes it to an Artifactory-style repository. Clap-free and
//! I/O-abstracted so hosts other than the CLI can drive it.
//!
//! # Port traits
//!
//! All I/O is abstracted behind port traits in [`ports`]:
//! - [`ProcessRunner`](ports::ProcessRunner): run the native toolchain
//! - [`UploadPort`](ports::UploadPort): put the archive in a repository
//! - [`WritePort`](ports::WritePort): write files and create directories
//!
//! The [`adapters`] module provides the default process, HTTP and filesystem
//! implementations.
//!
//! # Entry points
//!
//! - [`run_command`](pipeline::run_command): run `buildNatives`, `zipNatives`
//!   or `publish` with its dependencies
//! - [`resolve_target`](platform::resolve_target) and
//!   [`resolve_destination`](publish::resolve_destination) for callers that
//!   only need the resolution rules

pub mod adapters;
pub mod collect;
pub mod compile;
pub mod error;
pub mod package;
pub mod pipeline;
pub mod platform;
pub mod ports;
pub mod publish;
pub mod settings;
pub mod tasks;

pub use error::{PipelineError, StageError};
pub use pipeline::{Command, Ports, RunError, run_command};
