use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage for one invocation.
///
/// Happy path: `Idle -> ResolvingTarget -> Compiling -> Collecting -> Packaging
/// -> ResolvingDestination -> Uploading -> Done`. Any stage may move to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    ResolvingTarget,
    Compiling,
    Collecting,
    Packaging,
    ResolvingDestination,
    Uploading,
    Done,
    Failed,
}

impl Stage {
    /// The stage that follows on success, or `None` for terminal stages.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Idle => Some(Stage::ResolvingTarget),
            Stage::ResolvingTarget => Some(Stage::Compiling),
            Stage::Compiling => Some(Stage::Collecting),
            Stage::Collecting => Some(Stage::Packaging),
            Stage::Packaging => Some(Stage::ResolvingDestination),
            Stage::ResolvingDestination => Some(Stage::Uploading),
            Stage::Uploading => Some(Stage::Done),
            Stage::Done | Stage::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::ResolvingTarget => "resolving target",
            Stage::Compiling => "compiling",
            Stage::Collecting => "collecting",
            Stage::Packaging => "packaging",
            Stage::ResolvingDestination => "resolving destination",
            Stage::Uploading => "uploading",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
