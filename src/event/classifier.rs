//! Success/failure predicates per image operation

use crate::event::progress::ProgressEvent;
use std::fmt;

/// Decides whether a progress event completes an operation.
///
/// `is_failure` is always consulted first.
pub trait EventClassifier: Send + Sync {
    fn is_success(&self, event: &ProgressEvent) -> bool;

    fn is_failure(&self, event: &ProgressEvent) -> bool {
        event.error().is_some_and(|error| !error.is_empty())
    }

    /// Used in diagnostics and incomplete-stream errors
    fn name(&self) -> &str;
}

const IMPORT_STATUS: &str = "Status:";
const PULL_DOWNLOADED: &str = "Status: Downloaded newer image";
const PULL_UP_TO_DATE: &str = "Status: Image is up to date";
const PUSH_DIGEST: &str = "digest: sha256:";
const BUILD_BUILT: &str = "Successfully built";
const BUILD_TAGGED: &str = "Successfully tagged";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Import,
    Pull,
    Push,
    Build,
}

impl EventClassifier for Operation {
    fn is_success(&self, event: &ProgressEvent) -> bool {
        match self {
            Operation::Import => event.stream().is_some_and(|s| s.starts_with(IMPORT_STATUS)),
            Operation::Pull => event
                .status()
                .is_some_and(|s| s.starts_with(PULL_DOWNLOADED) || s.starts_with(PULL_UP_TO_DATE)),
            Operation::Push => event.status().is_some_and(|s| s.contains(PUSH_DIGEST)),
            Operation::Build => event
                .stream()
                .is_some_and(|s| s.starts_with(BUILD_BUILT) || s.starts_with(BUILD_TAGGED)),
        }
    }

    fn name(&self) -> &str {
        match self {
            Operation::Import => "import",
            Operation::Pull => "pull",
            Operation::Push => "push",
            Operation::Build => "build",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
