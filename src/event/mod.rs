//! Progress event streams for image import, pull, push and build

pub mod classifier;
pub mod decoder;
pub mod handle;
pub mod progress;

pub use classifier::{EventClassifier, Operation};
pub use decoder::{ProgressDecoder, drive};
pub use handle::{EventHandle, EventListener, Failure, FailureKind, Outcome};
pub use progress::{ErrorDetail, ProgressEvent};
