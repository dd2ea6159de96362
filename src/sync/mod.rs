//! Daily snapshot synchronization pipeline

pub mod orchestrator;
pub mod registry;
pub mod step;

pub use orchestrator::{Clock, Orchestrator, RunOutcome, RunReport, RunRequest};
pub use registry::StepRegistry;
pub use step::{DatasetSyncStep, RetryPolicy, StepContext, StepOutcome, StepStatus, SyncStep};
