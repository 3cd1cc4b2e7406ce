pub mod coordinator;
pub mod orchestrator;

pub use coordinator::{ClassOutcome, CoordinatorReport, SyncCoordinator};
pub use orchestrator::{SyncOrchestrator, SyncReport};
