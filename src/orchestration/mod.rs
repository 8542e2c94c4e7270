pub mod installer;
pub mod orchestrator;
pub mod stage;

pub use installer::ToolInstaller;
pub use orchestrator::{Orchestrator, RunSummary};
pub use stage::{RunStage, StageTracker};
