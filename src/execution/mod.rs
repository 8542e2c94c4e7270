pub mod extractor;
pub mod runner;
pub mod sequencer;
pub mod step;

pub use extractor::OutputExtractor;
pub use runner::{CommandError, CommandRunner, ProcessRunner};
pub use sequencer::{CommandSequencer, init_args, lifecycle_steps};
pub use step::{CommandStep, FileWrite, OutputMode, Step, StepOutcome};
