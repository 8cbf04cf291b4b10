//! Decision engine module
//!
//! The orchestrator that turns signals into entry/exit decisions and
//! the pipeline that drives raw payloads through every stage.

mod orchestrator;
mod pipeline;
mod types;

pub use orchestrator::DecisionOrchestrator;
pub use pipeline::{PipelineOutcome, PipelineStage, SignalPipeline};
pub use types::{
    Entry, EntryCalculations, EntryDecision, Exit, ExitCalculations, ExitDecision, ExitReason,
};
