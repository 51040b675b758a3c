//! Request pipeline: Idle → Loading → ModelReady → Indexed → Answered, or Error

mod orchestrator;
mod report;

pub use orchestrator::Orchestrator;
pub use report::{
    FailureReport, InputWarning, Outcome, PipelineState, RunReport, StatusUpdate, Submission,
    TROUBLESHOOTING,
};
