//! Workflow engine
//!
//! Coordinates one analysis run: validation, the concurrent specialist
//! stage and consolidation into a [`FinalReport`].

pub mod orchestrator;
pub mod progress;
pub mod report;
pub mod state;

pub use orchestrator::{Orchestrator, WorkflowPhase};
pub use progress::{ChannelListener, NoopListener, ProgressListener, TracingListener, WorkflowEvent};
pub use report::{FinalReport, VerdictBasis};
pub use state::AnalysisState;
