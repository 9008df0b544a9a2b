//! Account linking workflow.

mod queue;
mod workflow;

pub use workflow::{LinkOutcome, LinkingWorkflow, UnlinkOutcome};
