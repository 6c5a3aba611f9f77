//! The workflow state machine.

use strum_macros::{AsRefStr, Display};

/// Stage of one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum WorkflowState {
    /// Created, nothing checked yet.
    Init,
    /// Checking the raw request.
    ValidatingInput,
    /// Intent selection and location resolution running side by side.
    ParallelDispatch,
    /// Querying the geodata provider.
    FetchingPois,
    /// Running the metrics engine.
    ComputingStatistics,
    /// Writing the narrative summary.
    GeneratingSummary,
    /// Finished with a full result.
    Done,
    /// Finished with errors only.
    Error,
}

/// Every allowed `(from, to)` pair.
pub const TRANSITIONS: &[(WorkflowState, WorkflowState)] = &[
    (WorkflowState::Init, WorkflowState::ValidatingInput),
    (WorkflowState::ValidatingInput, WorkflowState::ParallelDispatch),
    (WorkflowState::ValidatingInput, WorkflowState::Error),
    (WorkflowState::ParallelDispatch, WorkflowState::FetchingPois),
    (WorkflowState::ParallelDispatch, WorkflowState::Error),
    (WorkflowState::FetchingPois, WorkflowState::ComputingStatistics),
    (WorkflowState::FetchingPois, WorkflowState::Error),
    (WorkflowState::ComputingStatistics, WorkflowState::GeneratingSummary),
    (WorkflowState::ComputingStatistics, WorkflowState::Error),
    (WorkflowState::GeneratingSummary, WorkflowState::Done),
];

impl WorkflowState {
    /// Whether the table allows moving from `self` to `next`.
    #[must_use]
    pub fn can_transition(self, next: Self) -> bool {
        TRANSITIONS.contains(&(self, next))
    }

    /// `Done` and `Error` have no outgoing transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}
