//! The canonical transition table for workorder statuses.
//!
//! This is the ONLY place a status transition is decided. The function is
//! pure and deterministic: identity and role legality are the permission
//! gate's job, persistence is the store's. Unknown `(status, action)` pairs
//! fail with a typed error, never a silent no-op.

use crate::errors::EngineError;
use crate::workorder::models::{
    InterventionDisposition, WorkOrderAction, WorkOrderStatus, WorkflowKind,
};

/// Resolve the status an action leads to from the current status.
///
/// `kind` is consulted only for the `approve_review` branch: AI-sourced
/// orders require an administrative final review because no human reporter
/// exists to confirm field results; manual orders go to the original
/// reporter for on-site confirmation. The branch keys off the immutable
/// `workflow_kind` set at creation, never a re-derived classification.
///
/// `disposition` is consulted only for `timeout_intervene`, which resolves
/// the stalled confirmation either as completed or back to dispatch.
pub fn next_status(
    current: WorkOrderStatus,
    action: WorkOrderAction,
    kind: WorkflowKind,
    disposition: Option<InterventionDisposition>,
) -> Result<WorkOrderStatus, EngineError> {
    use WorkOrderAction as A;
    use WorkOrderStatus as S;

    let next = match (current, action) {
        (S::PendingDispatch, A::Dispatch) => S::Dispatched,
        (S::PendingDispatch, A::Reject) => S::Rejected,
        (S::Dispatched, A::StartProcessing) => S::Processing,
        (S::Processing, A::SubmitForReview) => S::PendingReview,
        (S::PendingReview, A::ApproveReview) => match kind {
            WorkflowKind::AiSourced => S::PendingFinalReview,
            WorkflowKind::Manual => S::PendingReporterConfirm,
        },
        (S::PendingReview, A::RejectReview) => S::Processing,
        (S::PendingFinalReview, A::FinalApprove) => S::Completed,
        (S::PendingFinalReview, A::FinalReject) => S::Processing,
        (S::PendingReporterConfirm, A::ReporterConfirm) => S::Completed,
        (S::PendingReporterConfirm, A::ReporterReject) => S::ConfirmedFailed,
        (S::PendingReporterConfirm, A::TimeoutIntervene) => match disposition {
            Some(InterventionDisposition::Completed) => S::Completed,
            Some(InterventionDisposition::Rejected) => S::PendingDispatch,
            None => return Err(EngineError::InvalidTransition { action, from: current }),
        },
        (S::ConfirmedFailed, A::ReassignAfterRejection) => S::PendingDispatch,
        // The one edge that bypasses strict state adjacency: legal from any
        // non-terminal state, gated by the elevated permission check.
        (from, A::Cancel) if !from.is_terminal() => S::Cancelled,
        _ => return Err(EngineError::InvalidTransition { action, from: current }),
    };

    Ok(next)
}
