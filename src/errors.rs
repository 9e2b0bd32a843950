//! Typed error hierarchy for the workorder engine.
//!
//! Three top-level enums cover the three layers:
//! - `EngineError` — domain-rule violations surfaced by `apply_action`
//! - `DenyReason` — structured permission denials from the gate
//! - `StoreError` — persistence failures, kept distinct from domain errors

use thiserror::Error;

use crate::workorder::models::{Role, WorkOrderAction, WorkOrderStatus};

/// Errors from the workorder engine. Every variant except
/// `ConcurrentModification` is terminal for the request: callers must not
/// retry blindly. `ConcurrentModification` means the order changed under the
/// caller; re-read and retry.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("permission denied: {0}")]
    PermissionDenied(DenyReason),

    #[error("action '{action}' is not valid from status '{from}'")]
    InvalidTransition {
        action: WorkOrderAction,
        from: WorkOrderStatus,
    },

    #[error("dispatch requires a nominated assignee")]
    MissingAssignee,

    #[error("submit_for_review requires evidence: {detail}")]
    MissingEvidence { detail: String },

    #[error("workorder {id} was modified concurrently; re-read and retry")]
    ConcurrentModification { id: String },

    #[error("workorder {id} not found")]
    NotFound { id: String },

    #[error("store failure: {0}")]
    Store(StoreError),
}

impl EngineError {
    /// Whether the caller may retry the same request after a re-read.
    /// `ConcurrentModification` is the only retryable kind.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }
}

// Version conflicts and missing rows are domain outcomes, not infrastructure
// failures; everything else stays wrapped as `Store`.
impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict { id, .. } => Self::ConcurrentModification { id },
            StoreError::NotFound { id } => Self::NotFound { id },
            other => Self::Store(other),
        }
    }
}

/// Why the permission gate refused an action. Every variant renders an
/// actionable message; the gate never answers with a bare boolean.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DenyReason {
    #[error("role '{role}' may not perform '{action}'")]
    RoleIneligible {
        role: Role,
        action: WorkOrderAction,
    },

    #[error("only the supervisor for area '{area_id}' may act on this order")]
    WrongArea { area_id: String },

    #[error("only the assigned field worker may perform this step")]
    NotAssignee,

    #[error("only the original reporter of this order may confirm its resolution")]
    NotReporter,

    #[error("user '{assignee_id}' is not an active field worker")]
    AssigneeNotFieldWorker { assignee_id: String },

    #[error("could not verify the nominated assignee against the roster: {message}")]
    RosterLookupFailed { message: String },
}

/// Errors from the SQLite store layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("workorder {id} version mismatch (expected {expected})")]
    VersionConflict { id: String, expected: i64 },

    #[error("workorder {id} not found")]
    NotFound { id: String },

    #[error("invalid stored value for {field}: {value}")]
    InvalidColumn { field: &'static str, value: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("database task panicked: {0}")]
    TaskPanicked(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_invalid_transition_carries_context() {
        let err = EngineError::InvalidTransition {
            action: WorkOrderAction::Dispatch,
            from: WorkOrderStatus::Completed,
        };
        let msg = err.to_string();
        assert!(msg.contains("dispatch"));
        assert!(msg.contains("completed"));
    }

    #[test]
    fn only_concurrent_modification_is_retryable() {
        let retryable = EngineError::ConcurrentModification {
            id: "WO-1".to_string(),
        };
        assert!(retryable.is_retryable());

        let denied = EngineError::PermissionDenied(DenyReason::NotAssignee);
        assert!(!denied.is_retryable());
        let missing = EngineError::MissingAssignee;
        assert!(!missing.is_retryable());
    }

    #[test]
    fn store_conflict_maps_to_concurrent_modification() {
        let err: EngineError = StoreError::VersionConflict {
            id: "WO-9".to_string(),
            expected: 3,
        }
        .into();
        assert!(matches!(
            err,
            EngineError::ConcurrentModification { ref id } if id == "WO-9"
        ));
    }

    #[test]
    fn store_not_found_maps_to_engine_not_found() {
        let err: EngineError = StoreError::NotFound {
            id: "WO-404".to_string(),
        }
        .into();
        assert!(matches!(err, EngineError::NotFound { ref id } if id == "WO-404"));
    }

    #[test]
    fn deny_reason_messages_name_the_constraint() {
        let err = DenyReason::RoleIneligible {
            role: Role::FieldWorker,
            action: WorkOrderAction::Dispatch,
        };
        assert!(err.to_string().contains("field_worker"));
        assert!(err.to_string().contains("dispatch"));

        let err = DenyReason::WrongArea {
            area_id: "AREA-3".to_string(),
        };
        assert!(err.to_string().contains("AREA-3"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&EngineError::MissingAssignee);
        assert_std_error(&DenyReason::NotAssignee);
        assert_std_error(&StoreError::LockPoisoned);
    }
}
