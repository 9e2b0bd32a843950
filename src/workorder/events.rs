//! Domain events emitted after each committed transition.
//!
//! Consumers (push notifications, dashboards) subscribe through an
//! [`EventSink`]. Publishing is fire-and-forget: a sink failure is logged
//! by the engine and never fails the transition that produced the event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::workorder::models::{
    InterventionDisposition, StatusHistoryEntry, WorkOrder, WorkOrderAction, WorkOrderStatus,
    WorkflowKind,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DomainEvent {
    OrderCreated {
        order_id: String,
        workflow_kind: WorkflowKind,
        area_id: String,
    },
    OrderDispatched {
        order_id: String,
        assignee_id: String,
    },
    OrderRejected {
        order_id: String,
    },
    OrderProcessingStarted {
        order_id: String,
    },
    /// Evidence submitted; `next_status` shows which review lane the order
    /// entered.
    OrderSubmitted {
        order_id: String,
        next_status: WorkOrderStatus,
    },
    OrderReviewApproved {
        order_id: String,
        next_status: WorkOrderStatus,
    },
    /// Review or final review sent the order back to the field.
    OrderReworkRequested {
        order_id: String,
    },
    OrderCompleted {
        order_id: String,
        completed_at: Option<DateTime<Utc>>,
    },
    /// The reporter judged the field result unsatisfactory.
    OrderConfirmFailed {
        order_id: String,
    },
    /// The escalation path resolved a stalled confirmation.
    OrderEscalated {
        order_id: String,
        disposition: InterventionDisposition,
    },
    /// Back to the dispatch queue after a failed confirmation.
    OrderReopened {
        order_id: String,
    },
    OrderCancelled {
        order_id: String,
    },
}

impl DomainEvent {
    /// Short name for logs and the API response.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OrderCreated { .. } => "order_created",
            Self::OrderDispatched { .. } => "order_dispatched",
            Self::OrderRejected { .. } => "order_rejected",
            Self::OrderProcessingStarted { .. } => "order_processing_started",
            Self::OrderSubmitted { .. } => "order_submitted",
            Self::OrderReviewApproved { .. } => "order_review_approved",
            Self::OrderReworkRequested { .. } => "order_rework_requested",
            Self::OrderCompleted { .. } => "order_completed",
            Self::OrderConfirmFailed { .. } => "order_confirm_failed",
            Self::OrderEscalated { .. } => "order_escalated",
            Self::OrderReopened { .. } => "order_reopened",
            Self::OrderCancelled { .. } => "order_cancelled",
        }
    }

    /// Map a committed transition to its event.
    pub fn for_transition(
        order: &WorkOrder,
        entry: &StatusHistoryEntry,
        disposition: Option<InterventionDisposition>,
    ) -> DomainEvent {
        use WorkOrderAction as A;
        match entry.action {
            A::Dispatch => Self::OrderDispatched {
                order_id: order.id.clone(),
                assignee_id: order.assignee_id.clone().unwrap_or_default(),
            },
            A::Reject => Self::OrderRejected {
                order_id: order.id.clone(),
            },
            A::StartProcessing => Self::OrderProcessingStarted {
                order_id: order.id.clone(),
            },
            A::SubmitForReview => Self::OrderSubmitted {
                order_id: order.id.clone(),
                next_status: entry.to_status,
            },
            A::ApproveReview => Self::OrderReviewApproved {
                order_id: order.id.clone(),
                next_status: entry.to_status,
            },
            A::RejectReview | A::FinalReject => Self::OrderReworkRequested {
                order_id: order.id.clone(),
            },
            A::FinalApprove | A::ReporterConfirm => Self::OrderCompleted {
                order_id: order.id.clone(),
                completed_at: order.completed_at,
            },
            A::ReporterReject => Self::OrderConfirmFailed {
                order_id: order.id.clone(),
            },
            A::TimeoutIntervene => Self::OrderEscalated {
                order_id: order.id.clone(),
                disposition: disposition.unwrap_or(InterventionDisposition::Completed),
            },
            A::ReassignAfterRejection => Self::OrderReopened {
                order_id: order.id.clone(),
            },
            A::Cancel => Self::OrderCancelled {
                order_id: order.id.clone(),
            },
        }
    }
}

#[derive(Debug, Error)]
#[error("event sink unavailable: {0}")]
pub struct EventSinkError(pub String);

/// Outbound event channel. Implementations must not block the caller.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &DomainEvent) -> Result<(), EventSinkError>;
}

/// Sink that records events in the structured log only. Used by the
/// one-shot CLI paths and as the default when no subscriber transport is
/// wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: &DomainEvent) -> Result<(), EventSinkError> {
        tracing::info!(event = event.kind(), payload = ?event, "domain event");
        Ok(())
    }
}

/// Sink fanning events out over a tokio broadcast channel; the server's
/// notification consumers subscribe to the receiving side. A send with no
/// live receivers is not an error — notifications are best-effort.
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    tx: broadcast::Sender<DomainEvent>,
}

impl BroadcastEventSink {
    pub fn new(tx: broadcast::Sender<DomainEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for BroadcastEventSink {
    fn publish(&self, event: &DomainEvent) -> Result<(), EventSinkError> {
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Collects published events for assertions.
    #[derive(Default)]
    pub struct RecordingEventSink {
        events: Mutex<Vec<DomainEvent>>,
    }

    impl RecordingEventSink {
        pub fn kinds(&self) -> Vec<&'static str> {
            self.events
                .lock()
                .expect("event sink lock poisoned")
                .iter()
                .map(DomainEvent::kind)
                .collect()
        }
    }

    impl EventSink for RecordingEventSink {
        fn publish(&self, event: &DomainEvent) -> Result<(), EventSinkError> {
            self.events
                .lock()
                .expect("event sink lock poisoned")
                .push(event.clone());
            Ok(())
        }
    }

    /// Sink that always fails, for checking the engine shrugs it off.
    pub struct FailingEventSink;

    impl EventSink for FailingEventSink {
        fn publish(&self, _event: &DomainEvent) -> Result<(), EventSinkError> {
            Err(EventSinkError("push gateway offline".to_string()))
        }
    }
}
