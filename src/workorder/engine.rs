//! The workorder engine: executes transition requests end-to-end.
//!
//! `apply_action` composes the permission gate, the state machine, and the
//! store. The whole read-gate-decide-write sequence runs in one store call
//! on the blocking pool, and the snapshot write carries a compare-and-swap
//! on `version`, so a request racing a concurrent writer (another process,
//! or the escalation sweep) loses cleanly with `ConcurrentModification`
//! instead of clobbering its update.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::errors::EngineError;
use crate::workorder::clock::{Clock, IdGenerator};
use crate::workorder::events::{DomainEvent, EventSink};
use crate::workorder::machine;
use crate::workorder::models::{
    ActionPayload, InterventionDisposition, Principal, Priority, ProcessingResult,
    StatusHistoryEntry, WorkOrder, WorkOrderAction, WorkOrderStatus, WorkflowKind,
};
use crate::workorder::permissions;
use crate::workorder::roster::RosterLookup;
use crate::workorder::store::DbHandle;

/// How many times `apply_action_with_retry` re-reads and re-applies before
/// giving up on a contended order.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// A transition request, transport-agnostic: the HTTP layer, the CLI, and
/// the escalation scheduler all speak this contract.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub order_id: String,
    pub action: WorkOrderAction,
    pub actor: Principal,
    pub note: String,
    pub payload: ActionPayload,
}

/// The committed result of a transition.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub order: WorkOrder,
    pub event: DomainEvent,
}

/// Where a new order came from. Fixes `workflow_kind` at creation; it is
/// never re-derived from the nullable id fields afterwards.
#[derive(Debug, Clone)]
pub enum OrderOrigin {
    /// Raised by a human patroller, who becomes the order's
    /// `initial_reporter_id` and is entitled to the confirmation step.
    Manual { reporter_id: String },
    /// Raised by the AI vision alarm pipeline.
    AiAlarm { alarm_id: String },
}

#[derive(Debug, Clone)]
pub struct WorkOrderDraft {
    pub title: String,
    pub description: String,
    pub area_id: String,
    pub priority: Priority,
    pub origin: OrderOrigin,
}

pub struct WorkOrderEngine {
    store: DbHandle,
    roster: Arc<dyn RosterLookup>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl WorkOrderEngine {
    pub fn new(
        store: DbHandle,
        roster: Arc<dyn RosterLookup>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            store,
            roster,
            events,
            clock,
            ids,
        }
    }

    pub fn store(&self) -> &DbHandle {
        &self.store
    }

    /// Create a new order in `PendingDispatch`. Creation is not a
    /// transition: the audit trail starts with the first action fired
    /// against the order.
    pub async fn create_order(&self, draft: WorkOrderDraft) -> Result<WorkOrder, EngineError> {
        let now = self.clock.now();
        let id = self.ids.next_id("WO");

        let (workflow_kind, creator_id, initial_reporter_id, alarm_id) = match &draft.origin {
            OrderOrigin::Manual { reporter_id } => (
                WorkflowKind::Manual,
                Some(reporter_id.clone()),
                Some(reporter_id.clone()),
                None,
            ),
            OrderOrigin::AiAlarm { alarm_id } => {
                (WorkflowKind::AiSourced, None, None, Some(alarm_id.clone()))
            }
        };

        let order = WorkOrder {
            id,
            title: draft.title,
            description: draft.description,
            workflow_kind,
            status: WorkOrderStatus::PendingDispatch,
            priority: draft.priority,
            area_id: draft.area_id,
            alarm_id,
            creator_id,
            initial_reporter_id,
            assignee_id: None,
            supervisor_id: None,
            reviewer_id: None,
            final_reviewer_id: None,
            timeout_intervener_id: None,
            processing_result_id: None,
            created_at: now,
            dispatched_at: None,
            started_at: None,
            submitted_at: None,
            reviewed_at: None,
            reporter_confirmed_at: None,
            completed_at: None,
            updated_at: now,
            version: 0,
        };

        let stored = order.clone();
        self.store
            .call::<_, _, EngineError>(move |db| Ok(db.insert_order(&stored)?))
            .await?;

        let event = DomainEvent::OrderCreated {
            order_id: order.id.clone(),
            workflow_kind: order.workflow_kind,
            area_id: order.area_id.clone(),
        };
        self.emit(&event);
        info!(order_id = %order.id, kind = %order.workflow_kind, "workorder created");

        Ok(order)
    }

    /// Execute a transition request.
    ///
    /// 1. validate the action-specific payload (no state touched);
    /// 2. load the order at its current version;
    /// 3. ask the permission gate — a denial mutates nothing;
    /// 4. ask the state machine for the resulting status;
    /// 5. apply the action's side effects to the snapshot;
    /// 6. commit with a compare-and-swap on `version`, appending the
    ///    history row in the same transaction;
    /// 7. emit the domain event (fire-and-forget).
    pub async fn apply_action(
        &self,
        req: TransitionRequest,
    ) -> Result<TransitionOutcome, EngineError> {
        validate_payload(&req)?;

        let roster = self.roster.clone();
        let clock = self.clock.clone();
        let ids = self.ids.clone();

        let outcome = self
            .store
            .call(move |db| -> Result<TransitionOutcome, EngineError> {
                let order = db.get_order(&req.order_id)?.ok_or_else(|| EngineError::NotFound {
                    id: req.order_id.clone(),
                })?;

                permissions::can_perform(
                    &req.actor,
                    req.action,
                    &order,
                    roster.as_ref(),
                    req.payload.assignee_id.as_deref(),
                )
                .map_err(EngineError::PermissionDenied)?;

                let next = machine::next_status(
                    order.status,
                    req.action,
                    order.workflow_kind,
                    req.payload.disposition,
                )?;

                let now = clock.now();
                let expected_version = order.version;
                let mut updated = order.clone();
                updated.status = next;
                updated.version = expected_version + 1;
                updated.updated_at = now;
                let result = apply_side_effects(&mut updated, &req, now, ids.as_ref());

                let entry = StatusHistoryEntry {
                    id: ids.next_id("WSH"),
                    workorder_id: updated.id.clone(),
                    version: updated.version,
                    from_status: order.status,
                    to_status: next,
                    action: req.action,
                    actor_id: req.actor.id.clone(),
                    note: req.note.clone(),
                    occurred_at: now,
                };

                db.commit_transition(&updated, expected_version, &entry, result.as_ref())?;

                let event = DomainEvent::for_transition(&updated, &entry, req.payload.disposition);
                Ok(TransitionOutcome {
                    order: updated,
                    event,
                })
            })
            .await?;

        self.emit(&outcome.event);
        info!(
            order_id = %outcome.order.id,
            status = %outcome.order.status,
            version = outcome.order.version,
            event = outcome.event.kind(),
            "transition committed"
        );

        Ok(outcome)
    }

    /// `apply_action` with bounded retries on `ConcurrentModification`, the
    /// one retryable error. Each attempt re-reads the order, so a retry
    /// observes the state the winning writer left behind.
    pub async fn apply_action_with_retry(
        &self,
        req: TransitionRequest,
        max_attempts: u32,
    ) -> Result<TransitionOutcome, EngineError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.apply_action(req.clone()).await {
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    warn!(
                        order_id = %req.order_id,
                        attempt,
                        "concurrent modification, retrying"
                    );
                }
                other => return other,
            }
        }
    }

    fn emit(&self, event: &DomainEvent) {
        if let Err(err) = self.events.publish(event) {
            // Publishing is best-effort; the transition already committed.
            warn!(event = event.kind(), error = %err, "failed to publish domain event");
        }
    }
}

/// Check the action-specific payload before any state is touched.
fn validate_payload(req: &TransitionRequest) -> Result<(), EngineError> {
    match req.action {
        WorkOrderAction::Dispatch => match req.payload.assignee_id.as_deref() {
            Some(assignee) if !assignee.trim().is_empty() => Ok(()),
            _ => Err(EngineError::MissingAssignee),
        },
        WorkOrderAction::SubmitForReview => {
            let result = req.payload.result.as_ref().ok_or(EngineError::MissingEvidence {
                detail: "a processing result is required".to_string(),
            })?;
            if result.description.trim().is_empty() {
                return Err(EngineError::MissingEvidence {
                    detail: "the result description must not be empty".to_string(),
                });
            }
            if result.after_media.is_empty() {
                return Err(EngineError::MissingEvidence {
                    detail: "at least one after-media reference is required".to_string(),
                });
            }
            if result.needs_follow_up
                && result
                    .follow_up_reason
                    .as_deref()
                    .is_none_or(|r| r.trim().is_empty())
            {
                return Err(EngineError::MissingEvidence {
                    detail: "a follow-up reason is required when follow-up is flagged".to_string(),
                });
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Apply the action's side effects to the updated snapshot. Status,
/// `version`, and `updated_at` are already set by the caller. Returns the
/// processing result to persist when the action produced one.
fn apply_side_effects(
    order: &mut WorkOrder,
    req: &TransitionRequest,
    now: DateTime<Utc>,
    ids: &dyn IdGenerator,
) -> Option<ProcessingResult> {
    use WorkOrderAction as A;
    match req.action {
        A::Dispatch => {
            order.assignee_id = req.payload.assignee_id.clone();
            order.supervisor_id = Some(req.actor.id.clone());
            order.dispatched_at = Some(now);
            None
        }
        A::Reject => {
            order.supervisor_id = Some(req.actor.id.clone());
            None
        }
        A::StartProcessing => {
            order.started_at = Some(now);
            None
        }
        A::SubmitForReview => {
            // Validated up front; a rework loop creates a fresh result row
            // and re-points the order at it.
            let draft = req.payload.result.clone().unwrap_or_default();
            let result = ProcessingResult {
                id: ids.next_id("WR"),
                workorder_id: order.id.clone(),
                method: draft.method,
                description: draft.description,
                before_media: draft.before_media,
                after_media: draft.after_media,
                needs_follow_up: draft.needs_follow_up,
                follow_up_reason: draft.follow_up_reason,
                submitted_by: req.actor.id.clone(),
                submitted_at: now,
            };
            order.processing_result_id = Some(result.id.clone());
            order.submitted_at = Some(now);
            Some(result)
        }
        A::ApproveReview | A::RejectReview => {
            order.reviewer_id = Some(req.actor.id.clone());
            order.reviewed_at = Some(now);
            None
        }
        A::FinalApprove => {
            order.final_reviewer_id = Some(req.actor.id.clone());
            order.completed_at = Some(now);
            None
        }
        A::FinalReject => {
            order.final_reviewer_id = Some(req.actor.id.clone());
            None
        }
        A::ReporterConfirm => {
            order.reporter_confirmed_at = Some(now);
            order.completed_at = Some(now);
            None
        }
        A::ReporterReject => {
            order.reporter_confirmed_at = Some(now);
            None
        }
        A::TimeoutIntervene => {
            order.timeout_intervener_id = Some(req.actor.id.clone());
            match req.payload.disposition {
                Some(InterventionDisposition::Completed) => {
                    order.completed_at = Some(now);
                }
                // Back to the dispatch queue: the next cycle picks its own
                // field worker.
                Some(InterventionDisposition::Rejected) => {
                    order.assignee_id = None;
                }
                None => {}
            }
            None
        }
        A::ReassignAfterRejection => {
            order.assignee_id = None;
            order.supervisor_id = Some(req.actor.id.clone());
            None
        }
        A::Cancel => None,
    }
}
