//! The permission gate: may this principal fire this action on this order?
//!
//! Pure decision logic. Evaluation order is fixed:
//!
//! 1. elevated override — a system administrator may `cancel` anything
//!    non-terminal;
//! 2. role-action table — each action has a fixed set of eligible roles;
//! 3. relationship checks — area scoping, assignee identity, reporter
//!    identity;
//! 4. dispatch-time roster validation of the nominated assignee.
//!
//! A denial always carries a [`DenyReason`], never a bare boolean, so the
//! engine can surface an actionable message.

use crate::errors::DenyReason;
use crate::workorder::models::{Principal, Role, WorkOrder, WorkOrderAction};
use crate::workorder::roster::RosterLookup;

/// Roles eligible for an action before relationship checks apply.
/// `reporter_confirm`/`reporter_reject` are absent on purpose: eligibility
/// there is identity-based (the order's original reporter, or an admin) and
/// handled separately.
fn eligible_roles(action: WorkOrderAction) -> &'static [Role] {
    use Role::*;
    use WorkOrderAction as A;
    match action {
        A::Dispatch | A::Reject | A::ApproveReview | A::RejectReview | A::ReassignAfterRejection => {
            &[Dispatcher, AreaSupervisor, SystemAdmin]
        }
        A::StartProcessing | A::SubmitForReview => &[FieldWorker],
        A::FinalApprove | A::FinalReject => &[SystemAdmin, MonitoringSupervisor],
        A::TimeoutIntervene => &[AreaSupervisor, SystemAdmin],
        A::Cancel => &[SystemAdmin, MonitoringSupervisor, Dispatcher, AreaSupervisor],
        A::ReporterConfirm | A::ReporterReject => &[],
    }
}

/// Decide whether `actor` may perform `action` on `order`.
///
/// `nominated_assignee` is consulted only for `dispatch`, where the gate
/// validates the nominee against the roster: the nominee must exist, be
/// active, and hold the field-worker role. A roster failure is a denial,
/// not a crash.
pub fn can_perform(
    actor: &Principal,
    action: WorkOrderAction,
    order: &WorkOrder,
    roster: &dyn RosterLookup,
    nominated_assignee: Option<&str>,
) -> Result<(), DenyReason> {
    use WorkOrderAction as A;

    // 1. Elevated override: administrators may cancel from any non-terminal
    //    state regardless of the role table below.
    if actor.role == Role::SystemAdmin && action == A::Cancel {
        return Ok(());
    }

    // 2. Reporter confirmation is identity-based: the order's original
    //    reporter, or an administrator acting on their behalf.
    if matches!(action, A::ReporterConfirm | A::ReporterReject) {
        if actor.role == Role::SystemAdmin {
            return Ok(());
        }
        return match order.initial_reporter_id.as_deref() {
            Some(reporter) if reporter == actor.id => Ok(()),
            _ => Err(DenyReason::NotReporter),
        };
    }

    // 2. Role-action table.
    if !eligible_roles(action).contains(&actor.role) {
        return Err(DenyReason::RoleIneligible {
            role: actor.role,
            action,
        });
    }

    // 3. Relationship checks. Area-scoped roles act only within their own
    //    area; field workers act only on orders assigned to them.
    if actor.role.is_area_scoped() && actor.area_id.as_deref() != Some(order.area_id.as_str()) {
        return Err(DenyReason::WrongArea {
            area_id: order.area_id.clone(),
        });
    }
    if actor.role == Role::FieldWorker && order.assignee_id.as_deref() != Some(actor.id.as_str()) {
        return Err(DenyReason::NotAssignee);
    }

    // 4. Dispatch-time validation of the nominated assignee against the
    //    roster. The engine has already rejected an absent nomination.
    if action == A::Dispatch {
        if let Some(assignee) = nominated_assignee {
            match roster.is_active_field_worker(assignee) {
                Ok(true) => {}
                Ok(false) => {
                    return Err(DenyReason::AssigneeNotFieldWorker {
                        assignee_id: assignee.to_string(),
                    });
                }
                Err(e) => {
                    return Err(DenyReason::RosterLookupFailed {
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    Ok(())
}
