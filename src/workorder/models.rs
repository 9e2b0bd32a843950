use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a workorder. Transitions between statuses are owned
/// exclusively by `machine::next_status`; nothing else may branch on the raw
/// string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    PendingDispatch,
    Dispatched,
    Processing,
    PendingReview,
    PendingFinalReview,
    PendingReporterConfirm,
    ConfirmedFailed,
    Completed,
    Rejected,
    Cancelled,
}

impl WorkOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingDispatch => "pending_dispatch",
            Self::Dispatched => "dispatched",
            Self::Processing => "processing",
            Self::PendingReview => "pending_review",
            Self::PendingFinalReview => "pending_final_review",
            Self::PendingReporterConfirm => "pending_reporter_confirm",
            Self::ConfirmedFailed => "confirmed_failed",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    /// Terminal statuses accept no further transitions, `cancel` included.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Cancelled)
    }

    pub fn all() -> [WorkOrderStatus; 10] {
        [
            Self::PendingDispatch,
            Self::Dispatched,
            Self::Processing,
            Self::PendingReview,
            Self::PendingFinalReview,
            Self::PendingReporterConfirm,
            Self::ConfirmedFailed,
            Self::Completed,
            Self::Rejected,
            Self::Cancelled,
        ]
    }
}

impl std::fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkOrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_dispatch" => Ok(Self::PendingDispatch),
            "dispatched" => Ok(Self::Dispatched),
            "processing" => Ok(Self::Processing),
            "pending_review" => Ok(Self::PendingReview),
            "pending_final_review" => Ok(Self::PendingFinalReview),
            "pending_reporter_confirm" => Ok(Self::PendingReporterConfirm),
            "confirmed_failed" => Ok(Self::ConfirmedFailed),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid workorder status: {}", s)),
        }
    }
}

/// Actions a caller may request against a workorder. Whether an action is
/// legal from the current status is the state machine's decision; whether
/// this actor may fire it is the permission gate's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderAction {
    Dispatch,
    Reject,
    StartProcessing,
    SubmitForReview,
    ApproveReview,
    RejectReview,
    FinalApprove,
    FinalReject,
    ReporterConfirm,
    ReporterReject,
    TimeoutIntervene,
    ReassignAfterRejection,
    Cancel,
}

impl WorkOrderAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dispatch => "dispatch",
            Self::Reject => "reject",
            Self::StartProcessing => "start_processing",
            Self::SubmitForReview => "submit_for_review",
            Self::ApproveReview => "approve_review",
            Self::RejectReview => "reject_review",
            Self::FinalApprove => "final_approve",
            Self::FinalReject => "final_reject",
            Self::ReporterConfirm => "reporter_confirm",
            Self::ReporterReject => "reporter_reject",
            Self::TimeoutIntervene => "timeout_intervene",
            Self::ReassignAfterRejection => "reassign_after_rejection",
            Self::Cancel => "cancel",
        }
    }

    pub fn all() -> [WorkOrderAction; 13] {
        [
            Self::Dispatch,
            Self::Reject,
            Self::StartProcessing,
            Self::SubmitForReview,
            Self::ApproveReview,
            Self::RejectReview,
            Self::FinalApprove,
            Self::FinalReject,
            Self::ReporterConfirm,
            Self::ReporterReject,
            Self::TimeoutIntervene,
            Self::ReassignAfterRejection,
            Self::Cancel,
        ]
    }
}

impl std::fmt::Display for WorkOrderAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkOrderAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dispatch" => Ok(Self::Dispatch),
            "reject" => Ok(Self::Reject),
            "start_processing" => Ok(Self::StartProcessing),
            "submit_for_review" => Ok(Self::SubmitForReview),
            "approve_review" => Ok(Self::ApproveReview),
            "reject_review" => Ok(Self::RejectReview),
            "final_approve" => Ok(Self::FinalApprove),
            "final_reject" => Ok(Self::FinalReject),
            "reporter_confirm" => Ok(Self::ReporterConfirm),
            "reporter_reject" => Ok(Self::ReporterReject),
            "timeout_intervene" => Ok(Self::TimeoutIntervene),
            "reassign_after_rejection" => Ok(Self::ReassignAfterRejection),
            "cancel" => Ok(Self::Cancel),
            _ => Err(format!("Invalid workorder action: {}", s)),
        }
    }
}

/// How the order entered the system. Fixed at creation and never recomputed
/// from other fields: this is the value the review branch keys off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Manual,
    AiSourced,
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::AiSourced => "ai_sourced",
        }
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "ai_sourced" => Ok(Self::AiSourced),
            _ => Err(format!("Invalid workflow kind: {}", s)),
        }
    }
}

/// Priority affects escalation deadlines and notification routing, never
/// the legality of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Urgent,
    Important,
    Normal,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::Important => "important",
            Self::Normal => "normal",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "urgent" => Ok(Self::Urgent),
            "important" => Ok(Self::Important),
            "normal" => Ok(Self::Normal),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

/// Roles in the river-management organisation. The permission gate is the
/// only component allowed to branch on these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SystemAdmin,
    MonitoringSupervisor,
    FieldWorker,
    Patroller,
    Dispatcher,
    AreaSupervisor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SystemAdmin => "system_admin",
            Self::MonitoringSupervisor => "monitoring_supervisor",
            Self::FieldWorker => "field_worker",
            Self::Patroller => "patroller",
            Self::Dispatcher => "dispatcher",
            Self::AreaSupervisor => "area_supervisor",
        }
    }

    /// Roles whose authority is scoped to a single managed area.
    pub fn is_area_scoped(&self) -> bool {
        matches!(self, Self::Dispatcher | Self::AreaSupervisor)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system_admin" => Ok(Self::SystemAdmin),
            "monitoring_supervisor" => Ok(Self::MonitoringSupervisor),
            "field_worker" => Ok(Self::FieldWorker),
            "patroller" => Ok(Self::Patroller),
            "dispatcher" => Ok(Self::Dispatcher),
            "area_supervisor" => Ok(Self::AreaSupervisor),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// What a timeout intervention resolves the order to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionDisposition {
    Completed,
    Rejected,
}

impl InterventionDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for InterventionDisposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterventionDisposition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Invalid intervention disposition: {}", s)),
        }
    }
}

/// Reporting-only classification of how far past the confirmation deadline
/// an order has drifted. Never affects transition legality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutSeverity {
    Normal,
    High,
    Critical,
}

impl TimeoutSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for TimeoutSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verified caller identity, handed to the engine by the auth layer.
/// JWT verification happens upstream; by the time a principal reaches this
/// crate it is trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub role: Role,
    pub area_id: Option<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            area_id: None,
        }
    }

    pub fn with_area(id: impl Into<String>, role: Role, area_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            area_id: Some(area_id.into()),
        }
    }
}

/// The aggregate root. Mutated exclusively through `WorkOrderEngine`
/// transitions; `version` increments by exactly one per committed
/// transition and is the key for the store's compare-and-swap write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: String,
    pub title: String,
    pub description: String,
    pub workflow_kind: WorkflowKind,
    pub status: WorkOrderStatus,
    pub priority: Priority,
    pub area_id: String,
    /// AI alarm that spawned an `AiSourced` order.
    pub alarm_id: Option<String>,
    /// Human creator; `None` marks system (AI) origin.
    pub creator_id: Option<String>,
    /// The principal entitled to the reporter-confirmation step.
    pub initial_reporter_id: Option<String>,
    pub assignee_id: Option<String>,
    /// Dispatcher/area supervisor who routed the order.
    pub supervisor_id: Option<String>,
    pub reviewer_id: Option<String>,
    pub final_reviewer_id: Option<String>,
    pub timeout_intervener_id: Option<String>,
    pub processing_result_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reporter_confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Rewritten only by transitions, so while an order sits in
    /// `PendingReporterConfirm` this is exactly the time that state was
    /// entered — the escalation deadline is measured against it.
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

/// One row of the append-only audit trail. Never mutated or deleted.
/// `version` is the order version at which the write committed, giving a
/// strict total order per workorder even under concurrent writers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: String,
    pub workorder_id: String,
    pub version: i64,
    pub from_status: WorkOrderStatus,
    pub to_status: WorkOrderStatus,
    pub action: WorkOrderAction,
    pub actor_id: String,
    pub note: String,
    pub occurred_at: DateTime<Utc>,
}

/// Field evidence attached by `submit_for_review`. One row per processing
/// cycle; rework loops create a new row rather than editing the old one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub id: String,
    pub workorder_id: String,
    pub method: String,
    pub description: String,
    pub before_media: Vec<String>,
    pub after_media: Vec<String>,
    pub needs_follow_up: bool,
    pub follow_up_reason: Option<String>,
    pub submitted_by: String,
    pub submitted_at: DateTime<Utc>,
}

/// Evidence submitted alongside `submit_for_review`, before the engine has
/// assigned it an id and timestamp.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingResultDraft {
    pub method: String,
    pub description: String,
    #[serde(default)]
    pub before_media: Vec<String>,
    #[serde(default)]
    pub after_media: Vec<String>,
    #[serde(default)]
    pub needs_follow_up: bool,
    #[serde(default)]
    pub follow_up_reason: Option<String>,
}

/// Action-specific payload accompanying a transition request. Which fields
/// are required for which action is validated by the engine before any
/// state change is attempted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionPayload {
    /// Required for `dispatch`.
    #[serde(default)]
    pub assignee_id: Option<String>,
    /// Required for `submit_for_review`.
    #[serde(default)]
    pub result: Option<ProcessingResultDraft>,
    /// Required for `timeout_intervene`.
    #[serde(default)]
    pub disposition: Option<InterventionDisposition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in WorkOrderStatus::all() {
            let parsed: WorkOrderStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("invalid".parse::<WorkOrderStatus>().is_err());
    }

    #[test]
    fn test_action_roundtrip() {
        for action in WorkOrderAction::all() {
            let parsed: WorkOrderAction = action.as_str().parse().unwrap();
            assert_eq!(parsed, action);
        }
        assert!("invalid".parse::<WorkOrderAction>().is_err());
    }

    #[test]
    fn test_role_roundtrip() {
        for s in &[
            "system_admin",
            "monitoring_supervisor",
            "field_worker",
            "patroller",
            "dispatcher",
            "area_supervisor",
        ] {
            let parsed: Role = s.parse().unwrap();
            assert_eq!(parsed.as_str(), *s);
        }
        assert!("invalid".parse::<Role>().is_err());
    }

    #[test]
    fn test_priority_and_kind_roundtrip() {
        for s in &["urgent", "important", "normal"] {
            let parsed: Priority = s.parse().unwrap();
            assert_eq!(parsed.as_str(), *s);
        }
        for s in &["manual", "ai_sourced"] {
            let parsed: WorkflowKind = s.parse().unwrap();
            assert_eq!(parsed.as_str(), *s);
        }
        for s in &["completed", "rejected"] {
            let parsed: InterventionDisposition = s.parse().unwrap();
            assert_eq!(parsed.as_str(), *s);
        }
    }

    #[test]
    fn test_terminal_statuses() {
        let terminals = [
            WorkOrderStatus::Completed,
            WorkOrderStatus::Rejected,
            WorkOrderStatus::Cancelled,
        ];
        for status in WorkOrderStatus::all() {
            assert_eq!(status.is_terminal(), terminals.contains(&status));
        }
    }

    #[test]
    fn test_area_scoped_roles() {
        assert!(Role::Dispatcher.is_area_scoped());
        assert!(Role::AreaSupervisor.is_area_scoped());
        assert!(!Role::SystemAdmin.is_area_scoped());
        assert!(!Role::FieldWorker.is_area_scoped());
        assert!(!Role::MonitoringSupervisor.is_area_scoped());
        assert!(!Role::Patroller.is_area_scoped());
    }

    #[test]
    fn test_serde_produces_lowercase_strings() {
        // JSON serialization must use lowercase snake_case, not PascalCase
        assert_eq!(
            serde_json::to_string(&WorkOrderStatus::PendingReporterConfirm).unwrap(),
            "\"pending_reporter_confirm\""
        );
        assert_eq!(
            serde_json::to_string(&WorkOrderAction::SubmitForReview).unwrap(),
            "\"submit_for_review\""
        );
        assert_eq!(
            serde_json::to_string(&WorkflowKind::AiSourced).unwrap(),
            "\"ai_sourced\""
        );
        assert_eq!(
            serde_json::to_string(&Role::AreaSupervisor).unwrap(),
            "\"area_supervisor\""
        );
    }

    #[test]
    fn test_serde_deserialize_lowercase_strings() {
        assert_eq!(
            serde_json::from_str::<WorkOrderStatus>("\"confirmed_failed\"").unwrap(),
            WorkOrderStatus::ConfirmedFailed
        );
        assert_eq!(
            serde_json::from_str::<WorkOrderAction>("\"timeout_intervene\"").unwrap(),
            WorkOrderAction::TimeoutIntervene
        );
        assert_eq!(
            serde_json::from_str::<TimeoutSeverity>("\"critical\"").unwrap(),
            TimeoutSeverity::Critical
        );
    }

    #[test]
    fn test_action_payload_defaults_from_empty_json() {
        let payload: ActionPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.assignee_id.is_none());
        assert!(payload.result.is_none());
        assert!(payload.disposition.is_none());
    }
}
