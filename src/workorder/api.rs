//! HTTP route handlers for the workorder engine.
//!
//! Authentication happens upstream: the auth proxy verifies the JWT and
//! forwards the verified principal in `x-actor-id` / `x-actor-role` /
//! `x-actor-area` headers. Handlers translate HTTP payloads into the
//! engine's transition contract and engine errors back into status codes.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::workorder::clock::Clock;
use crate::workorder::engine::{
    DEFAULT_RETRY_ATTEMPTS, OrderOrigin, TransitionRequest, WorkOrderDraft, WorkOrderEngine,
};
use crate::workorder::escalation::{self, EscalationConfig};
use crate::workorder::models::{
    ActionPayload, InterventionDisposition, Principal, Priority, ProcessingResult,
    ProcessingResultDraft, Role, StatusHistoryEntry, TimeoutSeverity, WorkOrder, WorkOrderAction,
    WorkOrderStatus,
};
use crate::workorder::store::DbHandle;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub engine: Arc<WorkOrderEngine>,
    pub store: DbHandle,
    pub clock: Arc<dyn Clock>,
    pub escalation: EscalationConfig,
}

pub type SharedState = Arc<AppState>;

// ── Request/response payload types ────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateWorkOrderRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub area_id: String,
    #[serde(default)]
    pub priority: Option<Priority>,
}

#[derive(Deserialize)]
pub struct IngestAlarmRequest {
    pub alarm_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub area_id: String,
    #[serde(default)]
    pub priority: Option<Priority>,
}

#[derive(Deserialize)]
pub struct ActionRequest {
    pub action: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub disposition: Option<InterventionDisposition>,
    #[serde(default)]
    pub result: Option<ProcessingResultDraft>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub area_id: Option<String>,
}

#[derive(Serialize)]
pub struct TransitionResponse {
    pub workorder: WorkOrder,
    pub version: i64,
    pub event: &'static str,
}

#[derive(Serialize)]
pub struct WorkOrderDetail {
    pub workorder: WorkOrder,
    pub history: Vec<StatusHistoryEntry>,
    pub results: Vec<ProcessingResult>,
}

#[derive(Serialize)]
pub struct OverdueWorkOrder {
    pub workorder: WorkOrder,
    pub timeout_hours: i64,
    pub severity: TimeoutSeverity,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::PermissionDenied(_) => Self::Forbidden(message),
            EngineError::InvalidTransition { .. } | EngineError::ConcurrentModification { .. } => {
                Self::Conflict(message)
            }
            EngineError::MissingAssignee | EngineError::MissingEvidence { .. } => {
                Self::BadRequest(message)
            }
            EngineError::NotFound { .. } => Self::NotFound(message),
            EngineError::Store(_) => Self::Internal(message),
        }
    }
}

/// Read the verified principal the auth proxy forwarded.
fn principal_from_headers(headers: &HeaderMap) -> Result<Principal, ApiError> {
    let id = headers
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("missing x-actor-id header".to_string()))?;
    let role = headers
        .get("x-actor-role")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing x-actor-role header".to_string()))?;
    let role = Role::from_str(role).map_err(ApiError::Unauthorized)?;
    let area_id = headers
        .get("x-actor-area")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    Ok(Principal {
        id: id.to_string(),
        role,
        area_id,
    })
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/workorders", get(list_workorders).post(create_workorder))
        .route("/api/workorders/overdue", get(list_overdue))
        .route("/api/workorders/{id}", get(get_workorder))
        .route("/api/workorders/{id}/actions", post(post_action))
        .route("/api/alarms/ingest", post(ingest_alarm))
        .route("/health", get(health_check))
}

async fn health_check() -> &'static str {
    "ok"
}

async fn create_workorder(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<CreateWorkOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from_headers(&headers)?;
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }
    if req.area_id.trim().is_empty() {
        return Err(ApiError::BadRequest("area_id must not be empty".to_string()));
    }

    let order = state
        .engine
        .create_order(WorkOrderDraft {
            title: req.title,
            description: req.description,
            area_id: req.area_id,
            priority: req.priority.unwrap_or(Priority::Normal),
            origin: OrderOrigin::Manual {
                reporter_id: principal.id,
            },
        })
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn ingest_alarm(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<IngestAlarmRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from_headers(&headers)?;
    // Only the monitoring side may feed alarms in
    if !matches!(principal.role, Role::SystemAdmin | Role::MonitoringSupervisor) {
        return Err(ApiError::Forbidden(
            "only monitoring may ingest alarms".to_string(),
        ));
    }
    if req.title.trim().is_empty() || req.area_id.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "title and area_id must not be empty".to_string(),
        ));
    }

    let order = state
        .engine
        .create_order(WorkOrderDraft {
            title: req.title,
            description: req.description,
            area_id: req.area_id,
            priority: req.priority.unwrap_or(Priority::Important),
            origin: OrderOrigin::AiAlarm {
                alarm_id: req.alarm_id,
            },
        })
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn get_workorder(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let lookup = id.clone();
    let detail = state
        .store
        .call::<_, _, EngineError>(move |db| {
            let Some(order) = db.get_order(&lookup)? else {
                return Ok(None);
            };
            let history = db.history_for(&lookup)?;
            let results = db.results_for(&lookup)?;
            Ok(Some(WorkOrderDetail {
                workorder: order,
                history,
                results,
            }))
        })
        .await?;
    match detail {
        Some(detail) => Ok(Json(detail)),
        None => Err(ApiError::NotFound(format!("workorder {} not found", id))),
    }
}

async fn list_workorders(
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(WorkOrderStatus::from_str)
        .transpose()
        .map_err(ApiError::BadRequest)?;
    let area_id = query.area_id;
    let orders = state
        .store
        .call::<_, _, EngineError>(move |db| Ok(db.list_orders(status, area_id.as_deref())?))
        .await?;
    Ok(Json(orders))
}

async fn post_action(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<ActionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = principal_from_headers(&headers)?;
    let action = WorkOrderAction::from_str(&req.action).map_err(ApiError::BadRequest)?;

    let outcome = state
        .engine
        .apply_action_with_retry(
            TransitionRequest {
                order_id: id,
                action,
                actor,
                note: req.note,
                payload: ActionPayload {
                    assignee_id: req.assignee_id,
                    result: req.result,
                    disposition: req.disposition,
                },
            },
            DEFAULT_RETRY_ATTEMPTS,
        )
        .await?;

    Ok(Json(TransitionResponse {
        version: outcome.order.version,
        event: outcome.event.kind(),
        workorder: outcome.order,
    }))
}

/// Overdue reporter confirmations with computed severity. Area supervisors
/// see their own area; monitoring and administrators see everything.
async fn list_overdue(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from_headers(&headers)?;
    let area_filter = match principal.role {
        Role::SystemAdmin | Role::MonitoringSupervisor => None,
        Role::AreaSupervisor => Some(principal.area_id.clone().ok_or_else(|| {
            ApiError::Forbidden("area supervisor principal carries no area".to_string())
        })?),
        _ => {
            return Err(ApiError::Forbidden(
                "insufficient role for the overdue listing".to_string(),
            ));
        }
    };

    let now = state.clock.now();
    let cutoff = now - chrono::Duration::hours(state.escalation.shortest_deadline());

    let candidates = state
        .store
        .call::<_, _, EngineError>(move |db| Ok(db.overdue_reporter_confirmations(cutoff)?))
        .await?;

    let overdue: Vec<OverdueWorkOrder> = candidates
        .into_iter()
        .filter(|order| {
            area_filter
                .as_deref()
                .is_none_or(|area| order.area_id == area)
        })
        .filter_map(|order| {
            let deadline = state.escalation.deadline_for(order.priority);
            let elapsed = (now - order.updated_at).num_hours();
            if elapsed < deadline {
                return None;
            }
            let severity = escalation::severity_for(elapsed, deadline, order.priority);
            Some(OverdueWorkOrder {
                workorder: order,
                timeout_hours: elapsed,
                severity,
            })
        })
        .collect();

    Ok(Json(overdue))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workorder::engine::test_support::{
        drive_to_reporter_confirm, harness, TestHarness,
    };
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app(h: &TestHarness) -> Router {
        let state = Arc::new(AppState {
            engine: h.engine.clone(),
            store: h.store.clone(),
            clock: h.clock.clone(),
            escalation: EscalationConfig::default(),
        });
        api_router().with_state(state)
    }

    fn json_request(method: &str, uri: &str, principal: Option<(&str, &str, Option<&str>)>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some((id, role, area)) = principal {
            builder = builder.header("x-actor-id", id).header("x-actor-role", role);
            if let Some(area) = area {
                builder = builder.header("x-actor-area", area);
            }
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness();
        let response = app(&h)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_requires_a_principal() {
        let h = harness();
        let request = json_request(
            "POST",
            "/api/workorders",
            None,
            serde_json::json!({"title": "Bank erosion", "area_id": "AREA-1"}),
        );
        let response = app(&h).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_and_fetch_workorder() {
        let h = harness();
        let request = json_request(
            "POST",
            "/api/workorders",
            Some(("patroller-1", "patroller", None)),
            serde_json::json!({"title": "Bank erosion", "area_id": "AREA-1"}),
        );
        let response = app(&h).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["status"], "pending_dispatch");
        assert_eq!(created["workflow_kind"], "manual");
        assert_eq!(created["initial_reporter_id"], "patroller-1");

        let id = created["id"].as_str().unwrap();
        let response = app(&h)
            .oneshot(
                Request::builder()
                    .uri(format!("/api/workorders/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let detail = body_json(response).await;
        assert_eq!(detail["workorder"]["id"], id);
        assert_eq!(detail["history"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_alarm_ingest_requires_monitoring_role() {
        let h = harness();
        let body = serde_json::json!({
            "alarm_id": "ALM-3", "title": "Litter raft", "area_id": "AREA-1"
        });

        let forbidden = json_request(
            "POST",
            "/api/alarms/ingest",
            Some(("patroller-1", "patroller", None)),
            body.clone(),
        );
        let response = app(&h).oneshot(forbidden).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let allowed = json_request(
            "POST",
            "/api/alarms/ingest",
            Some(("monitor-1", "monitoring_supervisor", None)),
            body,
        );
        let response = app(&h).oneshot(allowed).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["workflow_kind"], "ai_sourced");
        assert_eq!(created["alarm_id"], "ALM-3");
    }

    #[tokio::test]
    async fn test_action_endpoint_runs_the_transition_contract() {
        let h = harness();
        let order = h
            .engine
            .create_order(crate::workorder::engine::test_support::manual_draft())
            .await
            .unwrap();

        let request = json_request(
            "POST",
            &format!("/api/workorders/{}/actions", order.id),
            Some(("sup-1", "area_supervisor", Some("AREA-1"))),
            serde_json::json!({
                "action": "dispatch",
                "note": "routing to field crew",
                "assignee_id": "worker-1"
            }),
        );
        let response = app(&h).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["workorder"]["status"], "dispatched");
        assert_eq!(body["version"], 1);
        assert_eq!(body["event"], "order_dispatched");
    }

    #[tokio::test]
    async fn test_unknown_action_is_bad_request() {
        let h = harness();
        let order = h
            .engine
            .create_order(crate::workorder::engine::test_support::manual_draft())
            .await
            .unwrap();
        let request = json_request(
            "POST",
            &format!("/api/workorders/{}/actions", order.id),
            Some(("sup-1", "area_supervisor", Some("AREA-1"))),
            serde_json::json!({"action": "teleport"}),
        );
        let response = app(&h).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_permission_denial_maps_to_forbidden() {
        let h = harness();
        let order = h
            .engine
            .create_order(crate::workorder::engine::test_support::manual_draft())
            .await
            .unwrap();
        let request = json_request(
            "POST",
            &format!("/api/workorders/{}/actions", order.id),
            Some(("worker-1", "field_worker", None)),
            serde_json::json!({"action": "dispatch", "assignee_id": "worker-1"}),
        );
        let response = app(&h).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("field_worker"));
    }

    #[tokio::test]
    async fn test_illegal_transition_maps_to_conflict() {
        let h = harness();
        let order = h
            .engine
            .create_order(crate::workorder::engine::test_support::manual_draft())
            .await
            .unwrap();
        // start_processing straight from pending_dispatch
        let request = json_request(
            "POST",
            &format!("/api/workorders/{}/actions", order.id),
            Some(("worker-1", "field_worker", None)),
            serde_json::json!({"action": "start_processing"}),
        );
        let response = app(&h).oneshot(request).await.unwrap();
        // The field worker is not the assignee yet either, but the gate
        // runs first, so this is a 403; dispatch then cancel to exercise a
        // pure state conflict instead.
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let cancel = json_request(
            "POST",
            &format!("/api/workorders/{}/actions", order.id),
            Some(("admin-1", "system_admin", None)),
            serde_json::json!({"action": "cancel"}),
        );
        let response = app(&h).oneshot(cancel).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let again = json_request(
            "POST",
            &format!("/api/workorders/{}/actions", order.id),
            Some(("admin-1", "system_admin", None)),
            serde_json::json!({"action": "cancel"}),
        );
        let response = app(&h).oneshot(again).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let h = harness();
        h.engine
            .create_order(crate::workorder::engine::test_support::manual_draft())
            .await
            .unwrap();

        let response = app(&h)
            .oneshot(
                Request::builder()
                    .uri("/api/workorders?status=pending_dispatch")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

        let response = app(&h)
            .oneshot(
                Request::builder()
                    .uri("/api/workorders?status=bogus")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_overdue_listing_reports_severity_and_respects_area_scope() {
        let h = harness();
        drive_to_reporter_confirm(&h).await;
        h.clock.advance(chrono::Duration::hours(30));

        // The supervisor for AREA-1 sees the stalled order
        let response = app(&h)
            .oneshot(
                Request::builder()
                    .uri("/api/workorders/overdue")
                    .header("x-actor-id", "sup-1")
                    .header("x-actor-role", "area_supervisor")
                    .header("x-actor-area", "AREA-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let items = body.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["timeout_hours"], 30);
        assert_eq!(items[0]["severity"], "high");

        // A supervisor of a different area sees nothing
        let response = app(&h)
            .oneshot(
                Request::builder()
                    .uri("/api/workorders/overdue")
                    .header("x-actor-id", "sup-2")
                    .header("x-actor-role", "area_supervisor")
                    .header("x-actor-area", "AREA-2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 0);

        // A field worker may not see the listing at all
        let response = app(&h)
            .oneshot(
                Request::builder()
                    .uri("/api/workorders/overdue")
                    .header("x-actor-id", "worker-1")
                    .header("x-actor-role", "field_worker")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
