//! SQLite persistence for workorders, their append-only status history, and
//! processing results.
//!
//! The store is the only component that touches these tables. Writes that
//! change an order's status go through [`WorkOrderDb::commit_transition`],
//! which performs a compare-and-swap on `version` and appends the history
//! row in the same transaction: either both land or neither does.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::StoreError;
use crate::workorder::models::{
    Priority, ProcessingResult, Role, StatusHistoryEntry, WorkOrder, WorkOrderAction,
    WorkOrderStatus, WorkflowKind,
};

/// Async-safe handle to the workorder database.
///
/// Wraps `WorkOrderDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, preventing synchronous SQLite
/// I/O from tying up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<WorkOrderDb>>,
}

impl DbHandle {
    pub fn new(db: WorkOrderDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`). The error type
    /// only needs a `From<StoreError>` impl, so engine closures can return
    /// domain errors directly.
    pub async fn call<F, R, E>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut WorkOrderDb) -> Result<R, E> + Send + 'static,
        R: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = db.lock().map_err(|_| E::from(StoreError::LockPoisoned))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| E::from(StoreError::TaskPanicked(e.to_string())))?
    }

    /// Acquire the database mutex synchronously. For startup initialization,
    /// one-shot CLI paths, and tests — not for hot async paths.
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, WorkOrderDb>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

pub struct WorkOrderDb {
    conn: Connection,
}

impl WorkOrderDb {
    /// Open (or create) a SQLite database at the given path and run
    /// migrations.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<(), StoreError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.run_migrations()?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS workorders (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                workflow_kind TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending_dispatch',
                priority TEXT NOT NULL DEFAULT 'normal',
                area_id TEXT NOT NULL,
                alarm_id TEXT,
                creator_id TEXT,
                initial_reporter_id TEXT,
                assignee_id TEXT,
                supervisor_id TEXT,
                reviewer_id TEXT,
                final_reviewer_id TEXT,
                timeout_intervener_id TEXT,
                processing_result_id TEXT,
                created_at TEXT NOT NULL,
                dispatched_at TEXT,
                started_at TEXT,
                submitted_at TEXT,
                reviewed_at TEXT,
                reporter_confirmed_at TEXT,
                completed_at TEXT,
                updated_at TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS workorder_status_history (
                id TEXT NOT NULL,
                workorder_id TEXT NOT NULL REFERENCES workorders(id) ON DELETE CASCADE,
                version INTEGER NOT NULL,
                from_status TEXT NOT NULL,
                to_status TEXT NOT NULL,
                action TEXT NOT NULL,
                actor_id TEXT NOT NULL,
                note TEXT NOT NULL DEFAULT '',
                occurred_at TEXT NOT NULL,
                PRIMARY KEY (workorder_id, version)
            );

            CREATE TABLE IF NOT EXISTS workorder_results (
                id TEXT PRIMARY KEY,
                workorder_id TEXT NOT NULL REFERENCES workorders(id) ON DELETE CASCADE,
                method TEXT NOT NULL,
                description TEXT NOT NULL,
                before_media TEXT NOT NULL DEFAULT '[]',
                after_media TEXT NOT NULL DEFAULT '[]',
                needs_follow_up INTEGER NOT NULL DEFAULT 0,
                follow_up_reason TEXT,
                submitted_by TEXT NOT NULL,
                submitted_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                role TEXT NOT NULL,
                area_id TEXT,
                status TEXT NOT NULL DEFAULT 'active'
            );

            CREATE TABLE IF NOT EXISTS managed_areas (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                supervisor_id TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_workorders_status ON workorders(status);
            CREATE INDEX IF NOT EXISTS idx_workorders_area ON workorders(area_id, status);
            CREATE INDEX IF NOT EXISTS idx_history_order ON workorder_status_history(workorder_id, version);
            CREATE INDEX IF NOT EXISTS idx_results_order ON workorder_results(workorder_id);
            ",
        )?;
        Ok(())
    }

    // ── WorkOrder CRUD ────────────────────────────────────────────────

    pub fn insert_order(&mut self, order: &WorkOrder) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO workorders (
                id, title, description, workflow_kind, status, priority, area_id,
                alarm_id, creator_id, initial_reporter_id, assignee_id, supervisor_id,
                reviewer_id, final_reviewer_id, timeout_intervener_id, processing_result_id,
                created_at, dispatched_at, started_at, submitted_at, reviewed_at,
                reporter_confirmed_at, completed_at, updated_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                      ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)",
            params![
                order.id,
                order.title,
                order.description,
                order.workflow_kind.as_str(),
                order.status.as_str(),
                order.priority.as_str(),
                order.area_id,
                order.alarm_id,
                order.creator_id,
                order.initial_reporter_id,
                order.assignee_id,
                order.supervisor_id,
                order.reviewer_id,
                order.final_reviewer_id,
                order.timeout_intervener_id,
                order.processing_result_id,
                encode_ts(order.created_at),
                order.dispatched_at.map(encode_ts),
                order.started_at.map(encode_ts),
                order.submitted_at.map(encode_ts),
                order.reviewed_at.map(encode_ts),
                order.reporter_confirmed_at.map(encode_ts),
                order.completed_at.map(encode_ts),
                encode_ts(order.updated_at),
                order.version,
            ],
        )?;
        Ok(())
    }

    pub fn get_order(&self, id: &str) -> Result<Option<WorkOrder>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM workorders WHERE id = ?1",
            ORDER_COLUMNS
        ))?;
        let row = stmt
            .query_row(params![id], OrderRow::from_row)
            .optional()?;
        row.map(OrderRow::into_order).transpose()
    }

    pub fn list_orders(
        &self,
        status: Option<WorkOrderStatus>,
        area_id: Option<&str>,
    ) -> Result<Vec<WorkOrder>, StoreError> {
        let mut sql = format!("SELECT {} FROM workorders", ORDER_COLUMNS);
        let mut clauses = Vec::new();
        let mut args: Vec<String> = Vec::new();
        if let Some(status) = status {
            args.push(status.as_str().to_string());
            clauses.push(format!("status = ?{}", args.len()));
        }
        if let Some(area) = area_id {
            args.push(area.to_string());
            clauses.push(format!("area_id = ?{}", args.len()));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), OrderRow::from_row)?;
        let mut orders = Vec::new();
        for row in rows {
            orders.push(row?.into_order()?);
        }
        Ok(orders)
    }

    /// All orders sitting in `PendingReporterConfirm` whose last transition
    /// happened before `cutoff`. `updated_at` is rewritten only by
    /// transitions, so for orders in this status it is exactly the time the
    /// status was entered.
    pub fn overdue_reporter_confirmations(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<WorkOrder>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM workorders
             WHERE status = ?1 AND updated_at < ?2
             ORDER BY updated_at ASC",
            ORDER_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![
                WorkOrderStatus::PendingReporterConfirm.as_str(),
                encode_ts(cutoff)
            ],
            OrderRow::from_row,
        )?;
        let mut orders = Vec::new();
        for row in rows {
            orders.push(row?.into_order()?);
        }
        Ok(orders)
    }

    // ── Transition commit (CAS) ───────────────────────────────────────

    /// Commit a transition: write the updated snapshot with a
    /// compare-and-swap on `version`, append the history row, and store the
    /// processing result if the action produced one — all in a single
    /// transaction.
    ///
    /// `order` must already carry the incremented version
    /// (`expected_version + 1`). A stale `expected_version` fails with
    /// [`StoreError::VersionConflict`] and leaves nothing written.
    pub fn commit_transition(
        &mut self,
        order: &WorkOrder,
        expected_version: i64,
        history: &StatusHistoryEntry,
        result: Option<&ProcessingResult>,
    ) -> Result<(), StoreError> {
        debug_assert_eq!(order.version, expected_version + 1);

        let tx = self.conn.transaction()?;

        let updated = tx.execute(
            "UPDATE workorders SET
                status = ?1, priority = ?2, assignee_id = ?3, supervisor_id = ?4,
                reviewer_id = ?5, final_reviewer_id = ?6, timeout_intervener_id = ?7,
                processing_result_id = ?8, dispatched_at = ?9, started_at = ?10,
                submitted_at = ?11, reviewed_at = ?12, reporter_confirmed_at = ?13,
                completed_at = ?14, updated_at = ?15, version = ?16
             WHERE id = ?17 AND version = ?18",
            params![
                order.status.as_str(),
                order.priority.as_str(),
                order.assignee_id,
                order.supervisor_id,
                order.reviewer_id,
                order.final_reviewer_id,
                order.timeout_intervener_id,
                order.processing_result_id,
                order.dispatched_at.map(encode_ts),
                order.started_at.map(encode_ts),
                order.submitted_at.map(encode_ts),
                order.reviewed_at.map(encode_ts),
                order.reporter_confirmed_at.map(encode_ts),
                order.completed_at.map(encode_ts),
                encode_ts(order.updated_at),
                order.version,
                order.id,
                expected_version,
            ],
        )?;

        if updated == 0 {
            // Distinguish a lost race from a missing row before giving up.
            let exists: Option<i64> = tx
                .query_row(
                    "SELECT version FROM workorders WHERE id = ?1",
                    params![order.id],
                    |row| row.get(0),
                )
                .optional()?;
            return match exists {
                Some(_) => Err(StoreError::VersionConflict {
                    id: order.id.clone(),
                    expected: expected_version,
                }),
                None => Err(StoreError::NotFound {
                    id: order.id.clone(),
                }),
            };
        }

        if let Some(result) = result {
            tx.execute(
                "INSERT INTO workorder_results (
                    id, workorder_id, method, description, before_media, after_media,
                    needs_follow_up, follow_up_reason, submitted_by, submitted_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    result.id,
                    result.workorder_id,
                    result.method,
                    result.description,
                    serde_json::to_string(&result.before_media).unwrap_or_else(|_| "[]".into()),
                    serde_json::to_string(&result.after_media).unwrap_or_else(|_| "[]".into()),
                    result.needs_follow_up,
                    result.follow_up_reason,
                    result.submitted_by,
                    encode_ts(result.submitted_at),
                ],
            )?;
        }

        tx.execute(
            "INSERT INTO workorder_status_history (
                id, workorder_id, version, from_status, to_status, action,
                actor_id, note, occurred_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                history.id,
                history.workorder_id,
                history.version,
                history.from_status.as_str(),
                history.to_status.as_str(),
                history.action.as_str(),
                history.actor_id,
                history.note,
                encode_ts(history.occurred_at),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    // ── History & results ─────────────────────────────────────────────

    /// The order's audit trail, strictly ordered by the version at which
    /// each row was written.
    pub fn history_for(&self, workorder_id: &str) -> Result<Vec<StatusHistoryEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, workorder_id, version, from_status, to_status, action,
                    actor_id, note, occurred_at
             FROM workorder_status_history
             WHERE workorder_id = ?1
             ORDER BY version ASC",
        )?;
        let rows = stmt.query_map(params![workorder_id], |row| {
            Ok(HistoryRow {
                id: row.get(0)?,
                workorder_id: row.get(1)?,
                version: row.get(2)?,
                from_status: row.get(3)?,
                to_status: row.get(4)?,
                action: row.get(5)?,
                actor_id: row.get(6)?,
                note: row.get(7)?,
                occurred_at: row.get(8)?,
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.into_entry()?);
        }
        Ok(entries)
    }

    pub fn get_result(&self, id: &str) -> Result<Option<ProcessingResult>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, workorder_id, method, description, before_media, after_media,
                    needs_follow_up, follow_up_reason, submitted_by, submitted_at
             FROM workorder_results WHERE id = ?1",
        )?;
        let row = stmt.query_row(params![id], ResultRow::from_row).optional()?;
        row.map(ResultRow::into_result).transpose()
    }

    /// All results submitted for an order, oldest first — one per
    /// processing cycle.
    pub fn results_for(&self, workorder_id: &str) -> Result<Vec<ProcessingResult>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, workorder_id, method, description, before_media, after_media,
                    needs_follow_up, follow_up_reason, submitted_by, submitted_at
             FROM workorder_results WHERE workorder_id = ?1
             ORDER BY submitted_at ASC",
        )?;
        let rows = stmt.query_map(params![workorder_id], ResultRow::from_row)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?.into_result()?);
        }
        Ok(results)
    }

    // ── Roster tables ─────────────────────────────────────────────────
    // The store owns the file; the read-only roster view in `roster.rs`
    // opens its own connection against these tables.

    pub fn upsert_user(
        &mut self,
        id: &str,
        name: &str,
        role: Role,
        area_id: Option<&str>,
        active: bool,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO users (id, name, role, area_id, status)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name, role = excluded.role,
                area_id = excluded.area_id, status = excluded.status",
            params![
                id,
                name,
                role.as_str(),
                area_id,
                if active { "active" } else { "inactive" }
            ],
        )?;
        Ok(())
    }

    pub fn upsert_area(
        &mut self,
        id: &str,
        name: &str,
        supervisor_id: Option<&str>,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO managed_areas (id, name, supervisor_id)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name, supervisor_id = excluded.supervisor_id",
            params![id, name, supervisor_id],
        )?;
        Ok(())
    }
}

// ── Row mapping ───────────────────────────────────────────────────────

const ORDER_COLUMNS: &str = "id, title, description, workflow_kind, status, priority, area_id, \
     alarm_id, creator_id, initial_reporter_id, assignee_id, supervisor_id, \
     reviewer_id, final_reviewer_id, timeout_intervener_id, processing_result_id, \
     created_at, dispatched_at, started_at, submitted_at, reviewed_at, \
     reporter_confirmed_at, completed_at, updated_at, version";

/// Raw row before enum/timestamp decoding. Decoding failures surface as
/// [`StoreError::InvalidColumn`] rather than panics: a corrupt row is an
/// operational problem, not a programming error.
struct OrderRow {
    id: String,
    title: String,
    description: String,
    workflow_kind: String,
    status: String,
    priority: String,
    area_id: String,
    alarm_id: Option<String>,
    creator_id: Option<String>,
    initial_reporter_id: Option<String>,
    assignee_id: Option<String>,
    supervisor_id: Option<String>,
    reviewer_id: Option<String>,
    final_reviewer_id: Option<String>,
    timeout_intervener_id: Option<String>,
    processing_result_id: Option<String>,
    created_at: String,
    dispatched_at: Option<String>,
    started_at: Option<String>,
    submitted_at: Option<String>,
    reviewed_at: Option<String>,
    reporter_confirmed_at: Option<String>,
    completed_at: Option<String>,
    updated_at: String,
    version: i64,
}

impl OrderRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            workflow_kind: row.get(3)?,
            status: row.get(4)?,
            priority: row.get(5)?,
            area_id: row.get(6)?,
            alarm_id: row.get(7)?,
            creator_id: row.get(8)?,
            initial_reporter_id: row.get(9)?,
            assignee_id: row.get(10)?,
            supervisor_id: row.get(11)?,
            reviewer_id: row.get(12)?,
            final_reviewer_id: row.get(13)?,
            timeout_intervener_id: row.get(14)?,
            processing_result_id: row.get(15)?,
            created_at: row.get(16)?,
            dispatched_at: row.get(17)?,
            started_at: row.get(18)?,
            submitted_at: row.get(19)?,
            reviewed_at: row.get(20)?,
            reporter_confirmed_at: row.get(21)?,
            completed_at: row.get(22)?,
            updated_at: row.get(23)?,
            version: row.get(24)?,
        })
    }

    fn into_order(self) -> Result<WorkOrder, StoreError> {
        Ok(WorkOrder {
            workflow_kind: parse_enum::<WorkflowKind>("workflow_kind", &self.workflow_kind)?,
            status: parse_enum::<WorkOrderStatus>("status", &self.status)?,
            priority: parse_enum::<Priority>("priority", &self.priority)?,
            created_at: decode_ts("created_at", &self.created_at)?,
            dispatched_at: decode_opt_ts("dispatched_at", self.dispatched_at)?,
            started_at: decode_opt_ts("started_at", self.started_at)?,
            submitted_at: decode_opt_ts("submitted_at", self.submitted_at)?,
            reviewed_at: decode_opt_ts("reviewed_at", self.reviewed_at)?,
            reporter_confirmed_at: decode_opt_ts(
                "reporter_confirmed_at",
                self.reporter_confirmed_at,
            )?,
            completed_at: decode_opt_ts("completed_at", self.completed_at)?,
            updated_at: decode_ts("updated_at", &self.updated_at)?,
            id: self.id,
            title: self.title,
            description: self.description,
            area_id: self.area_id,
            alarm_id: self.alarm_id,
            creator_id: self.creator_id,
            initial_reporter_id: self.initial_reporter_id,
            assignee_id: self.assignee_id,
            supervisor_id: self.supervisor_id,
            reviewer_id: self.reviewer_id,
            final_reviewer_id: self.final_reviewer_id,
            timeout_intervener_id: self.timeout_intervener_id,
            processing_result_id: self.processing_result_id,
            version: self.version,
        })
    }
}

struct HistoryRow {
    id: String,
    workorder_id: String,
    version: i64,
    from_status: String,
    to_status: String,
    action: String,
    actor_id: String,
    note: String,
    occurred_at: String,
}

impl HistoryRow {
    fn into_entry(self) -> Result<StatusHistoryEntry, StoreError> {
        Ok(StatusHistoryEntry {
            from_status: parse_enum::<WorkOrderStatus>("from_status", &self.from_status)?,
            to_status: parse_enum::<WorkOrderStatus>("to_status", &self.to_status)?,
            action: parse_enum::<WorkOrderAction>("action", &self.action)?,
            occurred_at: decode_ts("occurred_at", &self.occurred_at)?,
            id: self.id,
            workorder_id: self.workorder_id,
            version: self.version,
            actor_id: self.actor_id,
            note: self.note,
        })
    }
}

struct ResultRow {
    id: String,
    workorder_id: String,
    method: String,
    description: String,
    before_media: String,
    after_media: String,
    needs_follow_up: bool,
    follow_up_reason: Option<String>,
    submitted_by: String,
    submitted_at: String,
}

impl ResultRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            workorder_id: row.get(1)?,
            method: row.get(2)?,
            description: row.get(3)?,
            before_media: row.get(4)?,
            after_media: row.get(5)?,
            needs_follow_up: row.get(6)?,
            follow_up_reason: row.get(7)?,
            submitted_by: row.get(8)?,
            submitted_at: row.get(9)?,
        })
    }

    fn into_result(self) -> Result<ProcessingResult, StoreError> {
        let before_media = serde_json::from_str(&self.before_media).map_err(|_| {
            StoreError::InvalidColumn {
                field: "before_media",
                value: self.before_media.clone(),
            }
        })?;
        let after_media = serde_json::from_str(&self.after_media).map_err(|_| {
            StoreError::InvalidColumn {
                field: "after_media",
                value: self.after_media.clone(),
            }
        })?;
        Ok(ProcessingResult {
            before_media,
            after_media,
            submitted_at: decode_ts("submitted_at", &self.submitted_at)?,
            id: self.id,
            workorder_id: self.workorder_id,
            method: self.method,
            description: self.description,
            needs_follow_up: self.needs_follow_up,
            follow_up_reason: self.follow_up_reason,
            submitted_by: self.submitted_by,
        })
    }
}

fn parse_enum<T: std::str::FromStr<Err = String>>(
    field: &'static str,
    value: &str,
) -> Result<T, StoreError> {
    value.parse().map_err(|_| StoreError::InvalidColumn {
        field,
        value: value.to_string(),
    })
}

// Uniform sub-second precision keeps the stored strings lexicographically
// ordered, which the overdue query's `<` comparison relies on.
fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_ts(field: &'static str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::InvalidColumn {
            field,
            value: value.to_string(),
        })
}

fn decode_opt_ts(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    value.map(|v| decode_ts(field, &v)).transpose()
}
