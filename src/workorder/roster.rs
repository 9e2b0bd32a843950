//! Read-only personnel lookups.
//!
//! The gate validates dispatch nominations against a roster it does not
//! own, and the escalation sweep needs the supervising principal for an
//! order's area. Both are point reads; a failed lookup is reported as a
//! denial upstream, never a crash.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

use crate::workorder::models::Role;

#[derive(Debug, Error)]
#[error("roster lookup failed: {0}")]
pub struct RosterError(pub String);

pub trait RosterLookup: Send + Sync {
    /// Whether the user exists, is active, and holds the field-worker role.
    fn is_active_field_worker(&self, user_id: &str) -> Result<bool, RosterError>;

    /// The supervising user for a managed area, if one is on record.
    fn area_supervisor(&self, area_id: &str) -> Result<Option<String>, RosterError>;
}

/// Roster backed by the `users` and `managed_areas` tables in the sluice
/// database. Opens its own connection so lookups never contend with the
/// store's write lock.
pub struct SqliteRoster {
    conn: Mutex<Connection>,
}

impl SqliteRoster {
    pub fn open(path: &Path) -> Result<Self, RosterError> {
        let conn = Connection::open(path).map_err(|e| RosterError(e.to_string()))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(|e| RosterError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl RosterLookup for SqliteRoster {
    fn is_active_field_worker(&self, user_id: &str) -> Result<bool, RosterError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| RosterError("roster lock poisoned".to_string()))?;
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT role, status FROM users WHERE id = ?1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| RosterError(e.to_string()))?;
        Ok(match row {
            Some((role, status)) => {
                role == Role::FieldWorker.as_str() && status == "active"
            }
            None => false,
        })
    }

    fn area_supervisor(&self, area_id: &str) -> Result<Option<String>, RosterError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| RosterError("roster lock poisoned".to_string()))?;
        conn.query_row(
            "SELECT supervisor_id FROM managed_areas WHERE id = ?1",
            params![area_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| RosterError(e.to_string()))
    }
}

/// In-memory roster for tests and the one-shot CLI paths.
#[derive(Debug, Default)]
pub struct StaticRoster {
    field_workers: HashMap<String, bool>,
    supervisors: HashMap<String, String>,
}

impl StaticRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_worker(mut self, user_id: impl Into<String>, active: bool) -> Self {
        self.field_workers.insert(user_id.into(), active);
        self
    }

    pub fn with_area_supervisor(
        mut self,
        area_id: impl Into<String>,
        supervisor_id: impl Into<String>,
    ) -> Self {
        self.supervisors.insert(area_id.into(), supervisor_id.into());
        self
    }
}

impl RosterLookup for StaticRoster {
    fn is_active_field_worker(&self, user_id: &str) -> Result<bool, RosterError> {
        Ok(self.field_workers.get(user_id).copied().unwrap_or(false))
    }

    fn area_supervisor(&self, area_id: &str) -> Result<Option<String>, RosterError> {
        Ok(self.supervisors.get(area_id).cloned())
    }
}

/// A roster whose lookups always fail, for exercising the degraded path.
#[cfg(test)]
pub struct UnreachableRoster;

#[cfg(test)]
impl RosterLookup for UnreachableRoster {
    fn is_active_field_worker(&self, _user_id: &str) -> Result<bool, RosterError> {
        Err(RosterError("roster service unreachable".to_string()))
    }

    fn area_supervisor(&self, _area_id: &str) -> Result<Option<String>, RosterError> {
        Err(RosterError("roster service unreachable".to_string()))
    }
}
