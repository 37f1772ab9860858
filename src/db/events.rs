//! Append-only status history for tasks.
//!
//! Every status write lands a snapshot row here, inside the same
//! transaction as the change itself.

use super::{Database, now_ms};
use crate::types::TaskEvent;
use anyhow::Result;
use rusqlite::{Connection, params};

/// Record a status snapshot for a task.
pub(crate) fn record_status_event(
    conn: &Connection,
    task_id: i64,
    status: &str,
    user_id: Option<i64>,
    reason: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO task_events (task_id, user_id, status, reason, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![task_id, user_id, status, reason, now_ms()],
    )?;
    Ok(())
}

impl Database {
    /// Get the status history for a task, oldest first.
    pub fn get_task_events(&self, task_id: i64) -> Result<Vec<TaskEvent>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, task_id, user_id, status, reason, timestamp
                 FROM task_events
                 WHERE task_id = ?1
                 ORDER BY id ASC",
            )?;

            let events = stmt
                .query_map(params![task_id], |row| {
                    Ok(TaskEvent {
                        id: row.get(0)?,
                        task_id: row.get(1)?,
                        user_id: row.get(2)?,
                        status: row.get(3)?,
                        reason: row.get(4)?,
                        timestamp: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(events)
        })
    }
}
