//! Per-client completion links for intercompany tasks.

use super::{Database, now_ms};
use crate::types::TaskClientLink;
use anyhow::Result;
use rusqlite::{Connection, Row, params};

pub(crate) fn parse_link_row(row: &Row) -> rusqlite::Result<TaskClientLink> {
    Ok(TaskClientLink {
        task_id: row.get("task_id")?,
        client_id: row.get("client_id")?,
        is_completed: row.get("is_completed")?,
        completed_at: row.get("completed_at")?,
        completed_by_id: row.get("completed_by_id")?,
        created_at: row.get("created_at")?,
    })
}

pub(crate) fn insert_link(conn: &Connection, task_id: i64, client_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO task_client_links (task_id, client_id, is_completed, created_at)
         VALUES (?1, ?2, 0, ?3)",
        params![task_id, client_id, now_ms()],
    )?;
    Ok(())
}

/// Number of links still awaiting sign-off.
pub(crate) fn incomplete_link_count(conn: &Connection, task_id: i64) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM task_client_links WHERE task_id = ?1 AND is_completed = 0",
        params![task_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Toggle one client's sign-off. Stamps completed_at/completed_by on set
/// and clears both on unset. Returns the updated link, or None when no
/// link exists for the pair.
pub(crate) fn update_link_completion(
    conn: &Connection,
    task_id: i64,
    client_id: i64,
    completed: bool,
    user_id: Option<i64>,
) -> Result<Option<TaskClientLink>> {
    let (completed_at, completed_by) = if completed {
        (Some(now_ms()), user_id)
    } else {
        (None, None)
    };
    let changed = conn.execute(
        "UPDATE task_client_links
         SET is_completed = ?1, completed_at = ?2, completed_by_id = ?3
         WHERE task_id = ?4 AND client_id = ?5",
        params![completed, completed_at, completed_by, task_id, client_id],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    let mut stmt = conn.prepare(
        "SELECT * FROM task_client_links WHERE task_id = ?1 AND client_id = ?2",
    )?;
    let link = stmt.query_row(params![task_id, client_id], parse_link_row)?;
    Ok(Some(link))
}

impl Database {
    /// All links for a task, by client id.
    pub fn list_task_links(&self, task_id: i64) -> Result<Vec<TaskClientLink>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM task_client_links WHERE task_id = ?1 ORDER BY client_id",
            )?;
            let links = stmt
                .query_map(params![task_id], parse_link_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(links)
        })
    }

    /// Whether every linked client has checked off the task.
    pub fn all_links_completed(&self, task_id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(incomplete_link_count(conn, task_id)? == 0))
    }
}
