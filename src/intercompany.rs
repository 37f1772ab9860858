//! Tasks spanning multiple clients with per-client sign-off.
//!
//! An intercompany task is anchored to one primary client and linked to at
//! least two clients. Each linked client checks off its own link; the
//! parent task cannot be completed while any link is open, and checking
//! the last link never completes the task on its own.

use crate::db::links::{insert_link, update_link_completion};
use crate::db::tasks::{TaskInsert, insert_task_row};
use crate::db::{Database, clients, tasks};
use crate::error::{EngineError, EngineResult};
use crate::types::{Task, TaskClientLink, TaskType, status};
use chrono::NaiveDate;
use tracing::info;

/// Input for creating an intercompany task.
#[derive(Debug, Clone, Default)]
pub struct NewIntercompanyTask {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub due_date: Option<NaiveDate>,
    /// The client the task is anchored to for display and ownership.
    pub primary_client_id: i64,
    /// All participating clients; at least two distinct ids.
    pub linked_client_ids: Vec<i64>,
    pub assigned_user_id: Option<i64>,
    pub task_type: Option<TaskType>,
    pub created_by_id: Option<i64>,
}

/// Create the task and its links atomically.
pub fn create_intercompany_task(db: &Database, input: NewIntercompanyTask) -> EngineResult<Task> {
    let mut linked = input.linked_client_ids.clone();
    linked.sort_unstable();
    linked.dedup();
    if linked.len() < 2 {
        return Err(EngineError::invalid_value(
            "linked_client_ids",
            "an intercompany task needs at least two distinct linked clients",
        ));
    }

    db.with_conn_mut(|conn| {
        let tx = conn.transaction()?;

        for client_id in std::iter::once(input.primary_client_id).chain(linked.iter().copied()) {
            if clients::get_client_internal(&tx, client_id)?.is_none() {
                return Err(EngineError::client_not_found(client_id).into());
            }
        }

        let task_id = insert_task_row(
            &tx,
            &TaskInsert {
                title: input.title.clone(),
                description: input.description.clone(),
                status: input.status.clone().unwrap_or_else(|| status::NEW.to_string()),
                due_date: input.due_date,
                assigned_user_id: input.assigned_user_id,
                client_id: Some(input.primary_client_id),
                task_type: input.task_type,
                is_intercompany: true,
                created_by_id: input.created_by_id,
                ..TaskInsert::default()
            },
        )?;

        for client_id in &linked {
            insert_link(&tx, task_id, *client_id)?;
        }

        let task = tasks::get_task_internal(&tx, task_id)?
            .ok_or_else(|| EngineError::task_not_found(task_id))?;
        tx.commit()?;

        info!(task = task_id, links = linked.len(), "intercompany task created");
        Ok(task)
    })
    .map_err(EngineError::from)
}

/// Record one linked client's sign-off (or retract it). Link completion
/// only removes the completion block on the parent task; it never changes
/// the task's own status.
pub fn set_link_completion(
    db: &Database,
    task_id: i64,
    client_id: i64,
    completed: bool,
    user_id: Option<i64>,
) -> EngineResult<TaskClientLink> {
    db.with_conn(|conn| {
        if tasks::get_task_internal(conn, task_id)?.is_none() {
            return Err(EngineError::task_not_found(task_id).into());
        }
        let link = update_link_completion(conn, task_id, client_id, completed, user_id)?
            .ok_or_else(|| EngineError::link_not_found(task_id, client_id))?;
        Ok(link)
    })
    .map_err(EngineError::from)
}
