//! Status transitions and the gates evaluated when they happen.
//!
//! This is the entry point the surrounding CRUD layer calls when a task's
//! status changes. Two gates hang off it: the intercompany completion
//! block (checked before the write) and the onboarding release pass
//! (evaluated after an admin-classified onboarding task completes). Both
//! are idempotent, so redundant calls are harmless.

use crate::config::Config;
use crate::db::{Database, events, links, tasks};
use crate::error::{EngineError, EngineResult};
use crate::onboarding;
use crate::types::{Task, TaskType, status};
use tracing::debug;

/// Outcome of a status change.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub task: Task,
    /// Onboarding tasks released as a side effect, if any.
    pub released: usize,
}

/// Apply a status change to a task.
///
/// Completing an intercompany task is rejected while any client link is
/// unchecked; the status is left untouched and the conflict is signaled
/// to the caller.
pub fn set_task_status(
    db: &Database,
    task_id: i64,
    new_status: &str,
    actor: Option<i64>,
    config: &Config,
) -> EngineResult<StatusChange> {
    if new_status.trim().is_empty() {
        return Err(EngineError::missing_field("status"));
    }

    db.with_conn_mut(|conn| {
        let tx = conn.transaction()?;

        let task = tasks::get_task_internal(&tx, task_id)?
            .ok_or_else(|| EngineError::task_not_found(task_id))?;

        if status::is_completed(new_status) && task.is_intercompany {
            let open = links::incomplete_link_count(&tx, task_id)?;
            if open > 0 {
                return Err(EngineError::links_incomplete(task_id, open).into());
            }
        }

        tasks::set_status(&tx, task_id, new_status)?;
        events::record_status_event(&tx, task_id, new_status, actor, None)?;

        let mut released = 0;
        if task.task_type == TaskType::Onboarding
            && status::is_completed(new_status)
            && onboarding::task_is_admin_classified(&tx, &task, &config.phases)?
        {
            if let Some(client_id) = task.client_id {
                released = onboarding::release_if_ready_tx(&tx, client_id, config)?;
            }
        }

        let task = tasks::get_task_internal(&tx, task_id)?
            .ok_or_else(|| EngineError::task_not_found(task_id))?;
        tx.commit()?;

        debug!(task = task_id, status = new_status, released, "status changed");
        Ok(StatusChange { task, released })
    })
    .map_err(EngineError::from)
}
