//! Onboarding materialization and the admin-completion dependency gate.
//!
//! Template-derived tasks start `blocked` unless their template is
//! admin-classified; once every admin-classified onboarding task for a
//! client is completed, the blocked remainder is released in one pass.
//! There is no transition back to `blocked`.

use crate::assignment::resolve_assignee;
use crate::config::{Config, PhaseClass, PhasesConfig};
use crate::db::tasks::{TaskInsert, exists_for_template, insert_task_row};
use crate::db::{Database, clients, date_from_ms, events, tasks, templates};
use crate::error::{EngineError, EngineResult};
use crate::types::{Role, Task, status};
use anyhow::Result;
use chrono::Duration;
use rusqlite::Connection;
use tracing::{debug, info};

/// Whether a role/phase pair gates the release of blocked peers.
pub fn is_admin_classified(role: Option<Role>, phase: Option<&str>, phases: &PhasesConfig) -> bool {
    matches!(role, Some(Role::Admin))
        || phase.is_some_and(|p| phases.classify(p) == PhaseClass::Admin)
}

/// Create onboarding tasks for a client from the active templates.
///
/// Idempotent per (client, template): re-running only creates tasks for
/// templates not yet represented, so intake conversion and a later
/// backfill can both call it safely. Returns the tasks created this call.
pub fn materialize_for_client(
    db: &Database,
    client_id: i64,
    created_by: Option<i64>,
    config: &Config,
) -> EngineResult<Vec<Task>> {
    db.with_conn_mut(|conn| {
        let tx = conn.transaction()?;

        let client = clients::get_client_internal(&tx, client_id)?
            .ok_or_else(|| EngineError::client_not_found(client_id))?;
        let base_date = date_from_ms(client.created_at);

        let mut created = Vec::new();
        for template in templates::list_active_internal(&tx)? {
            if exists_for_template(&tx, client_id, template.id)? {
                continue;
            }

            let admin = is_admin_classified(
                template.default_assigned_role,
                template.phase.as_deref(),
                &config.phases,
            );
            let assignee = resolve_assignee(
                &tx,
                template.default_assigned_role,
                template.phase.as_deref(),
                &client,
                created_by,
                &config.phases,
            )?;
            let due_date = template
                .default_due_offset_days
                .map(|days| base_date + Duration::days(days));

            let task_id = insert_task_row(
                &tx,
                &TaskInsert {
                    title: template.name.clone(),
                    description: template.description.clone(),
                    status: if admin { status::NEW } else { status::BLOCKED }.to_string(),
                    due_date,
                    assigned_user_id: assignee,
                    client_id: Some(client_id),
                    template_task_id: Some(template.id),
                    task_type: Some(crate::types::TaskType::Onboarding),
                    onboarding_phase: template.phase.clone(),
                    created_by_id: created_by,
                    ..TaskInsert::default()
                },
            )?;
            if let Some(task) = tasks::get_task_internal(&tx, task_id)? {
                created.push(task);
            }
        }

        tx.commit()?;
        info!(client = client_id, created = created.len(), "onboarding materialized");
        Ok(created)
    })
    .map_err(EngineError::from)
}

/// Release the client's blocked onboarding tasks if every admin-classified
/// onboarding task is completed (vacuously satisfied with zero admin
/// tasks). Returns the number of tasks released. Safe to invoke
/// redundantly: released tasks leave the blocked set by status.
pub fn release_if_ready(db: &Database, client_id: i64, config: &Config) -> EngineResult<usize> {
    db.with_conn_mut(|conn| {
        let tx = conn.transaction()?;
        let released = release_if_ready_tx(&tx, client_id, config)?;
        tx.commit()?;
        Ok(released)
    })
    .map_err(EngineError::from)
}

/// The read-check-release pass, run inside the caller's transaction so two
/// simultaneous admin-task completions cannot lose updates.
pub(crate) fn release_if_ready_tx(
    conn: &Connection,
    client_id: i64,
    config: &Config,
) -> Result<usize> {
    let onboarding = tasks::onboarding_tasks(conn, client_id)?;

    let mut admin_total = 0usize;
    let mut admin_open = 0usize;
    for task in &onboarding {
        if task_is_admin_classified(conn, task, &config.phases)? {
            admin_total += 1;
            if !status::is_completed(&task.status) {
                admin_open += 1;
            }
        }
    }
    if admin_open > 0 {
        debug!(
            client = client_id,
            open = admin_open,
            total = admin_total,
            "admin onboarding tasks still open; nothing released"
        );
        return Ok(0);
    }

    let blocked: Vec<&Task> = onboarding
        .iter()
        .filter(|t| status::is_blocked(&t.status))
        .collect();
    if blocked.is_empty() {
        return Ok(0);
    }

    let client = clients::get_client_internal(conn, client_id)?
        .ok_or_else(|| EngineError::client_not_found(client_id))?;

    for task in &blocked {
        let assignee = match task.assigned_user_id {
            Some(id) => Some(id),
            None => {
                // Lazy assignment at release time, from the originating
                // template's role/phase.
                let template = task
                    .template_task_id
                    .map(|id| templates::get_template_internal(conn, id))
                    .transpose()?
                    .flatten();
                resolve_assignee(
                    conn,
                    template.as_ref().and_then(|t| t.default_assigned_role),
                    task.onboarding_phase.as_deref(),
                    &client,
                    task.created_by_id,
                    &config.phases,
                )?
            }
        };
        tasks::set_status_and_assignee(conn, task.id, status::NEW, assignee)?;
        events::record_status_event(conn, task.id, status::NEW, None, Some("onboarding released"))?;
    }

    info!(client = client_id, released = blocked.len(), "blocked onboarding tasks released");
    Ok(blocked.len())
}

/// Classify a generated task via its template; tasks whose template row is
/// missing fall back to their recorded phase label.
pub(crate) fn task_is_admin_classified(
    conn: &Connection,
    task: &Task,
    phases: &PhasesConfig,
) -> Result<bool> {
    let template = task
        .template_task_id
        .map(|id| templates::get_template_internal(conn, id))
        .transpose()?
        .flatten();
    let role = template.as_ref().and_then(|t| t.default_assigned_role);
    let phase = template
        .as_ref()
        .and_then(|t| t.phase.as_deref())
        .or(task.onboarding_phase.as_deref());
    Ok(is_admin_classified(role, phase, phases))
}
