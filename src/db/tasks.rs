//! Task storage and read surface.

use super::events::record_status_event;
use super::{Database, date_from_sql, date_to_sql, now_ms};
use crate::types::{DashboardBuckets, Task, TaskType, status};
use anyhow::Result;
use chrono::{Duration, NaiveDate};
use rusqlite::{Connection, Row, params};

pub(crate) fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let task_type: String = row.get("task_type")?;
    let due_date: Option<String> = row.get("due_date")?;

    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status: row.get("status")?,
        due_date: due_date.and_then(|s| date_from_sql(&s).ok()),
        assigned_user_id: row.get("assigned_user_id")?,
        client_id: row.get("client_id")?,
        recurring_rule_id: row.get("recurring_rule_id")?,
        template_task_id: row.get("template_task_id")?,
        task_type: TaskType::from_str(&task_type).unwrap_or(TaskType::AdHoc),
        onboarding_phase: row.get("onboarding_phase")?,
        is_intercompany: row.get("is_intercompany")?,
        created_by_id: row.get("created_by_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn get_task_internal(conn: &Connection, task_id: i64) -> Result<Option<Task>> {
    let mut stmt = conn.prepare("SELECT * FROM tasks WHERE id = ?1")?;
    match stmt.query_row(params![task_id], parse_task_row) {
        Ok(task) => Ok(Some(task)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Column values for one task insert. Creation paths (scheduler,
/// onboarding, intercompany, ad hoc) differ only in which fields they set.
#[derive(Debug, Clone, Default)]
pub(crate) struct TaskInsert {
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub due_date: Option<NaiveDate>,
    pub assigned_user_id: Option<i64>,
    pub client_id: Option<i64>,
    pub recurring_rule_id: Option<i64>,
    pub template_task_id: Option<i64>,
    pub task_type: Option<TaskType>,
    pub onboarding_phase: Option<String>,
    pub is_intercompany: bool,
    pub created_by_id: Option<i64>,
}

const INSERT_COLUMNS: &str = "title, description, status, due_date, assigned_user_id, client_id,
     recurring_rule_id, template_task_id, task_type, onboarding_phase,
     is_intercompany, created_by_id, created_at, updated_at";

/// Insert a task row and record its initial status snapshot.
pub(crate) fn insert_task_row(conn: &Connection, insert: &TaskInsert) -> Result<i64> {
    let now = now_ms();
    conn.execute(
        &format!(
            "INSERT INTO tasks ({INSERT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        ),
        params![
            &insert.title,
            &insert.description,
            &insert.status,
            insert.due_date.map(date_to_sql),
            insert.assigned_user_id,
            insert.client_id,
            insert.recurring_rule_id,
            insert.template_task_id,
            insert.task_type.unwrap_or(TaskType::AdHoc).as_str(),
            &insert.onboarding_phase,
            insert.is_intercompany,
            insert.created_by_id,
            now,
            now,
        ],
    )?;
    let task_id = conn.last_insert_rowid();
    record_status_event(conn, task_id, &insert.status, insert.created_by_id, None)?;
    Ok(task_id)
}

/// Insert a materialized occurrence unless one already exists for the same
/// (rule, due date). `INSERT OR IGNORE` makes the unique index, not the
/// pre-check, the authority under overlapping runs.
pub(crate) fn insert_task_if_absent(conn: &Connection, insert: &TaskInsert) -> Result<bool> {
    let now = now_ms();
    let changed = conn.execute(
        &format!(
            "INSERT OR IGNORE INTO tasks ({INSERT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        ),
        params![
            &insert.title,
            &insert.description,
            &insert.status,
            insert.due_date.map(date_to_sql),
            insert.assigned_user_id,
            insert.client_id,
            insert.recurring_rule_id,
            insert.template_task_id,
            insert.task_type.unwrap_or(TaskType::AdHoc).as_str(),
            &insert.onboarding_phase,
            insert.is_intercompany,
            insert.created_by_id,
            now,
            now,
        ],
    )?;
    if changed > 0 {
        let task_id = conn.last_insert_rowid();
        record_status_event(conn, task_id, &insert.status, insert.created_by_id, None)?;
    }
    Ok(changed > 0)
}

/// Whether a template has already been materialized for a client.
pub(crate) fn exists_for_template(
    conn: &Connection,
    client_id: i64,
    template_id: i64,
) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tasks WHERE client_id = ?1 AND template_task_id = ?2",
        params![client_id, template_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// All onboarding tasks for a client, ordered by id.
pub(crate) fn onboarding_tasks(conn: &Connection, client_id: i64) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM tasks
         WHERE client_id = ?1 AND task_type = 'onboarding'
         ORDER BY id",
    )?;
    let tasks = stmt
        .query_map(params![client_id], parse_task_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tasks)
}

pub(crate) fn set_status(conn: &Connection, task_id: i64, new_status: &str) -> Result<()> {
    conn.execute(
        "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![new_status, now_ms(), task_id],
    )?;
    Ok(())
}

pub(crate) fn set_status_and_assignee(
    conn: &Connection,
    task_id: i64,
    new_status: &str,
    assigned_user_id: Option<i64>,
) -> Result<()> {
    conn.execute(
        "UPDATE tasks SET status = ?1, assigned_user_id = ?2, updated_at = ?3 WHERE id = ?4",
        params![new_status, assigned_user_id, now_ms(), task_id],
    )?;
    Ok(())
}

/// Input for creating a task directly (ad hoc or project work).
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub assigned_user_id: Option<i64>,
    pub client_id: Option<i64>,
    pub task_type: Option<TaskType>,
    pub created_by_id: Option<i64>,
}

/// Assignee filter; unassigned is a valid, queryable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssigneeFilter {
    User(i64),
    Unassigned,
}

/// Filters for the task list surface. All fields are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub client_id: Option<i64>,
    pub status: Option<String>,
    pub assigned: Option<AssigneeFilter>,
    pub task_type: Option<TaskType>,
}

impl Database {
    /// Create an ad hoc task.
    pub fn create_task(&self, input: NewTask) -> Result<Task> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let task_id = insert_task_row(
                &tx,
                &TaskInsert {
                    title: input.title.clone(),
                    description: input.description.clone(),
                    status: input.status.clone().unwrap_or_else(|| status::NEW.to_string()),
                    due_date: input.due_date,
                    assigned_user_id: input.assigned_user_id,
                    client_id: input.client_id,
                    task_type: input.task_type,
                    created_by_id: input.created_by_id,
                    ..TaskInsert::default()
                },
            )?;
            let task = get_task_internal(&tx, task_id)?
                .ok_or_else(|| anyhow::anyhow!("task vanished after insert"))?;
            tx.commit()?;
            Ok(task)
        })
    }

    /// Get a task by ID.
    pub fn get_task(&self, task_id: i64) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, task_id))
    }

    /// List tasks matching the filter, newest first.
    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let mut sql = String::from("SELECT * FROM tasks WHERE 1=1");
            let mut param_values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(client_id) = filter.client_id {
                sql.push_str(&format!(" AND client_id = ?{}", param_values.len() + 1));
                param_values.push(Box::new(client_id));
            }

            if let Some(ref st) = filter.status {
                sql.push_str(&format!(" AND status = ?{}", param_values.len() + 1));
                param_values.push(Box::new(st.clone()));
            }

            match filter.assigned {
                Some(AssigneeFilter::User(user_id)) => {
                    sql.push_str(&format!(" AND assigned_user_id = ?{}", param_values.len() + 1));
                    param_values.push(Box::new(user_id));
                }
                Some(AssigneeFilter::Unassigned) => {
                    sql.push_str(" AND assigned_user_id IS NULL");
                }
                None => {}
            }

            if let Some(task_type) = filter.task_type {
                sql.push_str(&format!(" AND task_type = ?{}", param_values.len() + 1));
                param_values.push(Box::new(task_type.as_str().to_string()));
            }

            sql.push_str(" ORDER BY created_at DESC, id DESC");

            let mut stmt = conn.prepare(&sql)?;
            let param_refs: Vec<&dyn rusqlite::ToSql> =
                param_values.iter().map(|b| b.as_ref()).collect();

            let tasks = stmt
                .query_map(param_refs.as_slice(), parse_task_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(tasks)
        })
    }

    /// Delete a task. Deletion is a CRUD-layer concern; the engine never
    /// calls this itself.
    pub fn delete_task(&self, task_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM task_events WHERE task_id = ?1", params![task_id])?;
            conn.execute(
                "DELETE FROM task_client_links WHERE task_id = ?1",
                params![task_id],
            )?;
            let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            Ok(changed > 0)
        })
    }

    /// Group one user's open tasks for the dashboard view: overdue, due
    /// today, due in the next seven days, and waiting on the client.
    pub fn dashboard_for_user(&self, user_id: i64, today: NaiveDate) -> Result<DashboardBuckets> {
        self.with_conn(|conn| {
            let today_sql = date_to_sql(today);
            let horizon_sql = date_to_sql(today + Duration::days(7));

            let open_by_due = "assigned_user_id = ?1 AND due_date IS NOT NULL
                 AND status != 'completed' AND status != 'waiting_on_client'";

            let mut stmt = conn.prepare(&format!(
                "SELECT * FROM tasks WHERE {open_by_due} AND due_date < ?2 ORDER BY due_date ASC"
            ))?;
            let overdue = stmt
                .query_map(params![user_id, &today_sql], parse_task_row)?
                .collect::<Result<Vec<_>, _>>()?;

            let mut stmt = conn.prepare(&format!(
                "SELECT * FROM tasks WHERE {open_by_due} AND due_date = ?2 ORDER BY created_at ASC"
            ))?;
            let due_today = stmt
                .query_map(params![user_id, &today_sql], parse_task_row)?
                .collect::<Result<Vec<_>, _>>()?;

            let mut stmt = conn.prepare(&format!(
                "SELECT * FROM tasks WHERE {open_by_due} AND due_date > ?2 AND due_date <= ?3
                 ORDER BY due_date ASC"
            ))?;
            let upcoming = stmt
                .query_map(params![user_id, &today_sql, &horizon_sql], parse_task_row)?
                .collect::<Result<Vec<_>, _>>()?;

            let mut stmt = conn.prepare(
                "SELECT * FROM tasks
                 WHERE assigned_user_id = ?1 AND status = 'waiting_on_client'
                 ORDER BY due_date ASC",
            )?;
            let waiting_on_client = stmt
                .query_map(params![user_id], parse_task_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(DashboardBuckets {
                overdue,
                due_today,
                upcoming,
                waiting_on_client,
            })
        })
    }
}
