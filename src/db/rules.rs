//! Recurring rule storage.

use super::clients::get_client_internal;
use super::{Database, date_from_sql, date_to_sql, now_ms, today};
use crate::calendar::{self, Anchor};
use crate::types::{CLIENT_FREQUENCY, RecurringRule, ScheduleType, status};
use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use rusqlite::{Connection, Row, params};

/// Input for creating a recurring rule.
#[derive(Debug, Clone, Default)]
pub struct NewRule {
    pub client_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    /// Schedule label; `client_frequency` is resolved against the owning
    /// client's bookkeeping frequency at creation time.
    pub schedule_type: String,
    pub day_of_month: Option<u32>,
    pub weekday: Option<u32>,
    pub week_of_month: Option<i32>,
    /// Explicit first due date. When unset it is computed as the first
    /// anchor resolution on or after `start` (default: today).
    pub next_run: Option<NaiveDate>,
    pub start: Option<NaiveDate>,
    pub default_status: Option<String>,
    pub assigned_user_id: Option<i64>,
}

/// Partial update for a rule. `None` leaves a field unchanged; the nested
/// `Option` clears nullable columns. The `next_run` cursor is not part of
/// this surface, only the calendar advance step moves it.
#[derive(Debug, Clone, Default)]
pub struct RuleUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub schedule_type: Option<String>,
    pub day_of_month: Option<Option<u32>>,
    pub weekday: Option<Option<u32>>,
    pub week_of_month: Option<Option<i32>>,
    pub default_status: Option<String>,
    pub assigned_user_id: Option<Option<i64>>,
}

pub(crate) fn parse_rule_row(row: &Row) -> rusqlite::Result<RecurringRule> {
    let schedule_type: String = row.get("schedule_type")?;
    let next_run: Option<String> = row.get("next_run")?;
    let day_of_month: Option<i64> = row.get("day_of_month")?;
    let weekday: Option<i64> = row.get("weekday")?;
    let week_of_month: Option<i64> = row.get("week_of_month")?;

    Ok(RecurringRule {
        id: row.get("id")?,
        client_id: row.get("client_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        schedule_type: ScheduleType::from_label(&schedule_type),
        day_of_month: day_of_month.map(|v| v as u32),
        weekday: weekday.map(|v| v as u32),
        week_of_month: week_of_month.map(|v| v as i32),
        // A malformed cursor reads as unset; the scheduler skips such rules.
        next_run: next_run.and_then(|s| date_from_sql(&s).ok()),
        default_status: row.get("default_status")?,
        assigned_user_id: row.get("assigned_user_id")?,
        active: row.get("active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn get_rule_internal(conn: &Connection, rule_id: i64) -> Result<Option<RecurringRule>> {
    let mut stmt = conn.prepare("SELECT * FROM recurring_rules WHERE id = ?1")?;
    match stmt.query_row(params![rule_id], parse_rule_row) {
        Ok(rule) => Ok(Some(rule)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Move the rule's cursor. Called only from the scheduler's advance step.
pub(crate) fn set_next_run(conn: &Connection, rule_id: i64, next_run: NaiveDate) -> Result<()> {
    conn.execute(
        "UPDATE recurring_rules SET next_run = ?1, updated_at = ?2 WHERE id = ?3",
        params![date_to_sql(next_run), now_ms(), rule_id],
    )?;
    Ok(())
}

/// Resolve a schedule label, consulting the owning client when the rule
/// follows the client's bookkeeping frequency.
fn resolve_schedule(conn: &Connection, label: &str, client_id: Option<i64>) -> Result<ScheduleType> {
    if !label.trim().eq_ignore_ascii_case(CLIENT_FREQUENCY) {
        return Ok(ScheduleType::from_label(label));
    }
    let frequency = client_id
        .map(|id| get_client_internal(conn, id))
        .transpose()?
        .flatten()
        .and_then(|c| c.bookkeeping_frequency);
    Ok(frequency
        .map(|f| ScheduleType::from_label(&f))
        .unwrap_or(ScheduleType::Monthly))
}

impl Database {
    /// Create a recurring rule. The first due date is taken verbatim when
    /// given, otherwise resolved on or after the start date.
    pub fn create_rule(&self, input: NewRule) -> Result<RecurringRule> {
        let now = now_ms();
        self.with_conn(|conn| {
            let schedule = resolve_schedule(conn, &input.schedule_type, input.client_id)?;
            let anchor = Anchor::from_fields(input.day_of_month, input.weekday, input.week_of_month);
            let next_run = input.next_run.unwrap_or_else(|| {
                calendar::next_on_or_after(schedule, input.start.unwrap_or_else(today), anchor)
            });
            let default_status = input.default_status.unwrap_or_else(|| status::NEW.to_string());

            conn.execute(
                "INSERT INTO recurring_rules (
                    client_id, name, description, schedule_type,
                    day_of_month, weekday, week_of_month, next_run,
                    default_status, assigned_user_id, active, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1, ?11, ?12)",
                params![
                    input.client_id,
                    &input.name,
                    &input.description,
                    schedule.as_str(),
                    input.day_of_month,
                    input.weekday,
                    input.week_of_month,
                    date_to_sql(next_run),
                    &default_status,
                    input.assigned_user_id,
                    now,
                    now,
                ],
            )?;

            Ok(RecurringRule {
                id: conn.last_insert_rowid(),
                client_id: input.client_id,
                name: input.name,
                description: input.description,
                schedule_type: schedule,
                day_of_month: input.day_of_month,
                weekday: input.weekday,
                week_of_month: input.week_of_month,
                next_run: Some(next_run),
                default_status,
                assigned_user_id: input.assigned_user_id,
                active: true,
                created_at: now,
                updated_at: now,
            })
        })
    }

    /// Get a rule by ID.
    pub fn get_rule(&self, rule_id: i64) -> Result<Option<RecurringRule>> {
        self.with_conn(|conn| get_rule_internal(conn, rule_id))
    }

    /// List rules, optionally restricted to one client, soonest first.
    pub fn list_rules(&self, client_id: Option<i64>) -> Result<Vec<RecurringRule>> {
        self.with_conn(|conn| {
            let rules = match client_id {
                Some(id) => {
                    let mut stmt = conn.prepare(
                        "SELECT * FROM recurring_rules WHERE client_id = ?1 ORDER BY next_run ASC",
                    )?;
                    let rules = stmt
                        .query_map(params![id], parse_rule_row)?
                        .collect::<Result<Vec<_>, _>>()?;
                    rules
                }
                None => {
                    let mut stmt =
                        conn.prepare("SELECT * FROM recurring_rules ORDER BY next_run ASC")?;
                    let rules = stmt
                        .query_map([], parse_rule_row)?
                        .collect::<Result<Vec<_>, _>>()?;
                    rules
                }
            };
            Ok(rules)
        })
    }

    /// All rules eligible for materialization.
    pub fn list_active_rules(&self) -> Result<Vec<RecurringRule>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM recurring_rules WHERE active = 1 ORDER BY id")?;
            let rules = stmt
                .query_map([], parse_rule_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rules)
        })
    }

    /// Apply a partial update to a rule.
    pub fn update_rule(&self, rule_id: i64, update: RuleUpdate) -> Result<RecurringRule> {
        self.with_conn(|conn| {
            let rule =
                get_rule_internal(conn, rule_id)?.ok_or_else(|| anyhow!("rule not found"))?;

            let name = update.name.unwrap_or(rule.name);
            let description = update.description.unwrap_or(rule.description);
            let schedule = update
                .schedule_type
                .map(|s| resolve_schedule(conn, &s, rule.client_id))
                .transpose()?
                .unwrap_or(rule.schedule_type);
            let day_of_month = update.day_of_month.unwrap_or(rule.day_of_month);
            let weekday = update.weekday.unwrap_or(rule.weekday);
            let week_of_month = update.week_of_month.unwrap_or(rule.week_of_month);
            let default_status = update.default_status.unwrap_or(rule.default_status);
            let assigned_user_id = update.assigned_user_id.unwrap_or(rule.assigned_user_id);
            let now = now_ms();

            conn.execute(
                "UPDATE recurring_rules SET
                    name = ?1, description = ?2, schedule_type = ?3,
                    day_of_month = ?4, weekday = ?5, week_of_month = ?6,
                    default_status = ?7, assigned_user_id = ?8, updated_at = ?9
                 WHERE id = ?10",
                params![
                    &name,
                    &description,
                    schedule.as_str(),
                    day_of_month,
                    weekday,
                    week_of_month,
                    &default_status,
                    assigned_user_id,
                    now,
                    rule_id,
                ],
            )?;

            Ok(RecurringRule {
                id: rule.id,
                client_id: rule.client_id,
                name,
                description,
                schedule_type: schedule,
                day_of_month,
                weekday,
                week_of_month,
                next_run: rule.next_run,
                default_status,
                assigned_user_id,
                active: rule.active,
                created_at: rule.created_at,
                updated_at: now,
            })
        })
    }

    /// Deactivate (or reactivate) a rule. Rules are never deleted by the
    /// engine; materialized history stays behind.
    pub fn set_rule_active(&self, rule_id: i64, active: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE recurring_rules SET active = ?1, updated_at = ?2 WHERE id = ?3",
                params![active, now_ms(), rule_id],
            )?;
            Ok(())
        })
    }
}
