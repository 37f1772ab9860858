//! Periodic materialization of tasks from recurring rules.
//!
//! The runner is invoked by an external timer but must be safe to call at
//! arbitrary times and repeatedly on the same day: the unique index on
//! (rule, due date) makes re-runs no-ops.

use crate::calendar;
use crate::config::Config;
use crate::db::tasks::{TaskInsert, insert_task_if_absent};
use crate::db::{self, Database, rules};
use crate::error::EngineResult;
use crate::types::{RunSummary, TaskType};
use chrono::NaiveDate;
use tracing::{debug, info, warn};

/// Materialize every due occurrence of every active rule, advancing each
/// rule's cursor past today. Mutations for one rule commit together, in
/// create-task-then-advance-cursor order, so a crash mid-run re-processes
/// an occurrence instead of skipping it.
pub fn run_once(db: &Database, config: &Config, today: Option<NaiveDate>) -> EngineResult<RunSummary> {
    let today = today.unwrap_or_else(db::today);
    let active = db.list_active_rules()?;

    let mut summary = RunSummary::default();

    for rule in active {
        let Some(mut next_run) = rule.next_run else {
            // Incomplete configuration, not an error.
            debug!(rule = rule.id, "rule has no next_run; skipping");
            continue;
        };
        let anchor = rule.anchor();

        db.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut iterations = 0u32;

            while next_run <= today {
                iterations += 1;
                if iterations > config.scheduler.runaway_limit {
                    warn!(
                        rule = rule.id,
                        limit = config.scheduler.runaway_limit,
                        "rule exceeded catch-up cap; deferring remainder to a later run"
                    );
                    summary.skipped_runaway += 1;
                    break;
                }

                let created = insert_task_if_absent(
                    &tx,
                    &TaskInsert {
                        title: rule.name.clone(),
                        description: rule.description.clone(),
                        status: rule.default_status.clone(),
                        due_date: Some(next_run),
                        assigned_user_id: rule.assigned_user_id,
                        client_id: rule.client_id,
                        recurring_rule_id: Some(rule.id),
                        task_type: Some(TaskType::Recurring),
                        ..TaskInsert::default()
                    },
                )?;
                if created {
                    summary.created += 1;
                }

                next_run = calendar::advance(rule.schedule_type, next_run, anchor);
                rules::set_next_run(&tx, rule.id, next_run)?;
                summary.advanced += 1;
            }

            tx.commit()?;
            Ok(())
        })?;
    }

    info!(
        %today,
        created = summary.created,
        advanced = summary.advanced,
        skipped_runaway = summary.skipped_runaway,
        "scheduler run complete"
    );

    Ok(summary)
}
