//! Integration tests for the scheduler runner.
//!
//! These verify idempotent materialization against an in-memory SQLite
//! database: re-runs are no-ops, catch-up creates one task per missed
//! cycle, and misconfigured rules hit the runaway cap instead of looping.

use chrono::NaiveDate;
use ledgerdesk::config::Config;
use ledgerdesk::db::Database;
use ledgerdesk::db::rules::NewRule;
use ledgerdesk::db::tasks::TaskFilter;
use ledgerdesk::scheduler;
use ledgerdesk::types::{ScheduleType, TaskType};
use rusqlite::params;

/// Helper to create a fresh in-memory database for testing.
fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn monthly_rule(db: &Database, next_run: NaiveDate, day_of_month: u32) -> i64 {
    db.create_rule(NewRule {
        name: "Monthly close".to_string(),
        schedule_type: "monthly".to_string(),
        day_of_month: Some(day_of_month),
        next_run: Some(next_run),
        ..NewRule::default()
    })
    .unwrap()
    .id
}

fn recurring_tasks(db: &Database) -> Vec<ledgerdesk::types::Task> {
    let mut tasks = db
        .list_tasks(&TaskFilter {
            task_type: Some(TaskType::Recurring),
            ..TaskFilter::default()
        })
        .unwrap();
    tasks.sort_by_key(|t| t.due_date);
    tasks
}

#[test]
fn run_materializes_due_occurrence_and_advances_cursor() {
    let db = setup_db();
    let config = Config::default();
    let rule_id = monthly_rule(&db, d(2025, 3, 15), 15);

    let summary = scheduler::run_once(&db, &config, Some(d(2025, 3, 20))).unwrap();

    assert_eq!(summary.created, 1);
    assert_eq!(summary.advanced, 1);
    assert_eq!(summary.skipped_runaway, 0);

    let tasks = recurring_tasks(&db);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].due_date, Some(d(2025, 3, 15)));
    assert_eq!(tasks[0].recurring_rule_id, Some(rule_id));

    let rule = db.get_rule(rule_id).unwrap().unwrap();
    assert_eq!(rule.next_run, Some(d(2025, 4, 15)));
}

#[test]
fn running_twice_creates_nothing_new() {
    let db = setup_db();
    let config = Config::default();
    monthly_rule(&db, d(2025, 3, 15), 15);

    let first = scheduler::run_once(&db, &config, Some(d(2025, 3, 20))).unwrap();
    let second = scheduler::run_once(&db, &config, Some(d(2025, 3, 20))).unwrap();

    assert_eq!(first.created, 1);
    assert_eq!(second.created, 0);
    assert_eq!(second.advanced, 0);
    assert_eq!(recurring_tasks(&db).len(), 1);
}

#[test]
fn catch_up_creates_one_task_per_missed_cycle() {
    let db = setup_db();
    let config = Config::default();
    let rule_id = monthly_rule(&db, d(2025, 1, 31), 31);

    let summary = scheduler::run_once(&db, &config, Some(d(2025, 4, 30))).unwrap();

    assert_eq!(summary.created, 4);
    assert_eq!(summary.advanced, 4);

    let due_dates: Vec<_> = recurring_tasks(&db).iter().map(|t| t.due_date).collect();
    assert_eq!(
        due_dates,
        vec![
            Some(d(2025, 1, 31)),
            Some(d(2025, 2, 28)),
            Some(d(2025, 3, 31)),
            Some(d(2025, 4, 30)),
        ]
    );

    // Cursor lands on the first future occurrence.
    let rule = db.get_rule(rule_id).unwrap().unwrap();
    assert_eq!(rule.next_run, Some(d(2025, 5, 31)));
}

#[test]
fn rule_without_next_run_is_skipped_silently() {
    let db = setup_db();
    let config = Config::default();
    let rule_id = monthly_rule(&db, d(2025, 3, 15), 15);
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE recurring_rules SET next_run = NULL WHERE id = ?1",
            params![rule_id],
        )?;
        Ok(())
    })
    .unwrap();

    let summary = scheduler::run_once(&db, &config, Some(d(2025, 3, 20))).unwrap();

    assert_eq!(summary.created, 0);
    assert_eq!(summary.advanced, 0);
    assert_eq!(summary.skipped_runaway, 0);
    assert!(recurring_tasks(&db).is_empty());
}

#[test]
fn inactive_rules_are_not_materialized() {
    let db = setup_db();
    let config = Config::default();
    let rule_id = monthly_rule(&db, d(2025, 3, 15), 15);
    db.set_rule_active(rule_id, false).unwrap();

    let summary = scheduler::run_once(&db, &config, Some(d(2025, 6, 1))).unwrap();

    assert_eq!(summary.created, 0);
    assert!(recurring_tasks(&db).is_empty());
}

#[test]
fn runaway_rule_stops_at_the_cap_and_is_counted() {
    let db = setup_db();
    let config = Config::default();
    // 48 monthly occurrences behind; the default cap is 36.
    let rule_id = monthly_rule(&db, d(2022, 1, 15), 15);

    let summary = scheduler::run_once(&db, &config, Some(d(2025, 12, 31))).unwrap();

    assert_eq!(summary.created, 36);
    assert_eq!(summary.advanced, 36);
    assert_eq!(summary.skipped_runaway, 1);

    // The 36 processed occurrences committed; the cursor parks on the
    // first unprocessed one.
    let rule = db.get_rule(rule_id).unwrap().unwrap();
    assert_eq!(rule.next_run, Some(d(2025, 1, 15)));

    // The next run finishes the remainder without tripping the cap.
    let second = scheduler::run_once(&db, &config, Some(d(2025, 12, 31))).unwrap();
    assert_eq!(second.created, 12);
    assert_eq!(second.skipped_runaway, 0);
    assert_eq!(recurring_tasks(&db).len(), 48);
}

#[test]
fn existing_pair_is_left_alone_but_cursor_still_advances() {
    let db = setup_db();
    let config = Config::default();
    let rule_id = monthly_rule(&db, d(2025, 3, 15), 15);

    scheduler::run_once(&db, &config, Some(d(2025, 3, 20))).unwrap();

    // Rewind the cursor to simulate a crash after task creation but
    // before the cursor advance committed.
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE recurring_rules SET next_run = '2025-03-15' WHERE id = ?1",
            params![rule_id],
        )?;
        Ok(())
    })
    .unwrap();

    let summary = scheduler::run_once(&db, &config, Some(d(2025, 3, 20))).unwrap();

    assert_eq!(summary.created, 0, "duplicate pair must be a no-op");
    assert_eq!(summary.advanced, 1);
    assert_eq!(recurring_tasks(&db).len(), 1);

    let rule = db.get_rule(rule_id).unwrap().unwrap();
    assert_eq!(rule.next_run, Some(d(2025, 4, 15)));
}

#[test]
fn generated_tasks_copy_rule_fields() {
    let db = setup_db();
    let config = Config::default();
    let user = db
        .create_user("bk@firm.test", "Bookkeeper", "bookkeeper", true)
        .unwrap();
    let client = db
        .create_client("Acme LLC", None, Some(user.id), Some("monthly"))
        .unwrap();
    let rule = db
        .create_rule(NewRule {
            client_id: Some(client.id),
            name: "Reconcile accounts".to_string(),
            description: Some("Match statements against the ledger".to_string()),
            schedule_type: "monthly".to_string(),
            day_of_month: Some(10),
            next_run: Some(d(2025, 6, 10)),
            default_status: Some("in_progress".to_string()),
            assigned_user_id: Some(user.id),
            ..NewRule::default()
        })
        .unwrap();

    scheduler::run_once(&db, &config, Some(d(2025, 6, 10))).unwrap();

    let tasks = recurring_tasks(&db);
    assert_eq!(tasks.len(), 1);
    let task = &tasks[0];
    assert_eq!(task.title, "Reconcile accounts");
    assert_eq!(
        task.description.as_deref(),
        Some("Match statements against the ledger")
    );
    assert_eq!(task.status, "in_progress");
    assert_eq!(task.assigned_user_id, Some(user.id));
    assert_eq!(task.client_id, Some(client.id));
    assert_eq!(task.recurring_rule_id, Some(rule.id));
    assert_eq!(task.task_type, TaskType::Recurring);
}

#[test]
fn client_frequency_resolves_against_the_client_at_creation() {
    let db = setup_db();
    let client = db
        .create_client("Quarterly Co", None, None, Some("quarterly"))
        .unwrap();

    let rule = db
        .create_rule(NewRule {
            client_id: Some(client.id),
            name: "Close the books".to_string(),
            schedule_type: "client_frequency".to_string(),
            day_of_month: Some(15),
            next_run: Some(d(2025, 3, 15)),
            ..NewRule::default()
        })
        .unwrap();

    assert_eq!(rule.schedule_type, ScheduleType::Quarterly);

    let summary =
        scheduler::run_once(&db, &Config::default(), Some(d(2025, 6, 30))).unwrap();
    assert_eq!(summary.created, 2);

    let due_dates: Vec<_> = recurring_tasks(&db).iter().map(|t| t.due_date).collect();
    assert_eq!(due_dates, vec![Some(d(2025, 3, 15)), Some(d(2025, 6, 15))]);
}

#[test]
fn first_due_date_is_computed_when_not_given() {
    let db = setup_db();
    let rule = db
        .create_rule(NewRule {
            name: "File sales tax".to_string(),
            schedule_type: "monthly".to_string(),
            day_of_month: Some(20),
            start: Some(d(2025, 8, 25)),
            ..NewRule::default()
        })
        .unwrap();

    // The 20th has already passed in the start month.
    assert_eq!(rule.next_run, Some(d(2025, 9, 20)));
}
