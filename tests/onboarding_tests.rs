//! Integration tests for onboarding materialization and the dependency gate.

use chrono::Duration;
use ledgerdesk::config::Config;
use ledgerdesk::db::Database;
use ledgerdesk::db::templates::NewTemplate;
use ledgerdesk::onboarding;
use ledgerdesk::transitions;
use ledgerdesk::types::{Client, Role, Task, TaskType, User, status};

/// Helper to create a fresh in-memory database for testing.
fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

struct Office {
    admin: User,
    manager: User,
    bookkeeper: User,
    client: Client,
}

fn staffed_office(db: &Database) -> Office {
    let admin = db.create_user("admin@firm.test", "Admin", "admin", true).unwrap();
    let manager = db
        .create_user("mgr@firm.test", "Manager", "manager", true)
        .unwrap();
    let bookkeeper = db
        .create_user("bk@firm.test", "Bookkeeper", "bookkeeper", true)
        .unwrap();
    let client = db
        .create_client("Acme LLC", Some(manager.id), Some(bookkeeper.id), Some("monthly"))
        .unwrap();
    Office {
        admin,
        manager,
        bookkeeper,
        client,
    }
}

fn template(db: &Database, name: &str, role: Option<Role>, phase: Option<&str>, order: i64) -> i64 {
    db.create_template(NewTemplate {
        name: name.to_string(),
        phase: phase.map(String::from),
        default_due_offset_days: Some(order),
        default_assigned_role: role,
        order_index: order,
        ..NewTemplate::default()
    })
    .unwrap()
    .id
}

/// Two admin-classified templates and three gated ones.
fn standard_templates(db: &Database) {
    template(db, "Send engagement letter", Some(Role::Admin), None, 10);
    template(db, "Set up billing", None, Some("billing"), 20);
    template(db, "Review intake", Some(Role::Manager), None, 30);
    template(db, "Connect bank feeds", None, Some("bank feeds"), 40);
    template(db, "Build chart of accounts", Some(Role::Bookkeeper), None, 50);
}

fn onboarding_tasks(db: &Database, client_id: i64) -> Vec<Task> {
    let mut tasks = db
        .list_tasks(&ledgerdesk::db::tasks::TaskFilter {
            client_id: Some(client_id),
            task_type: Some(TaskType::Onboarding),
            ..Default::default()
        })
        .unwrap();
    tasks.sort_by_key(|t| t.id);
    tasks
}

#[test]
fn materialization_splits_admin_and_gated_tasks() {
    let db = setup_db();
    let config = Config::default();
    let office = staffed_office(&db);
    standard_templates(&db);

    let created =
        onboarding::materialize_for_client(&db, office.client.id, Some(office.admin.id), &config)
            .unwrap();
    assert_eq!(created.len(), 5);

    let active: Vec<_> = created.iter().filter(|t| t.status == status::NEW).collect();
    let blocked: Vec<_> = created
        .iter()
        .filter(|t| status::is_blocked(&t.status))
        .collect();
    assert_eq!(active.len(), 2, "admin-classified tasks start active");
    assert_eq!(blocked.len(), 3, "everything else starts blocked");

    // Role and phase drive the initial assignment.
    let by_title = |name: &str| created.iter().find(|t| t.title == name).unwrap();
    assert_eq!(by_title("Send engagement letter").assigned_user_id, Some(office.admin.id));
    assert_eq!(by_title("Set up billing").assigned_user_id, Some(office.admin.id));
    assert_eq!(by_title("Review intake").assigned_user_id, Some(office.manager.id));
    assert_eq!(by_title("Connect bank feeds").assigned_user_id, Some(office.bookkeeper.id));
    assert_eq!(
        by_title("Build chart of accounts").assigned_user_id,
        Some(office.bookkeeper.id)
    );
}

#[test]
fn materialization_is_idempotent_per_template() {
    let db = setup_db();
    let config = Config::default();
    let office = staffed_office(&db);
    standard_templates(&db);

    let first =
        onboarding::materialize_for_client(&db, office.client.id, None, &config).unwrap();
    let second =
        onboarding::materialize_for_client(&db, office.client.id, None, &config).unwrap();
    assert_eq!(first.len(), 5);
    assert!(second.is_empty(), "re-running must not duplicate tasks");

    // A template added later is picked up by the next backfill pass.
    template(&db, "Review payroll provider", Some(Role::Manager), None, 60);
    let third =
        onboarding::materialize_for_client(&db, office.client.id, None, &config).unwrap();
    assert_eq!(third.len(), 1);
    assert_eq!(onboarding_tasks(&db, office.client.id).len(), 6);
}

#[test]
fn due_dates_offset_from_client_creation() {
    let db = setup_db();
    let config = Config::default();
    let office = staffed_office(&db);
    template(&db, "Send engagement letter", Some(Role::Admin), None, 3);

    let created =
        onboarding::materialize_for_client(&db, office.client.id, None, &config).unwrap();

    let base = chrono::DateTime::from_timestamp_millis(office.client.created_at)
        .unwrap()
        .date_naive();
    assert_eq!(created[0].due_date, Some(base + Duration::days(3)));
}

#[test]
fn completing_all_admin_tasks_releases_the_blocked_set() {
    let db = setup_db();
    let config = Config::default();
    let office = staffed_office(&db);
    standard_templates(&db);
    onboarding::materialize_for_client(&db, office.client.id, Some(office.admin.id), &config)
        .unwrap();

    let admin_tasks: Vec<_> = onboarding_tasks(&db, office.client.id)
        .into_iter()
        .filter(|t| t.status == status::NEW)
        .collect();
    assert_eq!(admin_tasks.len(), 2);

    // One of two admin tasks done: nothing moves.
    let change = transitions::set_task_status(
        &db,
        admin_tasks[0].id,
        status::COMPLETED,
        Some(office.admin.id),
        &config,
    )
    .unwrap();
    assert_eq!(change.released, 0);
    let still_blocked = onboarding_tasks(&db, office.client.id)
        .iter()
        .filter(|t| status::is_blocked(&t.status))
        .count();
    assert_eq!(still_blocked, 3);

    // Both done: the whole blocked set releases in one pass.
    let change = transitions::set_task_status(
        &db,
        admin_tasks[1].id,
        status::COMPLETED,
        Some(office.admin.id),
        &config,
    )
    .unwrap();
    assert_eq!(change.released, 3);

    let tasks = onboarding_tasks(&db, office.client.id);
    assert!(tasks.iter().all(|t| !status::is_blocked(&t.status)));
    let released: Vec<_> = tasks
        .iter()
        .filter(|t| t.status == status::NEW)
        .collect();
    assert_eq!(released.len(), 3);
    assert!(
        released.iter().all(|t| t.assigned_user_id.is_some()),
        "released tasks carry an assignee"
    );
}

#[test]
fn non_completing_transitions_do_not_release() {
    let db = setup_db();
    let config = Config::default();
    let office = staffed_office(&db);
    template(&db, "Send engagement letter", Some(Role::Admin), None, 10);
    template(&db, "Connect bank feeds", None, Some("bank feeds"), 20);
    let created =
        onboarding::materialize_for_client(&db, office.client.id, None, &config).unwrap();
    let admin_task = created.iter().find(|t| t.status == status::NEW).unwrap();

    let change = transitions::set_task_status(
        &db,
        admin_task.id,
        status::IN_PROGRESS,
        None,
        &config,
    )
    .unwrap();
    assert_eq!(change.released, 0);

    let blocked = onboarding_tasks(&db, office.client.id)
        .iter()
        .filter(|t| status::is_blocked(&t.status))
        .count();
    assert_eq!(blocked, 1);
}

#[test]
fn release_assigns_lazily_from_current_staffing() {
    let db = setup_db();
    let config = Config::default();
    let admin = db.create_user("admin@firm.test", "Admin", "admin", true).unwrap();
    // Client starts with no staffing at all.
    let client = db.create_client("Bare Co", None, None, None).unwrap();
    template(&db, "Send engagement letter", Some(Role::Admin), None, 10);
    template(&db, "Connect bank feeds", None, Some("bank feeds"), 20);

    let created =
        onboarding::materialize_for_client(&db, client.id, Some(admin.id), &config).unwrap();
    let gated = created
        .iter()
        .find(|t| status::is_blocked(&t.status))
        .unwrap();
    assert_eq!(gated.assigned_user_id, None, "no bookkeeper to assign yet");

    // Staffing lands before the gate opens.
    let bookkeeper = db
        .create_user("bk@firm.test", "Bookkeeper", "bookkeeper", true)
        .unwrap();
    db.set_client_staffing(client.id, None, Some(bookkeeper.id)).unwrap();

    let admin_task = created.iter().find(|t| t.status == status::NEW).unwrap();
    let change =
        transitions::set_task_status(&db, admin_task.id, status::COMPLETED, Some(admin.id), &config)
            .unwrap();
    assert_eq!(change.released, 1);

    let released = db.get_task(gated.id).unwrap().unwrap();
    assert_eq!(released.status, status::NEW);
    assert_eq!(released.assigned_user_id, Some(bookkeeper.id));
}

#[test]
fn zero_admin_tasks_is_vacuously_satisfied() {
    let db = setup_db();
    let config = Config::default();
    let office = staffed_office(&db);
    template(&db, "Connect bank feeds", None, Some("bank feeds"), 10);
    template(&db, "Build chart of accounts", Some(Role::Bookkeeper), None, 20);

    let created =
        onboarding::materialize_for_client(&db, office.client.id, None, &config).unwrap();
    assert!(created.iter().all(|t| status::is_blocked(&t.status)));

    let released = onboarding::release_if_ready(&db, office.client.id, &config).unwrap();
    assert_eq!(released, 2);
}

#[test]
fn release_check_is_safe_to_repeat() {
    let db = setup_db();
    let config = Config::default();
    let office = staffed_office(&db);
    template(&db, "Connect bank feeds", None, Some("bank feeds"), 10);
    onboarding::materialize_for_client(&db, office.client.id, None, &config).unwrap();

    assert_eq!(
        onboarding::release_if_ready(&db, office.client.id, &config).unwrap(),
        1
    );
    assert_eq!(
        onboarding::release_if_ready(&db, office.client.id, &config).unwrap(),
        0,
        "released tasks leave the blocked set"
    );
}

#[test]
fn released_tasks_record_a_status_event() {
    let db = setup_db();
    let config = Config::default();
    let office = staffed_office(&db);
    template(&db, "Connect bank feeds", None, Some("bank feeds"), 10);
    let created =
        onboarding::materialize_for_client(&db, office.client.id, None, &config).unwrap();

    onboarding::release_if_ready(&db, office.client.id, &config).unwrap();

    let events = db.get_task_events(created[0].id).unwrap();
    let statuses: Vec<_> = events.iter().map(|e| e.status.as_str()).collect();
    assert_eq!(statuses, vec![status::BLOCKED, status::NEW]);
    assert_eq!(events[1].reason.as_deref(), Some("onboarding released"));
}
