//! Core domain types for the ledgerdesk engine.

use crate::calendar::Anchor;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Task status values the engine assigns meaning to.
///
/// Status is stored as free text and collaborators may introduce further
/// values; only the constants below drive engine behavior.
pub mod status {
    pub const NEW: &str = "new";
    pub const BLOCKED: &str = "blocked";
    pub const IN_PROGRESS: &str = "in_progress";
    pub const WAITING_ON_CLIENT: &str = "waiting_on_client";
    pub const COMPLETED: &str = "completed";

    pub fn is_completed(s: &str) -> bool {
        s.eq_ignore_ascii_case(COMPLETED)
    }

    pub fn is_blocked(s: &str) -> bool {
        s.eq_ignore_ascii_case(BLOCKED)
    }
}

/// Schedule label for rules whose cadence follows the owning client's
/// bookkeeping frequency. Resolved to a concrete [`ScheduleType`] at rule
/// creation time.
pub const CLIENT_FREQUENCY: &str = "client_frequency";

/// Recurrence cadence of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    Monthly,
    Quarterly,
    Annual,
}

impl ScheduleType {
    /// Month step applied by one advance.
    pub fn months(&self) -> u32 {
        match self {
            ScheduleType::Monthly => 1,
            ScheduleType::Quarterly => 3,
            ScheduleType::Annual => 12,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleType::Monthly => "monthly",
            ScheduleType::Quarterly => "quarterly",
            ScheduleType::Annual => "annual",
        }
    }

    /// Parse a schedule or frequency label. Unknown values fall back to monthly.
    pub fn from_label(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "quarterly" => ScheduleType::Quarterly,
            "annual" | "annually" | "yearly" => ScheduleType::Annual,
            _ => ScheduleType::Monthly,
        }
    }
}

/// Role a template can assign generated work to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Bookkeeper,
    Manager,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Bookkeeper => "bookkeeper",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "bookkeeper" => Some(Role::Bookkeeper),
            "manager" => Some(Role::Manager),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Whether a user role label counts as admin for assignment resolution.
pub fn is_admin_equivalent(role: &str) -> bool {
    matches!(role.trim().to_lowercase().as_str(), "admin" | "owner")
}

/// Origin classification of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Recurring,
    Onboarding,
    Project,
    AdHoc,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Recurring => "recurring",
            TaskType::Onboarding => "onboarding",
            TaskType::Project => "project",
            TaskType::AdHoc => "ad_hoc",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "recurring" => Some(TaskType::Recurring),
            "onboarding" => Some(TaskType::Onboarding),
            "project" => Some(TaskType::Project),
            "ad_hoc" => Some(TaskType::AdHoc),
            _ => None,
        }
    }
}

/// Staff user record. Consumed collaborator; the engine only reads the
/// role label and active flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: String,
    pub is_active: bool,
}

/// Client record. Consumed collaborator; staffing ids feed the assignment
/// resolver and `created_at` anchors onboarding due dates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub legal_name: String,
    pub manager_id: Option<i64>,
    pub bookkeeper_id: Option<i64>,
    pub bookkeeping_frequency: Option<String>,
    pub created_at: i64,
}

/// A standing obligation definition with a materialization cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringRule {
    pub id: i64,
    /// Owning client; None means firm-wide.
    pub client_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub schedule_type: ScheduleType,
    pub day_of_month: Option<u32>,
    /// 0=Mon..6=Sun
    pub weekday: Option<u32>,
    /// 1..4, or -1 for last
    pub week_of_month: Option<i32>,
    /// The next due date not yet materialized. Mutated only by the
    /// calendar advance step.
    pub next_run: Option<NaiveDate>,
    pub default_status: String,
    pub assigned_user_id: Option<i64>,
    pub active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl RecurringRule {
    /// Recurrence anchor derived from the rule's nullable columns.
    /// None means "same day-of-month as the date being advanced from."
    pub fn anchor(&self) -> Option<Anchor> {
        Anchor::from_fields(self.day_of_month, self.weekday, self.week_of_month)
    }
}

/// An ordered, phase-tagged onboarding work item definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingTemplate {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub phase: Option<String>,
    /// Days after the owning client's creation date.
    pub default_due_offset_days: Option<i64>,
    pub default_assigned_role: Option<Role>,
    pub order_index: i64,
    pub is_active: bool,
}

/// A concrete work item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub due_date: Option<NaiveDate>,
    pub assigned_user_id: Option<i64>,
    pub client_id: Option<i64>,
    /// Originating rule, stored as a plain foreign key.
    pub recurring_rule_id: Option<i64>,
    /// Originating template; mutually exclusive with `recurring_rule_id`.
    pub template_task_id: Option<i64>,
    pub task_type: TaskType,
    pub onboarding_phase: Option<String>,
    pub is_intercompany: bool,
    pub created_by_id: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Per-client completion state for an intercompany task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskClientLink {
    pub task_id: i64,
    pub client_id: i64,
    pub is_completed: bool,
    pub completed_at: Option<i64>,
    pub completed_by_id: Option<i64>,
    pub created_at: i64,
}

/// One entry in a task's append-only status history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub id: i64,
    pub task_id: i64,
    pub user_id: Option<i64>,
    pub status: String,
    pub reason: Option<String>,
    pub timestamp: i64,
}

/// Operational counters from one scheduler run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub created: u32,
    pub advanced: u32,
    pub skipped_runaway: u32,
}

/// Tasks for one user grouped for the dashboard view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardBuckets {
    pub overdue: Vec<Task>,
    pub due_today: Vec<Task>,
    pub upcoming: Vec<Task>,
    pub waiting_on_client: Vec<Task>,
}
