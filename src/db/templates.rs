//! Onboarding template storage.

use super::Database;
use crate::types::{OnboardingTemplate, Role};
use anyhow::Result;
use rusqlite::{Connection, Row, params};
use serde::Deserialize;

/// Input for creating an onboarding template.
#[derive(Debug, Clone, Default)]
pub struct NewTemplate {
    pub name: String,
    pub description: Option<String>,
    pub phase: Option<String>,
    pub default_due_offset_days: Option<i64>,
    pub default_assigned_role: Option<Role>,
    pub order_index: i64,
}

/// One template entry as loaded from a seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateSeed {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub default_due_offset_days: Option<i64>,
    #[serde(default)]
    pub default_assigned_role: Option<Role>,
    #[serde(default)]
    pub order_index: i64,
    #[serde(default = "default_seed_active")]
    pub is_active: bool,
}

fn default_seed_active() -> bool {
    true
}

pub(crate) fn parse_template_row(row: &Row) -> rusqlite::Result<OnboardingTemplate> {
    let role: Option<String> = row.get("default_assigned_role")?;
    Ok(OnboardingTemplate {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        phase: row.get("phase")?,
        default_due_offset_days: row.get("default_due_offset_days")?,
        default_assigned_role: role.as_deref().and_then(Role::from_str),
        order_index: row.get("order_index")?,
        is_active: row.get("is_active")?,
    })
}

pub(crate) fn get_template_internal(
    conn: &Connection,
    template_id: i64,
) -> Result<Option<OnboardingTemplate>> {
    let mut stmt = conn.prepare("SELECT * FROM onboarding_templates WHERE id = ?1")?;
    match stmt.query_row(params![template_id], parse_template_row) {
        Ok(template) => Ok(Some(template)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Active templates in materialization order.
pub(crate) fn list_active_internal(conn: &Connection) -> Result<Vec<OnboardingTemplate>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM onboarding_templates
         WHERE is_active = 1
         ORDER BY order_index ASC, id ASC",
    )?;
    let templates = stmt
        .query_map([], parse_template_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(templates)
}

impl Database {
    pub fn create_template(&self, input: NewTemplate) -> Result<OnboardingTemplate> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO onboarding_templates (
                    name, description, phase, default_due_offset_days,
                    default_assigned_role, order_index, is_active
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)",
                params![
                    &input.name,
                    &input.description,
                    &input.phase,
                    input.default_due_offset_days,
                    input.default_assigned_role.map(|r| r.as_str()),
                    input.order_index,
                ],
            )?;
            Ok(OnboardingTemplate {
                id: conn.last_insert_rowid(),
                name: input.name,
                description: input.description,
                phase: input.phase,
                default_due_offset_days: input.default_due_offset_days,
                default_assigned_role: input.default_assigned_role,
                order_index: input.order_index,
                is_active: true,
            })
        })
    }

    pub fn get_template(&self, template_id: i64) -> Result<Option<OnboardingTemplate>> {
        self.with_conn(|conn| get_template_internal(conn, template_id))
    }

    pub fn list_templates(&self) -> Result<Vec<OnboardingTemplate>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM onboarding_templates ORDER BY order_index ASC, id ASC",
            )?;
            let templates = stmt
                .query_map([], parse_template_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(templates)
        })
    }

    pub fn list_active_templates(&self) -> Result<Vec<OnboardingTemplate>> {
        self.with_conn(list_active_internal)
    }

    /// Soft on/off switch; templates are never deleted so generated tasks
    /// keep their back-reference.
    pub fn set_template_active(&self, template_id: i64, is_active: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE onboarding_templates SET is_active = ?1 WHERE id = ?2",
                params![is_active, template_id],
            )?;
            Ok(())
        })
    }

    /// Insert or update a template by name. Returns the row and whether it
    /// was newly inserted. Used by the seeding CLI.
    pub fn upsert_template_by_name(&self, seed: &TemplateSeed) -> Result<(OnboardingTemplate, bool)> {
        self.with_conn(|conn| {
            let existing: Option<i64> = match conn.query_row(
                "SELECT id FROM onboarding_templates WHERE name = ?1",
                params![&seed.name],
                |row| row.get(0),
            ) {
                Ok(id) => Some(id),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(e.into()),
            };

            let inserted = existing.is_none();
            let id = match existing {
                Some(id) => {
                    conn.execute(
                        "UPDATE onboarding_templates SET
                            description = ?1, phase = ?2, default_due_offset_days = ?3,
                            default_assigned_role = ?4, order_index = ?5, is_active = ?6
                         WHERE id = ?7",
                        params![
                            &seed.description,
                            &seed.phase,
                            seed.default_due_offset_days,
                            seed.default_assigned_role.map(|r| r.as_str()),
                            seed.order_index,
                            seed.is_active,
                            id,
                        ],
                    )?;
                    id
                }
                None => {
                    conn.execute(
                        "INSERT INTO onboarding_templates (
                            name, description, phase, default_due_offset_days,
                            default_assigned_role, order_index, is_active
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![
                            &seed.name,
                            &seed.description,
                            &seed.phase,
                            seed.default_due_offset_days,
                            seed.default_assigned_role.map(|r| r.as_str()),
                            seed.order_index,
                            seed.is_active,
                        ],
                    )?;
                    conn.last_insert_rowid()
                }
            };

            let template = get_template_internal(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("template vanished after upsert"))?;
            Ok((template, inserted))
        })
    }
}
