//! Assignment resolution from role/phase metadata and client staffing.
//!
//! Resolution is a fixed precedence list, first match wins. Ending up
//! unassigned is a valid terminal state, not an error.

use crate::config::{PhaseClass, PhasesConfig};
use crate::db::clients;
use crate::types::{Client, Role};
use anyhow::Result;
use rusqlite::Connection;

/// Resolve a template or rule's declared role (and, for templates, its
/// phase) to a concrete user id.
///
/// Precedence:
/// 1. role bookkeeper: client's bookkeeper, else manager, else creator
/// 2. role manager: client's manager, else bookkeeper, else creator
/// 3. role admin: the creator when they hold an active admin-equivalent
///    role, else the first active admin-equivalent user by id, else creator
/// 4. no role, admin phase: as (3)
/// 5. no role, bookkeeper phase: as (1) without the creator fallback
/// 6. otherwise unassigned
pub fn resolve_assignee(
    conn: &Connection,
    role: Option<Role>,
    phase: Option<&str>,
    client: &Client,
    creator: Option<i64>,
    phases: &PhasesConfig,
) -> Result<Option<i64>> {
    match role {
        Some(Role::Bookkeeper) => Ok(client.bookkeeper_id.or(client.manager_id).or(creator)),
        Some(Role::Manager) => Ok(client.manager_id.or(client.bookkeeper_id).or(creator)),
        Some(Role::Admin) => resolve_admin(conn, creator),
        None => match phase.map(|p| phases.classify(p)).unwrap_or(PhaseClass::Other) {
            PhaseClass::Admin => resolve_admin(conn, creator),
            PhaseClass::Bookkeeper => Ok(client.bookkeeper_id.or(client.manager_id)),
            PhaseClass::Other => Ok(None),
        },
    }
}

fn resolve_admin(conn: &Connection, creator: Option<i64>) -> Result<Option<i64>> {
    if let Some(id) = creator
        && clients::is_active_admin(conn, id)?
    {
        return Ok(Some(id));
    }
    Ok(clients::first_active_admin(conn)?.or(creator))
}
