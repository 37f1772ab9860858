//! Client and user records consumed by the engine.
//!
//! These are collaborator entities: the surrounding CRUD layer owns their
//! full lifecycle, the engine needs read access plus the minimal writes the
//! CLI and tests rely on.

use super::{Database, now_ms};
use crate::types::{Client, User, is_admin_equivalent};
use anyhow::Result;
use rusqlite::{Connection, Row, params};

pub(crate) fn parse_user_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        email: row.get("email")?,
        name: row.get("name")?,
        role: row.get("role")?,
        is_active: row.get("is_active")?,
    })
}

pub(crate) fn parse_client_row(row: &Row) -> rusqlite::Result<Client> {
    Ok(Client {
        id: row.get("id")?,
        legal_name: row.get("legal_name")?,
        manager_id: row.get("manager_id")?,
        bookkeeper_id: row.get("bookkeeper_id")?,
        bookkeeping_frequency: row.get("bookkeeping_frequency")?,
        created_at: row.get("created_at")?,
    })
}

pub(crate) fn get_client_internal(conn: &Connection, client_id: i64) -> Result<Option<Client>> {
    let mut stmt = conn.prepare("SELECT * FROM clients WHERE id = ?1")?;
    match stmt.query_row(params![client_id], parse_client_row) {
        Ok(client) => Ok(Some(client)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Whether the user exists, is active, and carries an admin-equivalent role.
pub(crate) fn is_active_admin(conn: &Connection, user_id: i64) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT role, is_active FROM users WHERE id = ?1")?;
    match stmt.query_row(params![user_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
    }) {
        Ok((role, active)) => Ok(active && is_admin_equivalent(&role)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// First active admin-equivalent user, deterministic by id ascending.
pub(crate) fn first_active_admin(conn: &Connection) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT id, role FROM users WHERE is_active = 1 ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (id, role) = row?;
        if is_admin_equivalent(&role) {
            return Ok(Some(id));
        }
    }
    Ok(None)
}

impl Database {
    pub fn create_user(&self, email: &str, name: &str, role: &str, is_active: bool) -> Result<User> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (email, name, role, is_active) VALUES (?1, ?2, ?3, ?4)",
                params![email, name, role, is_active],
            )?;
            Ok(User {
                id: conn.last_insert_rowid(),
                email: email.to_string(),
                name: name.to_string(),
                role: role.to_string(),
                is_active,
            })
        })
    }

    pub fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM users WHERE id = ?1")?;
            match stmt.query_row(params![user_id], parse_user_row) {
                Ok(user) => Ok(Some(user)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn set_user_active(&self, user_id: i64, is_active: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET is_active = ?1 WHERE id = ?2",
                params![is_active, user_id],
            )?;
            Ok(())
        })
    }

    pub fn create_client(
        &self,
        legal_name: &str,
        manager_id: Option<i64>,
        bookkeeper_id: Option<i64>,
        bookkeeping_frequency: Option<&str>,
    ) -> Result<Client> {
        let now = now_ms();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO clients (legal_name, manager_id, bookkeeper_id, bookkeeping_frequency, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![legal_name, manager_id, bookkeeper_id, bookkeeping_frequency, now],
            )?;
            Ok(Client {
                id: conn.last_insert_rowid(),
                legal_name: legal_name.to_string(),
                manager_id,
                bookkeeper_id,
                bookkeeping_frequency: bookkeeping_frequency.map(String::from),
                created_at: now,
            })
        })
    }

    pub fn get_client(&self, client_id: i64) -> Result<Option<Client>> {
        self.with_conn(|conn| get_client_internal(conn, client_id))
    }

    pub fn list_clients(&self) -> Result<Vec<Client>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM clients ORDER BY id")?;
            let clients = stmt
                .query_map([], parse_client_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(clients)
        })
    }

    /// Update the client's designated manager/bookkeeper pair.
    pub fn set_client_staffing(
        &self,
        client_id: i64,
        manager_id: Option<i64>,
        bookkeeper_id: Option<i64>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE clients SET manager_id = ?1, bookkeeper_id = ?2 WHERE id = ?3",
                params![manager_id, bookkeeper_id, client_id],
            )?;
            Ok(())
        })
    }
}
