use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use super::now_stamp;
use crate::error::{ServiceError, ServiceResult};
use crate::model::Role;
use crate::passwords;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    pub token: String,
    pub user_id: String,
    pub role: Role,
    /// Which dashboard the client should open next.
    pub dashboard: &'static str,
}

/// The authenticated identity behind a session token.
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub user_id: String,
    pub username: String,
    pub role: Role,
}

pub fn login(conn: &Connection, username: &str, password: &str) -> ServiceResult<LoginOutcome> {
    let row: Option<(String, String, String)> = conn
        .query_row(
            "SELECT id, password_hash, role FROM users WHERE username = ?",
            [username.trim()],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;

    let Some((user_id, hash, role)) = row else {
        log::debug!("Login for unknown user {:?}.", username);
        return Err(ServiceError::InvalidCredentials);
    };
    if !passwords::verify_password(password, &hash) {
        log::debug!("Bad password for {:?}.", username);
        return Err(ServiceError::InvalidCredentials);
    }
    let role: Role = role.parse().unwrap_or_default();

    let token = Uuid::new_v4().simple().to_string();
    conn.execute(
        "INSERT INTO sessions(token, user_id, created_at) VALUES(?, ?, ?)",
        (&token, &user_id, now_stamp()),
    )?;
    log::info!("User {:?} logged in as {}.", username.trim(), role);

    Ok(LoginOutcome {
        token,
        user_id,
        role,
        dashboard: role.dashboard(),
    })
}

/// Ends a session. Unknown tokens are not an error.
pub fn logout(conn: &Connection, token: &str) -> ServiceResult<()> {
    let n = conn.execute("DELETE FROM sessions WHERE token = ?", [token])?;
    log::debug!("Logout removed {} session(s).", n);
    Ok(())
}

pub fn resolve(conn: &Connection, token: &str) -> ServiceResult<Option<Caller>> {
    let row: Option<(String, String, String)> = conn
        .query_row(
            "SELECT u.id, u.username, u.role
             FROM sessions s JOIN users u ON u.id = s.user_id
             WHERE s.token = ?",
            [token],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;
    Ok(row.map(|(user_id, username, role)| Caller {
        user_id,
        username,
        role: role.parse().unwrap_or_default(),
    }))
}
