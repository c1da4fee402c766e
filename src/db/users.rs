// src/db/users.rs
use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::ServerError;

/// Everything the login path needs in one row.
#[derive(Debug)]
pub struct UserAuthRow {
    pub id: i64,
    pub email: String,
    pub password_hash: Vec<u8>,
    pub password_salt: Vec<u8>,
    pub is_active: bool,
    pub failed_attempts: i64,
    pub lockout_until: Option<i64>,
}

pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: &'a [u8],
    pub password_salt: &'a [u8],
    pub first_name: &'a str,
    pub last_name: &'a str,
}

pub fn email_exists(conn: &Connection, email: &str) -> Result<bool, ServerError> {
    let found: Option<i64> = conn
        .query_row(
            "select id from users where email = ?",
            params![email],
            |r| r.get(0),
        )
        .optional()
        .map_err(|e| ServerError::DbError(format!("select user by email failed: {e}")))?;
    Ok(found.is_some())
}

/// Insert a new unverified, inactive account plus its empty profile row.
/// Email should already be normalized by caller (trim/lowercase).
pub fn create_user(
    conn: &Connection,
    user: &NewUser,
    verification_token_hash: &[u8],
    now: i64,
) -> Result<i64, ServerError> {
    conn.execute(
        "insert into users
           (email, password_hash, password_salt, first_name, last_name,
            is_active, is_verified, verification_token_hash, created_at)
         values (?, ?, ?, ?, ?, 0, 0, ?, ?)",
        params![
            user.email,
            user.password_hash,
            user.password_salt,
            user.first_name,
            user.last_name,
            verification_token_hash,
            now
        ],
    )
    .map_err(|e| ServerError::DbError(format!("insert user failed: {e}")))?;

    let user_id = conn.last_insert_rowid();

    conn.execute(
        "insert into profiles (user_id) values (?)",
        params![user_id],
    )
    .map_err(|e| ServerError::DbError(format!("insert profile failed: {e}")))?;

    Ok(user_id)
}

pub fn find_auth_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<UserAuthRow>, ServerError> {
    conn.query_row(
        "select id, email, password_hash, password_salt, is_active,
                failed_attempts, lockout_until
         from users
         where email = ?",
        params![email],
        |r| {
            Ok(UserAuthRow {
                id: r.get(0)?,
                email: r.get(1)?,
                password_hash: r.get(2)?,
                password_salt: r.get(3)?,
                is_active: r.get(4)?,
                failed_attempts: r.get(5)?,
                lockout_until: r.get(6)?,
            })
        },
    )
    .optional()
    .map_err(|e| ServerError::DbError(format!("select user auth failed: {e}")))
}

/// Flip a user to verified+active and clear the token so it is single-use.
/// Returns false when no user carries that token hash.
pub fn verify_by_token_hash(conn: &Connection, token_hash: &[u8]) -> Result<bool, ServerError> {
    let updated = conn
        .execute(
            "update users
             set is_verified = 1, is_active = 1, verification_token_hash = null
             where verification_token_hash = ?",
            params![token_hash],
        )
        .map_err(|e| ServerError::DbError(format!("verify user failed: {e}")))?;
    Ok(updated == 1)
}

/// Bump the failure counter; arms the lockout when the caller passes one.
pub fn record_failed_attempt(
    conn: &Connection,
    user_id: i64,
    lockout_until: Option<i64>,
) -> Result<(), ServerError> {
    conn.execute(
        "update users
         set failed_attempts = failed_attempts + 1,
             lockout_until = coalesce(?, lockout_until)
         where id = ?",
        params![lockout_until, user_id],
    )
    .map_err(|e| ServerError::DbError(format!("record failed attempt failed: {e}")))?;
    Ok(())
}

pub fn reset_failed_attempts(conn: &Connection, user_id: i64, now: i64) -> Result<(), ServerError> {
    conn.execute(
        "update users
         set failed_attempts = 0, lockout_until = null, last_login_at = ?
         where id = ?",
        params![now, user_id],
    )
    .map_err(|e| ServerError::DbError(format!("reset failed attempts failed: {e}")))?;
    Ok(())
}
