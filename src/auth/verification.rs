// src/auth/verification.rs
use rusqlite::Connection;

use crate::auth::token::{generate_token_default, hash_token};
use crate::db::users::{self, NewUser};
use crate::errors::ServerError;

use crate::auth::password::hash_password;

#[derive(Debug, Clone)]
pub struct RegistrationConfig {
    /// Relative path used when building verification links.
    /// Example: "/api/auth/verify"
    pub verify_path: String,
    /// Minimum accepted password length.
    pub min_password_len: usize,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            verify_path: "/api/auth/verify".to_string(),
            min_password_len: 8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone)]
pub struct RegisteredUser {
    pub user_id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Raw verification token (never stored; goes out by email).
    pub token: String,
    /// Relative URL like "/api/auth/verify?token=..."
    pub link: String,
}

pub struct RegistrationService {
    cfg: RegistrationConfig,
}

impl RegistrationService {
    pub fn new(cfg: RegistrationConfig) -> Self {
        Self { cfg }
    }

    /// Trim + lowercase, minimal sanity check.
    pub fn normalize_email(email: &str) -> Result<String, ServerError> {
        let e = email.trim().to_lowercase();
        if e.is_empty() || !e.contains('@') || e.starts_with('@') || e.ends_with('@') {
            return Err(ServerError::BadRequest("invalid email".into()));
        }
        Ok(e)
    }

    fn build_link(&self, token: &str) -> String {
        format!("{}?token={}", self.cfg.verify_path, token)
    }

    /// Create an unverified, inactive account:
    /// - normalize email, reject duplicates
    /// - salt+hash the password
    /// - issue a verification token (store hash only)
    ///
    /// Email sending is the caller's job; `registered.link` is what goes out.
    pub fn register(
        &self,
        conn: &Connection,
        input: &RegisterInput,
        now: i64,
    ) -> Result<RegisteredUser, ServerError> {
        let email = Self::normalize_email(&input.email)?;

        if input.password.len() < self.cfg.min_password_len {
            return Err(ServerError::BadRequest(format!(
                "password must be at least {} characters",
                self.cfg.min_password_len
            )));
        }

        if users::email_exists(conn, &email)? {
            return Err(ServerError::BadRequest(
                "The user with this email already exists.".into(),
            ));
        }

        let (password_hash, password_salt) = hash_password(&input.password);
        let token = generate_token_default();
        let token_hash = hash_token(&token);

        let user_id = users::create_user(
            conn,
            &NewUser {
                email: &email,
                password_hash: &password_hash,
                password_salt: &password_salt,
                first_name: &input.first_name,
                last_name: &input.last_name,
            },
            &token_hash,
            now,
        )?;

        Ok(RegisteredUser {
            user_id,
            email,
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            token: token.clone(),
            link: self.build_link(&token),
        })
    }

    /// Redeem a verification token: flips the account to verified + active
    /// and clears the token (single use).
    pub fn verify(&self, conn: &Connection, token: &str) -> Result<(), ServerError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ServerError::BadRequest("missing token".into()));
        }

        let token_hash = hash_token(token);
        if !users::verify_by_token_hash(conn, &token_hash)? {
            return Err(ServerError::BadRequest("Invalid activation token.".into()));
        }
        Ok(())
    }
}
