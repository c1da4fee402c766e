// src/auth/login.rs
use rusqlite::Connection;

use crate::auth::password::verify_password;
use crate::auth::sessions;
use crate::db::users;
use crate::errors::ServerError;

#[derive(Debug, Clone)]
pub struct LoginConfig {
    /// Failures before the lockout arms.
    pub max_attempts: i64,
    /// Lockout duration in seconds.
    pub lockout_secs: i64,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_secs: 15 * 60,
        }
    }
}

#[derive(Debug)]
pub struct LoggedIn {
    pub user_id: i64,
    pub email: String,
    /// Raw session token for the Authorization header.
    pub session_token: String,
}

pub struct LoginService {
    cfg: LoginConfig,
}

impl LoginService {
    pub fn new(cfg: LoginConfig) -> Self {
        Self { cfg }
    }

    /// Password login with lockout:
    /// - unknown email is rejected outright
    /// - a locked account stays locked until the lockout expires
    /// - each failure bumps the counter; hitting the threshold arms the
    ///   lockout (and re-arms it on failures past the threshold)
    /// - success clears the counter and opens a session
    ///
    /// An unverified (inactive) account fails the same way as a wrong
    /// password, so the response does not leak verification state.
    pub fn login(
        &self,
        conn: &Connection,
        email: &str,
        password: &str,
        now: i64,
    ) -> Result<LoggedIn, ServerError> {
        let email = email.trim().to_lowercase();

        let Some(user) = users::find_auth_by_email(conn, &email)? else {
            return Err(ServerError::Unauthorized("Invalid email.".into()));
        };

        if user.failed_attempts >= self.cfg.max_attempts {
            if let Some(lockout_until) = user.lockout_until {
                if lockout_until > now {
                    let remaining = lockout_until - now;
                    return Err(ServerError::Forbidden(format!(
                        "Account is locked. Try again in {remaining} seconds."
                    )));
                }
            }
        }

        let authenticated =
            user.is_active && verify_password(password, &user.password_salt, &user.password_hash);

        if !authenticated {
            let lockout = if user.failed_attempts + 1 >= self.cfg.max_attempts {
                Some(now + self.cfg.lockout_secs)
            } else {
                None
            };
            users::record_failed_attempt(conn, user.id, lockout)?;
            return Err(ServerError::Unauthorized("Invalid password.".into()));
        }

        users::reset_failed_attempts(conn, user.id, now)?;
        let session_token = sessions::create_session(conn, user.id, now)?;

        Ok(LoggedIn {
            user_id: user.id,
            email: user.email,
            session_token,
        })
    }
}
