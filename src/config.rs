use std::{env, fmt::Display, str::FromStr};

use tracing::info;

/// Process-level configuration, loaded once at startup from the environment.
/// Service-level tunables (lockout windows, ranking weights, ...) live next
/// to the services that use them.
pub struct Config {
    pub bind_addr: String,
    pub db_path: String,
    pub site_url: String,
    pub brevo_api_key: Option<String>,
    pub sender_email: String,
    pub sender_name: String,
    /// Lifecycle sweep interval in seconds.
    pub job_interval_secs: u64,
}

impl Config {
    pub fn load() -> Self {
        Self {
            bind_addr: try_load("BIND_ADDR", "127.0.0.1:3000"),
            db_path: try_load("DB_PATH", "crowdaid.sqlite3"),
            site_url: try_load("SITE_URL", "http://localhost:3000"),
            brevo_api_key: env::var("BREVO_API_KEY").ok(),
            sender_email: try_load("SENDER_EMAIL", "no-reply@crowdaid.local"),
            sender_name: try_load("SENDER_NAME", "Crowdaid"),
            job_interval_secs: try_load("JOB_INTERVAL_SECS", "300"),
        }
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .unwrap_or_else(|e| panic!("Invalid {key} value: {e}"))
}
