// src/jobs.rs
//
// Periodic lifecycle sweep. This is the only writer of publication status
// and archival state; every other component reads snapshots and tolerates
// this job committing between their read and their response.

use std::thread;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{info, warn};

use crate::db::Database;
use crate::domain::ranking::SECS_PER_DAY;
use crate::errors::ServerError;

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Archived publications older than this are deleted.
    pub purge_after_days: i64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            purge_after_days: 90,
        }
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct SweepOutcome {
    pub successful: usize,
    pub expired: usize,
    pub purged: usize,
}

impl SweepOutcome {
    pub fn changed(&self) -> bool {
        self.successful > 0 || self.expired > 0 || self.purged > 0
    }
}

/// One pass over the active set:
/// - goal reached -> successful + archived
/// - past its expiry -> expired + archived
/// - archived and untouched past the purge window -> deleted
///
/// Goal completion wins over expiry when both hold at sweep time.
pub fn sweep_lifecycle(
    conn: &Connection,
    now: i64,
    cfg: &LifecycleConfig,
) -> Result<SweepOutcome, ServerError> {
    let successful = conn
        .execute(
            "update publications
             set status = 'successful', is_archived = 1, updated_at = ?
             where status = 'active'
               and (select coalesce(sum(amount), 0)
                    from donations
                    where publication_id = publications.id) >= amount",
            params![now],
        )
        .map_err(|e| ServerError::DbError(format!("mark successful failed: {e}")))?;

    let expired = conn
        .execute(
            "update publications
             set status = 'expired', is_archived = 1, updated_at = ?
             where status = 'active'
               and expires_at is not null
               and expires_at <= ?",
            params![now, now],
        )
        .map_err(|e| ServerError::DbError(format!("mark expired failed: {e}")))?;

    let purge_before = now - cfg.purge_after_days * SECS_PER_DAY;
    let purged = conn
        .execute(
            "delete from publications where is_archived = 1 and updated_at <= ?",
            params![purge_before],
        )
        .map_err(|e| ServerError::DbError(format!("purge archived failed: {e}")))?;

    Ok(SweepOutcome {
        successful,
        expired,
        purged,
    })
}

/// Run the sweep on its own thread, forever.
pub fn spawn_lifecycle_job(db: Database, interval_secs: u64) -> thread::JoinHandle<()> {
    let cfg = LifecycleConfig::default();
    thread::spawn(move || loop {
        let now = Utc::now().timestamp();
        match db.with_conn(|conn| sweep_lifecycle(conn, now, &cfg)) {
            Ok(outcome) if outcome.changed() => {
                info!(
                    "lifecycle sweep: {} successful, {} expired, {} purged",
                    outcome.successful, outcome.expired, outcome.purged
                );
            }
            Ok(_) => {}
            Err(e) => warn!("lifecycle sweep failed: {e}"),
        }
        thread::sleep(Duration::from_secs(interval_secs));
    })
}
