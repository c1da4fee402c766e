// src/db/engagement.rs
use rusqlite::{params, Connection};

use crate::errors::ServerError;

/// Record that a user viewed a publication. At most one row per
/// (publication, viewer); repeat views are ignored.
pub fn record_view(
    conn: &Connection,
    publication_id: i64,
    viewer_id: i64,
    now: i64,
) -> Result<(), ServerError> {
    conn.execute(
        "insert or ignore into views (publication_id, viewer_id, viewed_at)
         values (?, ?, ?)",
        params![publication_id, viewer_id, now],
    )
    .map_err(|e| ServerError::DbError(format!("record view failed: {e}")))?;
    Ok(())
}

pub fn insert_comment(
    conn: &Connection,
    publication_id: i64,
    author_id: i64,
    content: &str,
    now: i64,
) -> Result<i64, ServerError> {
    conn.execute(
        "insert into comments (publication_id, author_id, content, created_at)
         values (?, ?, ?, ?)",
        params![publication_id, author_id, content, now],
    )
    .map_err(|e| ServerError::DbError(format!("insert comment failed: {e}")))?;
    Ok(conn.last_insert_rowid())
}
