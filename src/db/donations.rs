// src/db/donations.rs
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::errors::ServerError;

/// One entry of a publication's donation list as it appears in the detail
/// payload. The avatar shown next to each entry is the campaign author's,
/// pulled from their profile.
#[derive(Debug, Serialize)]
pub struct DonationEntry {
    pub donor_name: String,
    pub amount: f64,
    pub avatar: Option<String>,
    pub created_at: i64,
}

/// Append to the donation ledger. The ledger is never updated or deleted;
/// totals are always derived from it.
pub fn insert_donation(
    conn: &Connection,
    publication_id: i64,
    donor_id: i64,
    donor_name: &str,
    amount: f64,
    now: i64,
) -> Result<i64, ServerError> {
    conn.execute(
        "insert into donations (publication_id, donor_id, donor_name, amount, created_at)
         values (?, ?, ?, ?, ?)",
        params![publication_id, donor_id, donor_name, amount, now],
    )
    .map_err(|e| ServerError::DbError(format!("insert donation failed: {e}")))?;
    Ok(conn.last_insert_rowid())
}

pub fn user_has_donated(
    conn: &Connection,
    publication_id: i64,
    user_id: i64,
) -> Result<bool, ServerError> {
    let found: Option<i64> = conn
        .query_row(
            "select 1 from donations where publication_id = ? and donor_id = ? limit 1",
            params![publication_id, user_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(|e| ServerError::DbError(format!("select donor failed: {e}")))?;
    Ok(found.is_some())
}

pub fn list_for_publication(
    conn: &Connection,
    publication_id: i64,
) -> Result<Vec<DonationEntry>, ServerError> {
    let mut stmt = conn
        .prepare(
            "select dn.donor_name, dn.amount, pr.avatar_url, dn.created_at
             from donations dn
             join publications p on p.id = dn.publication_id
             left join profiles pr on pr.user_id = p.author_id
             where dn.publication_id = ?
             order by dn.created_at desc",
        )
        .map_err(|e| ServerError::DbError(format!("prepare donations query failed: {e}")))?;

    let rows = stmt
        .query_map(params![publication_id], |r| {
            Ok(DonationEntry {
                donor_name: r.get(0)?,
                amount: r.get(1)?,
                avatar: r.get(2)?,
                created_at: r.get(3)?,
            })
        })
        .map_err(|e| ServerError::DbError(format!("donations query failed: {e}")))?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| ServerError::DbError(format!("donation row failed: {e}")))?);
    }
    Ok(out)
}
