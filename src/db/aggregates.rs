// src/db/aggregates.rs
//
// Read-only aggregate queries feeding the ranking and recommendation
// engines. Each function is one batched statement over the active set;
// nothing here re-queries the ledgers per publication.

use std::collections::{HashMap, HashSet};

use rusqlite::{params, types::Value, Connection, Row};

use crate::domain::publication::PublicationSnapshot;
use crate::domain::recommend::CategoryHistory;
use crate::errors::ServerError;

// Shared SELECT body: one row per publication with its donation sum,
// distinct-viewer count, distinct-comment count, and distinct-commenter
// count. The grouped subqueries keep the three one-to-many joins from
// multiplying each other's rows.
const SNAPSHOT_BASE: &str = r#"
    select
        p.id,                               -- 0
        p.category,                         -- 1
        p.created_at,                       -- 2
        p.amount,                           -- 3
        coalesce(d.total, 0)       as total_donated,   -- 4
        coalesce(v.viewers, 0)     as total_views,     -- 5
        coalesce(c.comment_count, 0) as total_comments, -- 6
        coalesce(c.commenters, 0)  as commenter_count  -- 7
    from publications p
    left join (
        select publication_id, sum(amount) as total
        from donations group by publication_id
    ) d on d.publication_id = p.id
    left join (
        select publication_id, count(distinct viewer_id) as viewers
        from views group by publication_id
    ) v on v.publication_id = p.id
    left join (
        select publication_id,
               count(distinct id) as comment_count,
               count(distinct author_id) as commenters
        from comments group by publication_id
    ) c on c.publication_id = p.id
"#;

fn snapshot_from_row(row: &Row) -> rusqlite::Result<PublicationSnapshot> {
    Ok(PublicationSnapshot {
        id: row.get(0)?,
        category: row.get(1)?,
        created_at: row.get(2)?,
        amount: row.get(3)?,
        total_donated: row.get(4)?,
        total_views: row.get(5)?,
        total_comments: row.get(6)?,
        commenter_count: row.get(7)?,
    })
}

fn collect_snapshots(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<PublicationSnapshot>, ServerError> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| ServerError::DbError(format!("prepare snapshot query failed: {e}")))?;

    let rows = stmt
        .query_map(params, snapshot_from_row)
        .map_err(|e| ServerError::DbError(format!("snapshot query failed: {e}")))?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| ServerError::DbError(format!("snapshot row failed: {e}")))?);
    }
    Ok(out)
}

/// Active publications created at or after `created_after`, with aggregates.
pub fn fetch_active_snapshots(
    conn: &Connection,
    created_after: i64,
) -> Result<Vec<PublicationSnapshot>, ServerError> {
    let sql = format!(
        "{SNAPSHOT_BASE} where p.status = 'active' and p.created_at >= ? order by p.id"
    );
    collect_snapshots(conn, &sql, &[&created_after as &dyn rusqlite::ToSql])
}

/// Mean donation amount per category, across all publications regardless of
/// status. Categories with no donation history are absent from the map; the
/// ranking engine supplies the default.
pub fn fetch_category_averages(conn: &Connection) -> Result<HashMap<String, f64>, ServerError> {
    let mut stmt = conn
        .prepare(
            "select p.category, avg(d.amount)
             from publications p
             left join donations d on d.publication_id = p.id
             group by p.category",
        )
        .map_err(|e| ServerError::DbError(format!("prepare category averages failed: {e}")))?;

    let rows = stmt
        .query_map([], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, Option<f64>>(1)?))
        })
        .map_err(|e| ServerError::DbError(format!("category averages query failed: {e}")))?;

    let mut out = HashMap::new();
    for r in rows {
        let (category, avg) =
            r.map_err(|e| ServerError::DbError(format!("category average row failed: {e}")))?;
        if let Some(avg) = avg {
            out.insert(category, avg);
        }
    }
    Ok(out)
}

/// Distinct categories from the user's view history and donation history.
pub fn fetch_user_category_history(
    conn: &Connection,
    user_id: i64,
) -> Result<CategoryHistory, ServerError> {
    let mut history = CategoryHistory::default();

    let mut stmt = conn
        .prepare(
            "select distinct p.category
             from views v join publications p on p.id = v.publication_id
             where v.viewer_id = ?",
        )
        .map_err(|e| ServerError::DbError(format!("prepare viewed categories failed: {e}")))?;
    let rows = stmt
        .query_map(params![user_id], |r| r.get::<_, String>(0))
        .map_err(|e| ServerError::DbError(format!("viewed categories query failed: {e}")))?;
    for r in rows {
        history
            .viewed
            .insert(r.map_err(|e| ServerError::DbError(format!("viewed category row failed: {e}")))?);
    }

    let mut stmt = conn
        .prepare(
            "select distinct p.category
             from donations d join publications p on p.id = d.publication_id
             where d.donor_id = ?",
        )
        .map_err(|e| ServerError::DbError(format!("prepare donated categories failed: {e}")))?;
    let rows = stmt
        .query_map(params![user_id], |r| r.get::<_, String>(0))
        .map_err(|e| ServerError::DbError(format!("donated categories query failed: {e}")))?;
    for r in rows {
        history.donated.insert(
            r.map_err(|e| ServerError::DbError(format!("donated category row failed: {e}")))?,
        );
    }

    Ok(history)
}

/// Active publications in any of the given categories, excluding the
/// requesting user's own. Repository order, no internal ranking.
pub fn fetch_active_by_categories(
    conn: &Connection,
    categories: &HashSet<String>,
    exclude_author: i64,
) -> Result<Vec<PublicationSnapshot>, ServerError> {
    if categories.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; categories.len()].join(", ");
    let sql = format!(
        "{SNAPSHOT_BASE}
         where p.status = 'active'
           and p.author_id != ?
           and p.category in ({placeholders})"
    );

    let mut values: Vec<Value> = vec![Value::Integer(exclude_author)];
    values.extend(categories.iter().map(|c| Value::Text(c.clone())));
    let refs: Vec<&dyn rusqlite::ToSql> =
        values.iter().map(|v| v as &dyn rusqlite::ToSql).collect();

    collect_snapshots(conn, &sql, &refs)
}

/// Globally most popular active publications: by donation total descending
/// (publications with no donations sort last), then by distinct views.
pub fn fetch_top_popular_active(
    conn: &Connection,
    limit: usize,
) -> Result<Vec<PublicationSnapshot>, ServerError> {
    let sql = format!(
        "{SNAPSHOT_BASE}
         where p.status = 'active'
         order by d.total desc, v.viewers desc
         limit ?"
    );
    let limit = limit as i64;
    collect_snapshots(conn, &sql, &[&limit as &dyn rusqlite::ToSql])
}
