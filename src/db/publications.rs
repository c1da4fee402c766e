// src/db/publications.rs
use rusqlite::{params, types::Value, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::db::donations::DonationEntry;
use crate::domain::search::SearchMode;
use crate::errors::ServerError;

pub struct NewPublication {
    pub title: String,
    pub category: String,
    pub description: String,
    pub bank_details: String,
    pub amount: f64,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub expires_at: Option<i64>,
    /// Media URLs; upload/storage happens elsewhere, we only keep references.
    pub image_urls: Vec<String>,
    pub video_urls: Vec<String>,
}

/// Partial update; None leaves the column untouched.
#[derive(Default)]
pub struct PublicationUpdate {
    pub title: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub bank_details: Option<String>,
    pub amount: Option<f64>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub expires_at: Option<i64>,
}

/// One row of the list endpoint, aggregates included.
#[derive(Debug, Serialize)]
pub struct PublicationListRow {
    pub id: i64,
    pub author_id: i64,
    pub author_email: String,
    pub title: String,
    pub category: String,
    pub description: String,
    pub amount: f64,
    pub status: String,
    pub is_archived: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub expires_at: Option<i64>,
    pub total_donated: f64,
    pub total_views: i64,
    pub total_comments: i64,
}

#[derive(Debug, Serialize)]
pub struct MediaRef {
    pub id: i64,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct DocumentRef {
    pub id: i64,
    pub document_type: String,
    pub file_url: String,
    pub uploaded_at: i64,
}

/// Full detail payload: the row plus nested media and the donation list.
#[derive(Debug, Serialize)]
pub struct PublicationDetail {
    pub id: i64,
    pub author_id: i64,
    pub author_email: String,
    pub title: String,
    pub category: String,
    pub description: String,
    pub bank_details: String,
    pub amount: f64,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub status: String,
    pub verification_status: String,
    pub is_archived: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub expires_at: Option<i64>,
    pub images: Vec<MediaRef>,
    pub videos: Vec<MediaRef>,
    pub documents: Vec<DocumentRef>,
    pub donations: Vec<DonationEntry>,
    pub total_donated: f64,
    pub total_views: i64,
    pub total_comments: i64,
    pub donation_percentage: f64,
}

/// Filters for the list endpoint. `status` has already been access-checked
/// by the caller; `only_author` restricts to that author's rows when set.
pub struct PublicationFilter {
    pub search: Option<SearchMode>,
    pub status: String,
    pub only_author: Option<i64>,
    pub categories: Option<Vec<String>>,
    pub created_between: Option<(i64, i64)>,
    pub amount_between: Option<(f64, f64)>,
    pub donated_between: Option<(f64, f64)>,
    /// Validated ORDER BY expression from `search::ordering_clause`.
    pub ordering: &'static str,
}

impl Default for PublicationFilter {
    fn default() -> Self {
        Self {
            search: None,
            status: "active".to_string(),
            only_author: None,
            categories: None,
            created_between: None,
            amount_between: None,
            donated_between: None,
            ordering: "p.created_at desc",
        }
    }
}

const LIST_BASE: &str = r#"
    select
        p.id,            -- 0
        p.author_id,     -- 1
        u.email,         -- 2
        p.title,         -- 3
        p.category,      -- 4
        p.description,   -- 5
        p.amount,        -- 6
        p.status,        -- 7
        p.is_archived,   -- 8
        p.created_at,    -- 9
        p.updated_at,    -- 10
        p.expires_at,    -- 11
        coalesce(d.total, 0)  as total_donated,  -- 12
        coalesce(v.cnt, 0)    as total_views,    -- 13
        coalesce(c.cnt, 0)    as total_comments  -- 14
    from publications p
    join users u on u.id = p.author_id
    left join (
        select publication_id, sum(amount) as total
        from donations group by publication_id
    ) d on d.publication_id = p.id
    left join (
        select publication_id, count(*) as cnt
        from views group by publication_id
    ) v on v.publication_id = p.id
    left join (
        select publication_id, count(*) as cnt
        from comments group by publication_id
    ) c on c.publication_id = p.id
"#;

fn list_row_from_row(row: &Row) -> rusqlite::Result<PublicationListRow> {
    Ok(PublicationListRow {
        id: row.get(0)?,
        author_id: row.get(1)?,
        author_email: row.get(2)?,
        title: row.get(3)?,
        category: row.get(4)?,
        description: row.get(5)?,
        amount: row.get(6)?,
        status: row.get(7)?,
        is_archived: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        expires_at: row.get(11)?,
        total_donated: row.get(12)?,
        total_views: row.get(13)?,
        total_comments: row.get(14)?,
    })
}

fn run_list_query(
    conn: &Connection,
    sql: &str,
    values: &[Value],
) -> Result<Vec<PublicationListRow>, ServerError> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| ServerError::DbError(format!("prepare list query failed: {e}")))?;

    let refs: Vec<&dyn rusqlite::ToSql> =
        values.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
    let rows = stmt
        .query_map(refs.as_slice(), list_row_from_row)
        .map_err(|e| ServerError::DbError(format!("list query failed: {e}")))?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| ServerError::DbError(format!("list row failed: {e}")))?);
    }
    Ok(out)
}

/// Search, filter, and order the publication list in one batched query.
pub fn list_publications(
    conn: &Connection,
    filter: &PublicationFilter,
) -> Result<Vec<PublicationListRow>, ServerError> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    clauses.push("p.status = ?".to_string());
    values.push(Value::Text(filter.status.clone()));

    if let Some(author_id) = filter.only_author {
        clauses.push("p.author_id = ?".to_string());
        values.push(Value::Integer(author_id));
    }

    match &filter.search {
        Some(SearchMode::AnyWord(words)) => {
            // any word may hit any of the three columns
            let mut ors = Vec::new();
            for word in words {
                let like = format!("%{word}%");
                ors.push(
                    "(p.title like ? or p.description like ? or u.email like ?)".to_string(),
                );
                values.push(Value::Text(like.clone()));
                values.push(Value::Text(like.clone()));
                values.push(Value::Text(like));
            }
            if !ors.is_empty() {
                clauses.push(format!("({})", ors.join(" or ")));
            }
        }
        Some(SearchMode::Phrase(phrase)) => {
            let like = format!("%{phrase}%");
            clauses
                .push("(p.title like ? or p.description like ? or u.email like ?)".to_string());
            values.push(Value::Text(like.clone()));
            values.push(Value::Text(like.clone()));
            values.push(Value::Text(like));
        }
        None => {}
    }

    if let Some(categories) = &filter.categories {
        if !categories.is_empty() {
            let placeholders = vec!["?"; categories.len()].join(", ");
            clauses.push(format!("p.category in ({placeholders})"));
            for c in categories {
                values.push(Value::Text(c.clone()));
            }
        }
    }

    if let Some((gte, lte)) = filter.created_between {
        clauses.push("p.created_at >= ? and p.created_at <= ?".to_string());
        values.push(Value::Integer(gte));
        values.push(Value::Integer(lte));
    }

    if let Some((gte, lte)) = filter.amount_between {
        clauses.push("p.amount >= ? and p.amount <= ?".to_string());
        values.push(Value::Real(gte));
        values.push(Value::Real(lte));
    }

    // aggregate bound goes against the joined total, not a raw column
    if let Some((gte, lte)) = filter.donated_between {
        clauses.push("coalesce(d.total, 0) >= ? and coalesce(d.total, 0) <= ?".to_string());
        values.push(Value::Real(gte));
        values.push(Value::Real(lte));
    }

    let sql = format!(
        "{LIST_BASE} where {} order by {}",
        clauses.join(" and "),
        filter.ordering
    );

    run_list_query(conn, &sql, &values)
}

/// Insert a publication with its media references in one transaction.
pub fn create_publication(
    conn: &mut Connection,
    author_id: i64,
    new: &NewPublication,
    now: i64,
) -> Result<i64, ServerError> {
    let tx = conn
        .transaction()
        .map_err(|e| ServerError::DbError(format!("begin tx failed: {e}")))?;

    tx.execute(
        "insert into publications
           (author_id, title, category, description, bank_details, amount,
            contact_name, contact_email, contact_phone,
            status, verification_status, created_at, updated_at, expires_at)
         values (?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', 'pending', ?, ?, ?)",
        params![
            author_id,
            new.title,
            new.category,
            new.description,
            new.bank_details,
            new.amount,
            new.contact_name,
            new.contact_email,
            new.contact_phone,
            now,
            now,
            new.expires_at
        ],
    )
    .map_err(|e| ServerError::DbError(format!("insert publication failed: {e}")))?;

    let publication_id = tx.last_insert_rowid();

    for url in &new.image_urls {
        tx.execute(
            "insert into publication_images (publication_id, url) values (?, ?)",
            params![publication_id, url],
        )
        .map_err(|e| ServerError::DbError(format!("insert image failed: {e}")))?;
    }
    for url in &new.video_urls {
        tx.execute(
            "insert into publication_videos (publication_id, url) values (?, ?)",
            params![publication_id, url],
        )
        .map_err(|e| ServerError::DbError(format!("insert video failed: {e}")))?;
    }

    tx.commit()
        .map_err(|e| ServerError::DbError(format!("commit tx failed: {e}")))?;

    Ok(publication_id)
}

pub fn get_author_id(conn: &Connection, publication_id: i64) -> Result<Option<i64>, ServerError> {
    conn.query_row(
        "select author_id from publications where id = ?",
        params![publication_id],
        |r| r.get(0),
    )
    .optional()
    .map_err(|e| ServerError::DbError(format!("select author failed: {e}")))
}

/// Assemble the full detail payload: the aggregate row plus nested media
/// and donations.
pub fn get_publication_detail(
    conn: &Connection,
    publication_id: i64,
) -> Result<Option<PublicationDetail>, ServerError> {
    let detail = conn
        .query_row(
            r#"
            select
                p.id,                  -- 0
                p.author_id,           -- 1
                u.email,               -- 2
                p.title,               -- 3
                p.category,            -- 4
                p.description,         -- 5
                p.bank_details,        -- 6
                p.amount,              -- 7
                p.contact_name,        -- 8
                p.contact_email,       -- 9
                p.contact_phone,       -- 10
                p.status,              -- 11
                p.verification_status, -- 12
                p.is_archived,         -- 13
                p.created_at,          -- 14
                p.updated_at,          -- 15
                p.expires_at,          -- 16
                coalesce(d.total, 0),  -- 17
                coalesce(v.cnt, 0),    -- 18
                coalesce(c.cnt, 0)     -- 19
            from publications p
            join users u on u.id = p.author_id
            left join (
                select publication_id, sum(amount) as total
                from donations group by publication_id
            ) d on d.publication_id = p.id
            left join (
                select publication_id, count(*) as cnt
                from views group by publication_id
            ) v on v.publication_id = p.id
            left join (
                select publication_id, count(*) as cnt
                from comments group by publication_id
            ) c on c.publication_id = p.id
            where p.id = ?
            "#,
            params![publication_id],
            |r| {
                let amount: f64 = r.get(7)?;
                let total_donated: f64 = r.get(17)?;
                Ok(PublicationDetail {
                    id: r.get(0)?,
                    author_id: r.get(1)?,
                    author_email: r.get(2)?,
                    title: r.get(3)?,
                    category: r.get(4)?,
                    description: r.get(5)?,
                    bank_details: r.get(6)?,
                    amount,
                    contact_name: r.get(8)?,
                    contact_email: r.get(9)?,
                    contact_phone: r.get(10)?,
                    status: r.get(11)?,
                    verification_status: r.get(12)?,
                    is_archived: r.get(13)?,
                    created_at: r.get(14)?,
                    updated_at: r.get(15)?,
                    expires_at: r.get(16)?,
                    images: Vec::new(),
                    videos: Vec::new(),
                    documents: Vec::new(),
                    donations: Vec::new(),
                    total_donated,
                    total_views: r.get(18)?,
                    total_comments: r.get(19)?,
                    donation_percentage: if amount > 0.0 {
                        total_donated / amount * 100.0
                    } else {
                        0.0
                    },
                })
            },
        )
        .optional()
        .map_err(|e| ServerError::DbError(format!("select publication failed: {e}")))?;

    let Some(mut detail) = detail else {
        return Ok(None);
    };

    detail.images = list_media(conn, "publication_images", publication_id)?;
    detail.videos = list_media(conn, "publication_videos", publication_id)?;
    detail.documents = list_documents(conn, publication_id)?;
    detail.donations = crate::db::donations::list_for_publication(conn, publication_id)?;

    Ok(Some(detail))
}

fn list_media(
    conn: &Connection,
    table: &str,
    publication_id: i64,
) -> Result<Vec<MediaRef>, ServerError> {
    let mut stmt = conn
        .prepare(&format!(
            "select id, url from {table} where publication_id = ? order by id"
        ))
        .map_err(|e| ServerError::DbError(format!("prepare media query failed: {e}")))?;

    let rows = stmt
        .query_map(params![publication_id], |r| {
            Ok(MediaRef {
                id: r.get(0)?,
                url: r.get(1)?,
            })
        })
        .map_err(|e| ServerError::DbError(format!("media query failed: {e}")))?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| ServerError::DbError(format!("media row failed: {e}")))?);
    }
    Ok(out)
}

fn list_documents(
    conn: &Connection,
    publication_id: i64,
) -> Result<Vec<DocumentRef>, ServerError> {
    let mut stmt = conn
        .prepare(
            "select id, document_type, file_url, uploaded_at
             from publication_documents
             where publication_id = ? order by id",
        )
        .map_err(|e| ServerError::DbError(format!("prepare documents query failed: {e}")))?;

    let rows = stmt
        .query_map(params![publication_id], |r| {
            Ok(DocumentRef {
                id: r.get(0)?,
                document_type: r.get(1)?,
                file_url: r.get(2)?,
                uploaded_at: r.get(3)?,
            })
        })
        .map_err(|e| ServerError::DbError(format!("documents query failed: {e}")))?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| ServerError::DbError(format!("document row failed: {e}")))?);
    }
    Ok(out)
}

/// Apply the non-None fields; always bumps updated_at.
pub fn update_publication(
    conn: &Connection,
    publication_id: i64,
    update: &PublicationUpdate,
    now: i64,
) -> Result<(), ServerError> {
    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(v) = &update.title {
        sets.push("title = ?");
        values.push(Value::Text(v.clone()));
    }
    if let Some(v) = &update.category {
        sets.push("category = ?");
        values.push(Value::Text(v.clone()));
    }
    if let Some(v) = &update.description {
        sets.push("description = ?");
        values.push(Value::Text(v.clone()));
    }
    if let Some(v) = &update.bank_details {
        sets.push("bank_details = ?");
        values.push(Value::Text(v.clone()));
    }
    if let Some(v) = update.amount {
        sets.push("amount = ?");
        values.push(Value::Real(v));
    }
    if let Some(v) = &update.contact_name {
        sets.push("contact_name = ?");
        values.push(Value::Text(v.clone()));
    }
    if let Some(v) = &update.contact_email {
        sets.push("contact_email = ?");
        values.push(Value::Text(v.clone()));
    }
    if let Some(v) = &update.contact_phone {
        sets.push("contact_phone = ?");
        values.push(Value::Text(v.clone()));
    }
    if let Some(v) = update.expires_at {
        sets.push("expires_at = ?");
        values.push(Value::Integer(v));
    }

    sets.push("updated_at = ?");
    values.push(Value::Integer(now));
    values.push(Value::Integer(publication_id));

    let sql = format!("update publications set {} where id = ?", sets.join(", "));
    let refs: Vec<&dyn rusqlite::ToSql> =
        values.iter().map(|v| v as &dyn rusqlite::ToSql).collect();

    conn.execute(&sql, refs.as_slice())
        .map_err(|e| ServerError::DbError(format!("update publication failed: {e}")))?;
    Ok(())
}

pub fn delete_publication(conn: &Connection, publication_id: i64) -> Result<(), ServerError> {
    conn.execute(
        "delete from publications where id = ?",
        params![publication_id],
    )
    .map_err(|e| ServerError::DbError(format!("delete publication failed: {e}")))?;
    Ok(())
}

/// The author's archived publications, newest first.
pub fn archived_for_author(
    conn: &Connection,
    author_id: i64,
) -> Result<Vec<PublicationListRow>, ServerError> {
    let sql = format!(
        "{LIST_BASE} where p.author_id = ? and p.is_archived = 1 order by p.created_at desc"
    );
    run_list_query(conn, &sql, &[Value::Integer(author_id)])
}

/// Active publications expiring within `within_secs` of `now`.
pub fn urgent_publications(
    conn: &Connection,
    now: i64,
    within_secs: i64,
) -> Result<Vec<PublicationListRow>, ServerError> {
    let sql = format!(
        "{LIST_BASE}
         where p.status = 'active'
           and p.is_archived = 0
           and p.expires_at is not null
           and p.expires_at <= ?
         order by p.expires_at"
    );
    run_list_query(conn, &sql, &[Value::Integer(now + within_secs)])
}

/// The author's running campaigns: active, unexpired, target not yet met.
pub fn active_for_author(
    conn: &Connection,
    author_id: i64,
    now: i64,
) -> Result<Vec<PublicationListRow>, ServerError> {
    let sql = format!(
        "{LIST_BASE}
         where p.author_id = ?
           and p.status = 'active'
           and p.is_archived = 0
           and (p.expires_at is null or p.expires_at > ?)
           and (d.total is null or d.total < p.amount)
         order by p.created_at desc"
    );
    run_list_query(
        conn,
        &sql,
        &[Value::Integer(author_id), Value::Integer(now)],
    )
}

/// The author's drafts still waiting on (or bounced by) moderation.
pub fn pending_for_author(
    conn: &Connection,
    author_id: i64,
) -> Result<Vec<PublicationListRow>, ServerError> {
    let sql = format!(
        "{LIST_BASE}
         where p.author_id = ?
           and p.status = 'pending'
           and p.verification_status in ('pending', 'rejected')
         order by p.created_at desc"
    );
    run_list_query(conn, &sql, &[Value::Integer(author_id)])
}
