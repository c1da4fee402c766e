use std::collections::HashMap;

use astra::{Body, Request};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::auth::login::{LoginConfig, LoginService};
use crate::auth::sessions;
use crate::auth::verification::{RegisterInput, RegistrationConfig, RegistrationService};
use crate::db::publications::{NewPublication, PublicationFilter, PublicationUpdate};
use crate::db::{aggregates, donations, engagement, publications, Database};
use crate::domain::publication::PublicationSnapshot;
use crate::domain::ranking::{rank_top_publications, RankingConfig, SECS_PER_DAY};
use crate::domain::recommend::{recommend_for_user, RecommendConfig};
use crate::domain::search::{ordering_clause, search_mode};
use crate::errors::ServerError;
use crate::mailer::BrevoMailer;
use crate::responses::{json_response, json_response_with_status, ResultResp};

/// Everything a request handler needs, shared across worker threads.
pub struct App {
    pub db: Database,
    pub mailer: Option<BrevoMailer>,
    pub site_url: String,
    pub ranking: RankingConfig,
    pub recommend: RecommendConfig,
}

pub fn handle(req: Request, app: &App) -> ResultResp {
    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();
    let query = parse_query(req.uri().query());
    let auth = bearer_token(&req);
    let body = req.into_body();
    let now = Utc::now().timestamp();

    match (method.as_str(), path.as_str()) {
        ("POST", "/api/auth/register") => auth_register(app, body, now),
        ("GET", "/api/auth/verify") => auth_verify(app, &query),
        ("POST", "/api/auth/login") => auth_login(app, body, now),

        ("GET", "/api/publications") => publications_list(app, &query, &auth, now),
        ("POST", "/api/publications") => publications_create(app, &auth, body, now),

        ("GET", "/api/publications/top") => publications_top(app, now),
        ("GET", "/api/publications/recommended") => publications_recommended(app, &auth, now),
        ("GET", "/api/publications/urgent") => publications_urgent(app, now),
        ("GET", "/api/publications/archived") => publications_archived(app, &auth, now),
        ("GET", "/api/publications/active") => publications_my_active(app, &auth, now),
        ("GET", "/api/publications/pending") => publications_my_pending(app, &auth, now),

        _ => {
            if let Some(rest) = path.strip_prefix("/api/publications/") {
                return publication_subroutes(app, &auth, body, method.as_str(), rest, now);
            }
            Err(ServerError::NotFound)
        }
    }
}

fn publication_subroutes(
    app: &App,
    auth: &Option<String>,
    body: Body,
    method: &str,
    rest: &str,
    now: i64,
) -> ResultResp {
    let mut segments = rest.splitn(2, '/');
    let id: i64 = segments
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or(ServerError::NotFound)?;

    match (method, segments.next()) {
        ("GET", None) => publication_detail(app, auth, id, now),
        ("PUT", None) => publication_update(app, auth, body, id, now),
        ("DELETE", None) => publication_delete(app, auth, id, now),
        ("POST", Some("donations")) => publication_donate(app, auth, body, id, now),
        ("POST", Some("comments")) => publication_comment(app, auth, body, id, now),
        _ => Err(ServerError::NotFound),
    }
}

// ---------- auth ----------

#[derive(Deserialize)]
struct RegisterReq {
    email: String,
    password: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
}

fn auth_register(app: &App, body: Body, now: i64) -> ResultResp {
    let req: RegisterReq = read_json(body)?;

    let service = RegistrationService::new(RegistrationConfig::default());
    let registered = app.db.with_conn(|conn| {
        service.register(
            conn,
            &RegisterInput {
                email: req.email.clone(),
                password: req.password.clone(),
                first_name: req.first_name.clone(),
                last_name: req.last_name.clone(),
            },
            now,
        )
    })?;

    let verification_url = format!("{}{}", app.site_url, registered.link);
    match &app.mailer {
        Some(mailer) => {
            if let Err(e) = mailer.send_verification_email(&registered.email, &verification_url) {
                warn!("verification email to {} failed: {e}", registered.email);
            }
        }
        None => warn!("no mailer configured; verification link: {verification_url}"),
    }

    json_response_with_status(
        201,
        &json!({
            "message": "The user has been successfully registered. Please check your email for confirmation.",
            "user": {
                "first_name": registered.first_name,
                "last_name": registered.last_name,
                "email": registered.email,
            }
        }),
    )
}

fn auth_verify(app: &App, query: &HashMap<String, String>) -> ResultResp {
    let token = query
        .get("token")
        .ok_or_else(|| ServerError::BadRequest("missing token".into()))?;

    let service = RegistrationService::new(RegistrationConfig::default());
    app.db.with_conn(|conn| service.verify(conn, token))?;

    json_response(&json!({ "message": "Your email has been successfully verified!" }))
}

#[derive(Deserialize)]
struct LoginReq {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

fn auth_login(app: &App, body: Body, now: i64) -> ResultResp {
    let req: LoginReq = read_json(body)?;
    if req.email.is_empty() || req.password.is_empty() {
        return Err(ServerError::BadRequest(
            "Email and password are required.".into(),
        ));
    }

    let service = LoginService::new(LoginConfig::default());
    let logged_in = app
        .db
        .with_conn(|conn| service.login(conn, &req.email, &req.password, now))?;

    json_response(&json!({
        "message": "Login successful.",
        "token": logged_in.session_token,
        "user": {
            "id": logged_in.user_id,
            "email": logged_in.email,
        }
    }))
}

// ---------- publication collection ----------

fn publications_list(
    app: &App,
    query: &HashMap<String, String>,
    auth: &Option<String>,
    now: i64,
) -> ResultResp {
    let user = current_user(app, auth, now)?;

    let mut filter = PublicationFilter::default();

    if let Some(raw) = query.get("search") {
        filter.search = search_mode(raw);
    }

    let status = query.get("status").map(String::as_str).unwrap_or("active");
    if matches!(status, "expired" | "successful" | "pending") {
        // non-public lifecycle states are only listable by their author
        let Some((user_id, _)) = user else {
            return Err(ServerError::Forbidden("Access denied.".into()));
        };
        filter.status = status.to_string();
        filter.only_author = Some(user_id);
    } else {
        filter.status = status.to_string();
    }

    if let Some(raw) = query.get("category") {
        let categories: Vec<String> = raw
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if !categories.is_empty() {
            filter.categories = Some(categories);
        }
    }

    filter.created_between = both_bounds(query, "created_at__gte", "created_at__lte")?;
    filter.amount_between = both_bounds(query, "amount__gte", "amount__lte")?;
    filter.donated_between = both_bounds(query, "total_donated__gte", "total_donated__lte")?;

    if let Some(raw) = query.get("ordering") {
        if let Some(clause) = ordering_clause(raw) {
            filter.ordering = clause;
        }
    }

    let rows = app
        .db
        .with_conn(|conn| publications::list_publications(conn, &filter))?;
    json_response(&rows)
}

fn publications_create(app: &App, auth: &Option<String>, body: Body, now: i64) -> ResultResp {
    let (user_id, _) = require_user(app, auth, now)?;

    #[derive(Deserialize)]
    struct CreateReq {
        title: String,
        category: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        bank_details: String,
        amount: f64,
        #[serde(default)]
        contact_name: String,
        #[serde(default)]
        contact_email: String,
        #[serde(default)]
        contact_phone: String,
        #[serde(default)]
        expires_at: Option<i64>,
        #[serde(default)]
        uploaded_images: Vec<String>,
        #[serde(default)]
        uploaded_videos: Vec<String>,
    }

    let req: CreateReq = read_json(body)?;
    if req.title.trim().is_empty() {
        return Err(ServerError::BadRequest("title is required".into()));
    }
    if req.category.trim().is_empty() {
        return Err(ServerError::BadRequest("category is required".into()));
    }
    if req.amount <= 0.0 {
        return Err(ServerError::BadRequest("amount must be positive".into()));
    }

    let new = NewPublication {
        title: req.title,
        category: req.category,
        description: req.description,
        bank_details: req.bank_details,
        amount: req.amount,
        contact_name: req.contact_name,
        contact_email: req.contact_email,
        contact_phone: req.contact_phone,
        expires_at: req.expires_at,
        image_urls: req.uploaded_images,
        video_urls: req.uploaded_videos,
    };

    let detail = app.db.with_conn(|conn| {
        let id = publications::create_publication(conn, user_id, &new, now)?;
        publications::get_publication_detail(conn, id)?.ok_or(ServerError::InternalError)
    })?;

    json_response_with_status(201, &detail)
}

// ---------- single publication ----------

fn publication_detail(app: &App, auth: &Option<String>, id: i64, now: i64) -> ResultResp {
    let viewer = current_user(app, auth, now)?.map(|(user_id, _)| user_id);

    let detail = app.db.with_conn(|conn| {
        let Some(detail) = publications::get_publication_detail(conn, id)? else {
            return Err(ServerError::NotFound);
        };

        if detail.status != "active" {
            let allowed = match viewer {
                Some(user_id) => {
                    user_id == detail.author_id || donations::user_has_donated(conn, id, user_id)?
                }
                None => false,
            };
            if !allowed {
                return Err(ServerError::Forbidden(
                    "This publication is not available.".into(),
                ));
            }
        }

        if let Some(user_id) = viewer {
            engagement::record_view(conn, id, user_id, now)?;
        }

        Ok(detail)
    })?;

    json_response(&detail)
}

fn publication_update(app: &App, auth: &Option<String>, body: Body, id: i64, now: i64) -> ResultResp {
    let (user_id, _) = require_user(app, auth, now)?;

    #[derive(Deserialize)]
    struct UpdateReq {
        title: Option<String>,
        category: Option<String>,
        description: Option<String>,
        bank_details: Option<String>,
        amount: Option<f64>,
        contact_name: Option<String>,
        contact_email: Option<String>,
        contact_phone: Option<String>,
        expires_at: Option<i64>,
    }

    let req: UpdateReq = read_json(body)?;

    let detail = app.db.with_conn(|conn| {
        let author_id = publications::get_author_id(conn, id)?.ok_or(ServerError::NotFound)?;
        if author_id != user_id {
            return Err(ServerError::Forbidden(
                "You do not have permission to edit this publication.".into(),
            ));
        }

        let update = PublicationUpdate {
            title: req.title,
            category: req.category,
            description: req.description,
            bank_details: req.bank_details,
            amount: req.amount,
            contact_name: req.contact_name,
            contact_email: req.contact_email,
            contact_phone: req.contact_phone,
            expires_at: req.expires_at,
        };
        publications::update_publication(conn, id, &update, now)?;
        publications::get_publication_detail(conn, id)?.ok_or(ServerError::InternalError)
    })?;

    json_response(&detail)
}

fn publication_delete(app: &App, auth: &Option<String>, id: i64, now: i64) -> ResultResp {
    let (user_id, _) = require_user(app, auth, now)?;

    app.db.with_conn(|conn| {
        let author_id = publications::get_author_id(conn, id)?.ok_or(ServerError::NotFound)?;
        if author_id != user_id {
            return Err(ServerError::Forbidden(
                "You do not have permission to delete this publication.".into(),
            ));
        }
        publications::delete_publication(conn, id)
    })?;

    json_response(&json!({ "message": "Publication deleted successfully." }))
}

fn publication_donate(app: &App, auth: &Option<String>, body: Body, id: i64, now: i64) -> ResultResp {
    let (user_id, email) = require_user(app, auth, now)?;

    #[derive(Deserialize)]
    struct DonateReq {
        amount: f64,
        #[serde(default)]
        donor_name: Option<String>,
    }

    let req: DonateReq = read_json(body)?;
    if req.amount <= 0.0 {
        return Err(ServerError::BadRequest("amount must be positive".into()));
    }

    let donor_name = req.donor_name.unwrap_or(email);
    app.db.with_conn(|conn| {
        publications::get_author_id(conn, id)?.ok_or(ServerError::NotFound)?;
        donations::insert_donation(conn, id, user_id, &donor_name, req.amount, now)
    })?;

    json_response_with_status(201, &json!({ "message": "Donation recorded." }))
}

fn publication_comment(app: &App, auth: &Option<String>, body: Body, id: i64, now: i64) -> ResultResp {
    let (user_id, _) = require_user(app, auth, now)?;

    #[derive(Deserialize)]
    struct CommentReq {
        content: String,
    }

    let req: CommentReq = read_json(body)?;
    if req.content.trim().is_empty() {
        return Err(ServerError::BadRequest("content is required".into()));
    }

    app.db.with_conn(|conn| {
        publications::get_author_id(conn, id)?.ok_or(ServerError::NotFound)?;
        engagement::insert_comment(conn, id, user_id, &req.content, now)
    })?;

    json_response_with_status(201, &json!({ "message": "Comment added." }))
}

// ---------- feeds ----------

#[derive(Serialize)]
struct TopEntry {
    #[serde(flatten)]
    snapshot: PublicationSnapshot,
    score: f64,
}

fn publications_top(app: &App, now: i64) -> ResultResp {
    let cfg = &app.ranking;
    let created_after = now - cfg.window_days * SECS_PER_DAY;

    let entries = app.db.with_conn(|conn| {
        let snapshots = aggregates::fetch_active_snapshots(conn, created_after)?;
        let averages = aggregates::fetch_category_averages(conn)?;
        let ranked = rank_top_publications(&snapshots, &averages, now, cfg);

        let by_id: HashMap<i64, &PublicationSnapshot> =
            snapshots.iter().map(|s| (s.id, s)).collect();
        Ok(ranked
            .into_iter()
            .filter_map(|r| {
                by_id.get(&r.id).map(|s| TopEntry {
                    snapshot: (*s).clone(),
                    score: r.score,
                })
            })
            .collect::<Vec<_>>())
    })?;

    json_response(&entries)
}

fn publications_recommended(app: &App, auth: &Option<String>, now: i64) -> ResultResp {
    let (user_id, _) = require_user(app, auth, now)?;

    let recommended = app.db.with_conn(|conn| {
        let conn = &*conn;
        let history = aggregates::fetch_user_category_history(conn, user_id)?;
        recommend_for_user(
            &history,
            |categories| aggregates::fetch_active_by_categories(conn, categories, user_id),
            |limit| aggregates::fetch_top_popular_active(conn, limit),
            &app.recommend,
        )
    })?;

    json_response(&recommended)
}

fn publications_urgent(app: &App, now: i64) -> ResultResp {
    let rows = app
        .db
        .with_conn(|conn| publications::urgent_publications(conn, now, 2 * SECS_PER_DAY))?;
    json_response(&rows)
}

fn publications_archived(app: &App, auth: &Option<String>, now: i64) -> ResultResp {
    let (user_id, _) = require_user(app, auth, now)?;
    let rows = app
        .db
        .with_conn(|conn| publications::archived_for_author(conn, user_id))?;
    json_response(&rows)
}

fn publications_my_active(app: &App, auth: &Option<String>, now: i64) -> ResultResp {
    let (user_id, _) = require_user(app, auth, now)?;
    let rows = app
        .db
        .with_conn(|conn| publications::active_for_author(conn, user_id, now))?;
    json_response(&rows)
}

fn publications_my_pending(app: &App, auth: &Option<String>, now: i64) -> ResultResp {
    let (user_id, _) = require_user(app, auth, now)?;
    let rows = app
        .db
        .with_conn(|conn| publications::pending_for_author(conn, user_id))?;
    json_response(&rows)
}

// ---------- request plumbing ----------

fn read_json<T: serde::de::DeserializeOwned>(mut body: Body) -> Result<T, ServerError> {
    use std::io::Read;

    let mut buf = String::new();
    body.reader()
        .read_to_string(&mut buf)
        .map_err(|e| ServerError::BadRequest(format!("unreadable body: {e}")))?;

    serde_json::from_str(&buf).map_err(|e| ServerError::BadRequest(format!("invalid JSON: {e}")))
}

fn parse_query(raw: Option<&str>) -> HashMap<String, String> {
    let mut map = HashMap::new();

    if let Some(q) = raw {
        for (k, v) in url::form_urlencoded::parse(q.as_bytes()) {
            map.insert(k.into_owned(), v.into_owned());
        }
    }

    map
}

fn bearer_token(req: &Request) -> Option<String> {
    req.headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(String::from)
}

/// Parse both bounds of a range filter; the filter only applies when both
/// are present.
fn both_bounds<T: std::str::FromStr>(
    query: &HashMap<String, String>,
    gte_key: &str,
    lte_key: &str,
) -> Result<Option<(T, T)>, ServerError> {
    match (query.get(gte_key), query.get(lte_key)) {
        (Some(gte), Some(lte)) => {
            let gte = gte
                .parse()
                .map_err(|_| ServerError::BadRequest(format!("invalid {gte_key}")))?;
            let lte = lte
                .parse()
                .map_err(|_| ServerError::BadRequest(format!("invalid {lte_key}")))?;
            Ok(Some((gte, lte)))
        }
        _ => Ok(None),
    }
}

/// Resolve the session from the Authorization header, if any.
fn current_user(
    app: &App,
    auth: &Option<String>,
    now: i64,
) -> Result<Option<(i64, String)>, ServerError> {
    let Some(token) = auth else {
        return Ok(None);
    };
    app.db
        .with_conn(|conn| sessions::load_user_from_session(conn, token, now))
}

fn require_user(app: &App, auth: &Option<String>, now: i64) -> Result<(i64, String), ServerError> {
    current_user(app, auth, now)?
        .ok_or_else(|| ServerError::Unauthorized("Authentication required.".into()))
}
