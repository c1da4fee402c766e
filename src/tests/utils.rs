use std::io::Read;
use std::time::{SystemTime, UNIX_EPOCH};

use astra::{Body, Request, Response};
use http::Method;
use serde_json::Value;

use crate::db::connection::{init_db, Database};
use crate::domain::ranking::RankingConfig;
use crate::domain::recommend::RecommendConfig;
use crate::responses::error_to_response;
use crate::router::{handle, App};

/// Run a request through the router the way main's serve loop does,
/// turning errors into their HTTP responses.
pub fn dispatch(req: Request, app: &App) -> Response {
    match handle(req, app) {
        Ok(resp) => resp,
        Err(err) => error_to_response(err),
    }
}

pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

/// Returns a fresh test database using the production schema.
pub fn make_db(tag: &str) -> Database {
    let path = std::env::temp_dir().join(format!(
        "crowdaid_{tag}_{}.sqlite",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    let db = Database::new(path.to_string_lossy().to_string());
    init_db(&db, "sql/schema.sql").expect("Failed to initialize DB");
    db
}

pub fn make_app(tag: &str) -> App {
    App {
        db: make_db(tag),
        mailer: None,
        site_url: "http://testserver".to_string(),
        ranking: RankingConfig::default(),
        recommend: RecommendConfig::default(),
    }
}

pub fn get(uri: &str) -> Request {
    http::Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn get_authed(uri: &str, token: &str) -> Request {
    http::Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: &Value) -> Request {
    http::Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string().into_bytes()))
        .unwrap()
}

pub fn post_json_authed(uri: &str, body: &Value, token: &str) -> Request {
    http::Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string().into_bytes()))
        .unwrap()
}

pub fn put_json_authed(uri: &str, body: &Value, token: &str) -> Request {
    http::Request::builder()
        .method(Method::PUT)
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string().into_bytes()))
        .unwrap()
}

pub fn body_string(resp: Response) -> String {
    let mut body = String::new();
    resp.into_body().reader().read_to_string(&mut body).unwrap();
    body
}

pub fn body_json(resp: Response) -> Value {
    serde_json::from_str(&body_string(resp)).unwrap()
}

/// Register a user through the service (to get at the raw verification
/// token), verify them, and log them in. Returns (user_id, session token).
pub fn register_verified_user(app: &App, email: &str) -> (i64, String) {
    use crate::auth::login::{LoginConfig, LoginService};
    use crate::auth::verification::{RegisterInput, RegistrationConfig, RegistrationService};

    let now = now_unix();
    let reg = RegistrationService::new(RegistrationConfig::default());
    let registered = app
        .db
        .with_conn(|conn| {
            reg.register(
                conn,
                &RegisterInput {
                    email: email.to_string(),
                    password: "testpassword".to_string(),
                    first_name: "Test".to_string(),
                    last_name: "User".to_string(),
                },
                now,
            )
        })
        .unwrap();
    app.db
        .with_conn(|conn| reg.verify(conn, &registered.token))
        .unwrap();

    let login = LoginService::new(LoginConfig::default());
    let logged_in = app
        .db
        .with_conn(|conn| login.login(conn, email, "testpassword", now))
        .unwrap();

    (registered.user_id, logged_in.session_token)
}

/// Create a publication through the router and flip it to active directly
/// (status transitions are otherwise owned by the lifecycle sweep).
pub fn create_active_publication(app: &App, token: &str, title: &str, category: &str) -> i64 {
    let req = post_json_authed(
        "/api/publications",
        &serde_json::json!({
            "title": title,
            "category": category,
            "description": "test description",
            "amount": 10000.0,
        }),
        token,
    );
    let resp = dispatch(req, app);
    assert_eq!(resp.status(), 201);
    let created = body_json(resp);
    let id = created["id"].as_i64().unwrap();

    app.db
        .with_conn(|conn| {
            conn.execute(
                "update publications set status = 'active' where id = ?",
                rusqlite::params![id],
            )
            .map_err(|e| crate::errors::ServerError::DbError(e.to_string()))?;
            Ok(())
        })
        .unwrap();

    id
}
