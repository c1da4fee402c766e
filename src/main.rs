use astra::Server;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use crate::db::{init_db, Database};
use crate::domain::ranking::RankingConfig;
use crate::domain::recommend::RecommendConfig;
use crate::jobs::spawn_lifecycle_job;
use crate::mailer::BrevoMailer;
use crate::responses::error_to_response;
use crate::router::{handle, App};

mod auth;
mod config;
mod db;
mod domain;
mod errors;
mod jobs;
mod mailer;
mod responses;
mod router;

#[cfg(test)]
mod tests;

fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cfg = Config::load();

    let db = Database::new(cfg.db_path.clone());
    if let Err(e) = init_db(&db, "sql/schema.sql") {
        error!("database initialization failed: {e}");
        std::process::exit(1);
    }

    let mailer = cfg.brevo_api_key.clone().map(|key| {
        BrevoMailer::new(key, cfg.sender_email.clone(), cfg.sender_name.clone())
    });
    if mailer.is_none() {
        info!("BREVO_API_KEY not set; verification links will only be logged");
    }

    spawn_lifecycle_job(db.clone(), cfg.job_interval_secs);

    let app = App {
        db,
        mailer,
        site_url: cfg.site_url.clone(),
        ranking: RankingConfig::default(),
        recommend: RecommendConfig::default(),
    };

    let addr: std::net::SocketAddr = cfg
        .bind_addr
        .parse()
        .unwrap_or_else(|e| panic!("Invalid BIND_ADDR: {e}"));
    info!("starting server at http://{addr}");

    let server = Server::bind(&addr).max_workers(8);

    let result = server.serve(move |req, _info| match handle(req, &app) {
        Ok(resp) => resp,
        Err(err) => error_to_response(err),
    });

    if let Err(e) = result {
        error!("server ended with error: {e}");
    }

    info!("server shut down cleanly");
}
