mod config;
mod db;
mod error;
mod handler;
mod middleware;
mod models;
mod realtime;
mod routes;
mod service;
mod utils;

use std::sync::Arc;

use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use config::Config;
use dotenv::dotenv;
use routes::create_router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::filter::LevelFilter;

use crate::{
    db::{db::{DBClient, Database}, memory::MemoryStore},
    models::chatmodels::ParticipantRole,
    realtime::sessions::SessionRegistry,
    service::Services,
    utils::{
        clock::{Clock, SystemClock},
        image_utils::{ImageStore, LocalImageStore},
        token::create_token,
    },
};

#[derive(Debug, Clone)]
pub struct AppState {
    pub env: Config,
    pub sessions: SessionRegistry,
    pub services: Services,
}

impl AppState {
    pub fn new(
        db_client: Arc<dyn Database>,
        config: Config,
        clock: Arc<dyn Clock>,
        images: Arc<dyn ImageStore>,
    ) -> Self {
        let sessions = SessionRegistry::new();
        let services = Services::new(
            db_client,
            clock,
            sessions.clone(),
            images,
            config.max_image_mb,
        );

        Self {
            env: config,
            sessions,
            services,
        }
    }
}

/// `hirechat mint-token <user-id> <client|jobseeker>` prints a token for local testing.
fn mint_token(config: &Config, args: &[String]) -> Result<String, String> {
    let [user_id, role] = args else {
        return Err("usage: hirechat mint-token <user-id> <client|jobseeker>".to_string());
    };

    let user_id = uuid::Uuid::parse_str(user_id).map_err(|e| format!("Invalid user id: {}", e))?;
    let role: ParticipantRole = serde_json::from_value(serde_json::Value::String(role.clone()))
        .map_err(|_| format!("Unknown role: {}", role))?;

    create_token(
        &user_id.to_string(),
        role,
        config.jwt_secret.as_bytes(),
        config.jwt_maxage,
    )
    .map_err(|e| e.to_string())
}

async fn connect_store(config: &Config) -> Arc<dyn Database> {
    let Some(database_url) = &config.database_url else {
        tracing::warn!("DATABASE_URL not set - using the in-memory store, data will not survive a restart");
        return Arc::new(MemoryStore::new());
    };

    let pool = match PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
    {
        Ok(pool) => {
            tracing::info!("Connection to the database is successful");
            pool
        }
        Err(err) => {
            tracing::error!("Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    let db_client = DBClient::new(pool);
    if let Err(err) = db_client.migrate().await {
        tracing::error!("Failed to run migrations: {:?}", err);
        std::process::exit(1);
    }

    Arc::new(db_client)
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    let config = Config::init();

    let level = config
        .log_level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::DEBUG);
    tracing_subscriber::fmt().with_max_level(level).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("mint-token") {
        match mint_token(&config, &args[1..]) {
            Ok(token) => println!("{}", token),
            Err(err) => {
                eprintln!("{}", err);
                std::process::exit(2);
            }
        }
        return;
    }

    let db_client = connect_store(&config).await;

    if let Err(err) = tokio::fs::create_dir_all(&config.upload_dir).await {
        tracing::error!("Failed to create upload dir {}: {}", config.upload_dir, err);
        std::process::exit(1);
    }
    let images = Arc::new(LocalImageStore::new(config.upload_dir.clone()));

    let allowed_origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid origin {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT]);

    let app_state = Arc::new(AppState::new(
        db_client,
        config.clone(),
        Arc::new(SystemClock),
        images,
    ));

    let app = create_router(app_state).layer(cors);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("Failed to bind port {}: {}", config.port, err);
            std::process::exit(1);
        }
    };

    tracing::info!("Server is running on http://localhost:{}", config.port);

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::token::decode_token;

    #[test]
    fn mint_token_produces_a_decodable_token() {
        let config = Config::for_tests();
        let user_id = uuid::Uuid::new_v4();

        let token = mint_token(&config, &[user_id.to_string(), "jobseeker".to_string()]).unwrap();
        let user = decode_token(token, config.jwt_secret.as_bytes()).unwrap();
        assert_eq!(user.id, user_id);
        assert_eq!(user.role, ParticipantRole::JobSeeker);

        assert!(mint_token(&config, &[user_id.to_string()]).is_err());
        assert!(mint_token(&config, &[user_id.to_string(), "admin".to_string()]).is_err());
    }
}
