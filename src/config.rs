// config.rs
use std::time::Duration;

use crate::realtime::socket::Heartbeat;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub port: u16,
    pub upload_dir: String,
    pub max_image_mb: usize,
    pub ws_heartbeat_secs: u64,
    pub ws_client_timeout_secs: u64,
    pub allowed_origins: Vec<String>,
    pub log_level: String,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .unwrap_or_else(|_| panic!("{} has an invalid value: {}", key, value)),
        Err(_) => default,
    }
}

impl Config {
    pub fn init() -> Config {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        let jwt_secret = std::env::var("JWT_SECRET_KEY").expect("JWT_SECRET_KEY must be set");

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:8081,http://localhost:19006".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Config {
            database_url,
            jwt_secret,
            jwt_maxage: env_or("JWT_MAXAGE", 60),
            port: env_or("PORT", 8000),
            upload_dir: std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            max_image_mb: env_or("MAX_IMAGE_MB", 5),
            ws_heartbeat_secs: env_or("WS_HEARTBEAT_SECS", 15),
            ws_client_timeout_secs: env_or("WS_CLIENT_TIMEOUT_SECS", 45),
            allowed_origins,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".to_string()),
        }
    }

    pub fn heartbeat(&self) -> Heartbeat {
        Heartbeat {
            interval: Duration::from_secs(self.ws_heartbeat_secs.max(1)),
            client_timeout: Duration::from_secs(self.ws_client_timeout_secs.max(1)),
        }
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Config {
        Config {
            database_url: None,
            jwt_secret: "test-secret".to_string(),
            jwt_maxage: 60,
            port: 0,
            upload_dir: std::env::temp_dir()
                .join("hirechat-test-uploads")
                .to_string_lossy()
                .into_owned(),
            max_image_mb: 1,
            ws_heartbeat_secs: 15,
            ws_client_timeout_secs: 45,
            allowed_origins: Vec::new(),
            log_level: "debug".to_string(),
        }
    }
}
