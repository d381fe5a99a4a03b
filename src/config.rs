use std::env;
use std::net::SocketAddr;

use crate::error::AppError;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://duetrack.db?mode=rwc";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_CALENDAR_NAME: &str = "My Courses";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub bind_addr: SocketAddr,
    /// Written to the feed as `X-ORIGINAL-URL` when set.
    pub site_url: Option<String>,
    /// Base used for shareable download and subscription links.
    pub public_base_url: String,
    pub calendar_name: String,
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let database_url =
            non_empty("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let max_connections = match non_empty("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw.parse::<u32>().map_err(|_| {
                AppError::Config(format!("DATABASE_MAX_CONNECTIONS is not a number: {}", raw))
            })?,
            None => 5,
        };

        let raw_addr = non_empty("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr
            .parse::<SocketAddr>()
            .map_err(|e| AppError::Config(format!("BIND_ADDR {} is invalid: {}", raw_addr, e)))?;

        let site_url = non_empty("SITE_URL");
        let public_base_url =
            non_empty("PUBLIC_BASE_URL").unwrap_or_else(|| format!("http://{}", bind_addr));
        let calendar_name =
            non_empty("CALENDAR_NAME").unwrap_or_else(|| DEFAULT_CALENDAR_NAME.to_string());

        Ok(Self {
            database_url,
            max_connections,
            bind_addr,
            site_url,
            public_base_url,
            calendar_name,
        })
    }
}
