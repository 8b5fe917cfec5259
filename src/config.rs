use std::env;
use std::net::SocketAddr;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// When unset the service keeps allocations in memory.
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub cors_origin: String,
    pub db_max_connections: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| format!("BIND_ADDR is not a socket address: {}", e))?;

        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        let db_max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| format!("DB_MAX_CONNECTIONS must be a positive integer, got {:?}", raw))?,
            None => 25,
        };

        Ok(Self {
            database_url,
            bind_addr,
            cors_origin,
            db_max_connections,
        })
    }
}
