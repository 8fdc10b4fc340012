use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongodb_uri: String,
    pub mongodb_database: String,

    pub client_origin: String,
    pub port: u16,

    pub cache_max_size: usize,
    pub cache_default_ttl_seconds: u64,
    pub cache_cleanup_interval_seconds: u64,

    pub db_connect_timeout_seconds: u64,
}

impl Config {
    pub fn init() -> Config {
        let mongodb_uri = std::env::var("MONGODB_URI")
            .expect("MONGODB_URI must be set");
        let mongodb_database = std::env::var("MONGODB_DATABASE")
            .expect("MONGODB_DATABASE must be set");

        let client_origin = std::env::var("CLIENT_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_owned());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".to_owned())
            .parse::<u16>()
            .expect("PORT must be a number");

        let cache_max_size = std::env::var("CACHE_MAX_SIZE")
            .unwrap_or_else(|_| "1000".to_owned())
            .parse::<usize>()
            .expect("CACHE_MAX_SIZE must be a number");
        let cache_default_ttl_seconds = std::env::var("CACHE_DEFAULT_TTL_SECONDS")
            .unwrap_or_else(|_| "300".to_owned())
            .parse::<u64>()
            .expect("CACHE_DEFAULT_TTL_SECONDS must be a number");
        let cache_cleanup_interval_seconds = std::env::var("CACHE_CLEANUP_INTERVAL_SECONDS")
            .unwrap_or_else(|_| "300".to_owned())
            .parse::<u64>()
            .expect("CACHE_CLEANUP_INTERVAL_SECONDS must be a number");

        let db_connect_timeout_seconds = std::env::var("DB_CONNECT_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "10".to_owned())
            .parse::<u64>()
            .expect("DB_CONNECT_TIMEOUT_SECONDS must be a number");

        Config {
            mongodb_uri,
            mongodb_database,
            client_origin,
            port,
            cache_max_size,
            cache_default_ttl_seconds,
            cache_cleanup_interval_seconds,
            db_connect_timeout_seconds,
        }
    }
}
