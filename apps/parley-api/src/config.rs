/// Parley API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Page size for the legacy global history endpoint.
    pub history_page_size: u32,
}

impl Config {
    /// Load configuration from environment variables. Everything has a
    /// default; the in-memory deployment needs no required variables.
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4010),
            history_page_size: std::env::var("HISTORY_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),
        }
    }
}
