//! Server configuration from environment variables with CLI overrides.

use std::path::PathBuf;

/// Default rate limit: 60 requests per minute per IP.
const DEFAULT_RATE_LIMIT: u64 = 60;

/// Default token lifetime: 24 hours.
const DEFAULT_TOKEN_TTL_SECS: i64 = 86_400;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Directory for attachment blobs.
    pub upload_dir: PathBuf,
    /// Token signing key file. `None` means a fresh ephemeral key.
    pub token_key: Option<PathBuf>,
    pub token_ttl_secs: i64,
    /// Max requests per minute per IP.
    pub rate_limit: u64,
    /// Bootstrap super-admin credentials, seeded only when the user
    /// directory is empty.
    pub admin_user: String,
    pub admin_password: String,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl ServerConfig {
    /// Resolve the configuration. CLI flags win over `PACTUM_*`
    /// environment variables, which win over the defaults.
    pub fn resolve(
        port: Option<u16>,
        upload_dir: Option<PathBuf>,
        token_key: Option<PathBuf>,
    ) -> Self {
        let port = port
            .or_else(|| env_var("PACTUM_PORT").and_then(|v| v.parse().ok()))
            .unwrap_or(8080);
        let upload_dir = upload_dir
            .or_else(|| env_var("PACTUM_UPLOAD_DIR").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("uploads"));
        let token_key = token_key.or_else(|| env_var("PACTUM_TOKEN_KEY").map(PathBuf::from));
        let token_ttl_secs = env_var("PACTUM_TOKEN_TTL_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        let rate_limit = env_var("PACTUM_RATE_LIMIT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_RATE_LIMIT);
        let admin_user = env_var("PACTUM_ADMIN_USER").unwrap_or_else(|| "admin".to_string());
        let admin_password =
            env_var("PACTUM_ADMIN_PASSWORD").unwrap_or_else(|| "admin123".to_string());

        ServerConfig {
            port,
            upload_dir,
            token_key,
            token_ttl_secs,
            rate_limit,
            admin_user,
            admin_password,
        }
    }
}
