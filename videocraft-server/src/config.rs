//! Server configuration, layered on [`videocraft_core::config::EngineConfig`]
//! with the HTTP-surface-only settings (bind address, CORS, auth token).

use std::env;
use videocraft_core::config::EngineConfig;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    /// Shared-secret bearer token required on every non-health request when
    /// set. `None` disables auth entirely (local/dev use).
    pub auth_token: Option<String>,
    pub engine: EngineConfig,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let engine = EngineConfig::from_env()?;

        let cors_allowed_origins = env::var("VIDEOCRAFT_CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host: env::var("VIDEOCRAFT_SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("VIDEOCRAFT_SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            cors_allowed_origins,
            auth_token: env::var("VIDEOCRAFT_AUTH_TOKEN").ok().filter(|s| !s.is_empty()),
            engine,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset() {
        // Scoped to this test only; avoids clobbering other tests' env.
        std::env::remove_var("VIDEOCRAFT_SERVER_PORT");
        std::env::remove_var("VIDEOCRAFT_AUTH_TOKEN");
        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.auth_token.is_none());
    }
}
