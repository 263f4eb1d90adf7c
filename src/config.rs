// Configuration module for tagsrv
// Reads from environment variables with sensible defaults

use std::env;
use std::sync::OnceLock;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Tagging tool executable (TAGSRV_CTAGS_BIN)
    pub ctags_bin: String,

    /// Maximum token length in bytes for cursor queries (TAGSRV_TOKEN_MAX_LENGTH)
    pub token_max_length: usize,

    /// Maximum HTTP request body size in bytes (TAGSRV_HTTP_BODY_LIMIT)
    pub http_body_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ctags_bin: "ctags".to_string(),
            token_max_length: 512,
            http_body_limit: 2 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(val) = env::var("TAGSRV_CTAGS_BIN") {
            if !val.trim().is_empty() {
                config.ctags_bin = val;
            } else {
                eprintln!(
                    "tagsrv: Warning: Empty TAGSRV_CTAGS_BIN value, using default: {}",
                    config.ctags_bin
                );
            }
        }

        if let Ok(val) = env::var("TAGSRV_TOKEN_MAX_LENGTH") {
            if let Ok(parsed) = val.parse() {
                config.token_max_length = parsed;
            } else {
                eprintln!(
                    "tagsrv: Warning: Invalid TAGSRV_TOKEN_MAX_LENGTH value: {}, using default: {}",
                    val, config.token_max_length
                );
            }
        }

        if let Ok(val) = env::var("TAGSRV_HTTP_BODY_LIMIT") {
            if let Ok(parsed) = val.parse() {
                config.http_body_limit = parsed;
            } else {
                eprintln!(
                    "tagsrv: Warning: Invalid TAGSRV_HTTP_BODY_LIMIT value: {}, using default: {}",
                    val, config.http_body_limit
                );
            }
        }

        config
    }

    /// Get the global configuration instance
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(Config::from_env)
    }
}
