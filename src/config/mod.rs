//! Server configuration: serde types with per-field defaults, loaded from
//! `config.json` when present, then overridden by environment variables.

mod defaults;
mod logging;

pub use logging::{LogFormat, LogLevel, LogRotation, LoggingConfig};

use serde::{Deserialize, Serialize};

use defaults::{
    default_cors_origins, default_initial_clock_ms, default_invite_origin, default_jwt_secret,
    default_port, default_room_code_length, default_send_queue_capacity, default_token_ttl_secs,
};

/// Token verification settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    /// Shared HMAC-SHA256 secret for JWT verification.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Lifetime of tokens minted by the dev CLI (seconds).
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_ttl_secs: default_token_ttl_secs(),
        }
    }
}

/// Room and game session settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    /// Length of generated room codes.
    #[serde(default = "default_room_code_length")]
    pub room_code_length: usize,
    /// Per-side clock budget at game start (milliseconds).
    #[serde(default = "default_initial_clock_ms")]
    pub initial_clock_ms: i64,
    /// Per-connection outbound queue depth before frames are dropped.
    #[serde(default = "default_send_queue_capacity")]
    pub send_queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            room_code_length: default_room_code_length(),
            initial_clock_ms: default_initial_clock_ms(),
            send_queue_capacity: default_send_queue_capacity(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Comma-separated allowed origins, `*` for permissive.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
    /// Base URL used when composing invite links.
    #[serde(default = "default_invite_origin")]
    pub invite_origin: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            cors_origins: default_cors_origins(),
            invite_origin: default_invite_origin(),
            auth: AuthConfig::default(),
            session: SessionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Load configuration: `config.json` in the working directory when present
/// (path overridable via `GAMBIT_CONFIG`), code defaults otherwise, then
/// environment overrides on top.
pub fn load() -> AppConfig {
    let path = std::env::var("GAMBIT_CONFIG").unwrap_or_else(|_| "config.json".to_string());
    let mut cfg = match std::fs::read_to_string(&path) {
        Ok(raw) => match serde_json::from_str::<AppConfig>(&raw) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("Failed to parse {path}: {err}; using defaults");
                AppConfig::default()
            }
        },
        Err(_) => AppConfig::default(),
    };
    apply_env_overrides(&mut cfg);
    cfg
}

fn apply_env_overrides(cfg: &mut AppConfig) {
    if let Ok(port) = std::env::var("GAMBIT_PORT") {
        match port.parse() {
            Ok(port) => cfg.port = port,
            Err(_) => eprintln!("Ignoring non-numeric GAMBIT_PORT={port}"),
        }
    }
    if let Ok(secret) = std::env::var("GAMBIT_JWT_SECRET") {
        cfg.auth.jwt_secret = secret;
    }
    if let Ok(origin) = std::env::var("GAMBIT_INVITE_ORIGIN") {
        cfg.invite_origin = origin;
    }
}

/// Refuse configurations that would compromise token verification. Called at
/// startup and by `--validate-config`.
pub fn validate(cfg: &AppConfig) -> Result<(), String> {
    let mut problems = Vec::new();
    if cfg.auth.jwt_secret.trim().is_empty() {
        problems.push("auth.jwt_secret must not be empty".to_string());
    } else if cfg.auth.jwt_secret.len() < 16 {
        problems.push("auth.jwt_secret must be at least 16 characters".to_string());
    }
    if cfg.auth.jwt_secret == default_jwt_secret() {
        tracing::warn!("auth.jwt_secret is the development default; set GAMBIT_JWT_SECRET");
    }
    if cfg.session.initial_clock_ms <= 0 {
        problems.push("session.initial_clock_ms must be positive".to_string());
    }
    if cfg.session.room_code_length < crate::protocol::types::MIN_ROOM_CODE_LENGTH {
        problems.push(format!(
            "session.room_code_length must be at least {}",
            crate::protocol::types::MIN_ROOM_CODE_LENGTH
        ));
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems.join("\n"))
    }
}
