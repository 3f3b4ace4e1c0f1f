//! Default values for configuration fields, referenced by the
//! `#[serde(default = "...")]` attributes in the config types.

use crate::auth::DEFAULT_TOKEN_TTL_SECS;
use crate::protocol::types::{DEFAULT_INITIAL_CLOCK_MS, DEFAULT_ROOM_CODE_LENGTH};

pub fn default_port() -> u16 {
    3001
}

pub fn default_cors_origins() -> String {
    "*".to_string()
}

pub fn default_invite_origin() -> String {
    "http://localhost:5173".to_string()
}

pub fn default_jwt_secret() -> String {
    // Development fallback; config validation refuses to start a production
    // build with this value in place.
    "dev-secret-change-me".to_string()
}

pub fn default_token_ttl_secs() -> u64 {
    DEFAULT_TOKEN_TTL_SECS
}

pub fn default_room_code_length() -> usize {
    DEFAULT_ROOM_CODE_LENGTH
}

pub fn default_initial_clock_ms() -> i64 {
    DEFAULT_INITIAL_CLOCK_MS
}

pub fn default_send_queue_capacity() -> usize {
    64
}

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "gambit-server.log".to_string()
}
