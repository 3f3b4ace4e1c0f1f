pub mod error;
pub mod token;

pub use error::AuthError;
pub use token::{issue, token_from_handshake, verify, Claims, DEFAULT_TOKEN_TTL_SECS};
