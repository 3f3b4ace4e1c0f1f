use thiserror::Error;

/// Why a handshake token was rejected. Clients always see the flat
/// `"Unauthorized"` contract string; the variants exist for logging.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no bearer token in handshake")]
    MissingToken,
    #[error("token signature or shape invalid")]
    InvalidToken,
    #[error("token expired")]
    Expired,
    #[error("token claims incomplete")]
    IncompleteClaims,
}
