use axum::http::HeaderMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use crate::protocol::UserBrief;

/// Default token lifetime: 7 days.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// JWT payload carried by every connection. All three identity claims must
/// be present, non-empty strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn brief(&self) -> UserBrief {
        UserBrief {
            user_id: self.user_id.clone(),
            username: self.username.clone(),
        }
    }
}

/// Mint a signed token (HMAC-SHA256). Used by the dev CLI and tests; in a
/// full deployment the identity service issues these.
pub fn issue(
    secret: &str,
    user_id: &str,
    username: &str,
    email: &str,
    ttl_secs: u64,
) -> Result<String, AuthError> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        user_id: user_id.to_string(),
        username: username.to_string(),
        email: email.to_string(),
        iat: now,
        exp: now + ttl_secs as i64,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validate a bearer token and return its claims. Signature, expiry and
/// claim completeness are all checked; any failure maps to an [`AuthError`].
pub fn verify(secret: &str, token: &str) -> Result<Claims, AuthError> {
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|err| match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
        _ => AuthError::InvalidToken,
    })?;

    let claims = data.claims;
    if claims.user_id.trim().is_empty()
        || claims.username.trim().is_empty()
        || claims.email.trim().is_empty()
    {
        return Err(AuthError::IncompleteClaims);
    }
    Ok(claims)
}

/// Pull the bearer token out of the handshake: the `Authorization: Bearer`
/// header wins, then the `token` query parameter.
pub fn token_from_handshake<'a>(
    headers: &'a HeaderMap,
    query_token: Option<&'a str>,
) -> Option<&'a str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .or(query_token.filter(|token| !token.is_empty()))
}
