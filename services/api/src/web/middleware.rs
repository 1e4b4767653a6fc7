//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;
use tutoring_core::{Principal, Role, ServiceError};

use crate::error::ApiError;
use crate::web::state::AppState;

/// Claims carried by the bearer tokens the identity provider issues.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: i64,
    pub role: Role,
    /// Expiration time (seconds since the epoch)
    pub exp: u64,
}

/// Decodes and validates an HS256 token into the caller's identity.
pub fn decode_principal(token: &str, key: &DecodingKey) -> Result<Principal, ServiceError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = jsonwebtoken::decode::<Claims>(token, key, &validation).map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        ServiceError::Unauthorized
    })?;
    Ok(Principal::new(data.claims.sub, data.claims.role))
}

/// First hop of `X-Forwarded-For`, falling back to the socket peer.
fn source_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

/// Middleware that validates the bearer token and attaches a `Principal`.
///
/// If valid, inserts the principal into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ServiceError::Unauthorized)?;

    let mut principal = decode_principal(token, &state.decoding_key)?;
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    principal.source_ip = source_ip(req.headers(), peer);

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &[u8] = b"test-secret";

    fn token(claims: &Claims) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    fn in_an_hour() -> u64 {
        (chrono::Utc::now().timestamp() + 3600) as u64
    }

    #[test]
    fn valid_tokens_become_principals() {
        let jwt = token(&Claims {
            sub: 7,
            role: Role::Tutor,
            exp: in_an_hour(),
        });
        let principal = decode_principal(&jwt, &DecodingKey::from_secret(SECRET)).unwrap();
        assert_eq!(principal, Principal::new(7, Role::Tutor));
    }

    #[test]
    fn expired_or_foreign_tokens_are_unauthorized() {
        let expired = token(&Claims {
            sub: 7,
            role: Role::Admin,
            exp: 1_000,
        });
        assert!(matches!(
            decode_principal(&expired, &DecodingKey::from_secret(SECRET)),
            Err(ServiceError::Unauthorized)
        ));

        let foreign = token(&Claims {
            sub: 7,
            role: Role::Admin,
            exp: in_an_hour(),
        });
        assert!(matches!(
            decode_principal(&foreign, &DecodingKey::from_secret(b"other")),
            Err(ServiceError::Unauthorized)
        ));
    }

    #[test]
    fn forwarded_header_wins_over_peer() {
        let peer: SocketAddr = "10.0.0.5:4000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(source_ip(&headers, Some(peer)).as_deref(), Some("10.0.0.5"));

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(source_ip(&headers, Some(peer)).as_deref(), Some("203.0.113.9"));
        assert_eq!(source_ip(&HeaderMap::new(), None), None);
    }
}
