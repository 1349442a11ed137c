//! Holder identity for reservation endpoints.
//!
//! With a secret configured every request must carry an HS256 bearer token
//! and the holder is its `sub` claim. Without one the holder is read from the
//! `x-holder-id` header, for deployments behind a trusted gateway.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use shared::{messages, ApiResponse, ErrorKind};
use tracing::warn;

pub const HOLDER_HEADER: &str = "x-holder-id";

/// The caller on whose behalf stock is held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holder(pub String);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

#[derive(Clone)]
pub enum Authenticator {
    Jwt(Arc<JwtVerifier>),
    HolderHeader,
}

pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.key, &self.validation).map(|data| data.claims)
    }
}

impl Authenticator {
    pub fn from_secret(secret: Option<&str>) -> Self {
        match secret.filter(|s| !s.is_empty()) {
            Some(secret) => Authenticator::Jwt(Arc::new(JwtVerifier::new(secret))),
            None => Authenticator::HolderHeader,
        }
    }

    fn holder(&self, headers: &HeaderMap) -> Result<Option<Holder>, &'static str> {
        match self {
            Authenticator::HolderHeader => Ok(headers
                .get(HOLDER_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| Holder(v.to_string()))),
            Authenticator::Jwt(verifier) => {
                let token = headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or(messages::AUTHORIZATION_REQUIRED)?;
                let token = token.strip_prefix("Bearer ").unwrap_or(token);
                let claims = verifier.verify(token).map_err(|e| {
                    warn!("Rejected bearer token: {}", e);
                    messages::INVALID_TOKEN
                })?;
                Ok(Some(Holder(claims.sub)))
            }
        }
    }
}

pub async fn authenticate(State(auth): State<Authenticator>, mut req: Request, next: Next) -> Response {
    match auth.holder(req.headers()) {
        Ok(holder) => {
            if let Some(holder) = holder {
                req.extensions_mut().insert(holder);
            }
            next.run(req).await
        }
        Err(message) => (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::<()>::failed(ErrorKind::Unauthorized, message)),
        )
            .into_response(),
    }
}
