use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CustomerClaims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

impl CustomerClaims {
    /// Customer subjects are uuids; a token with a malformed subject is
    /// treated as unauthenticated by the handlers.
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdminClaims {
    pub sub: String,
    pub role: String,
    pub permissions: Vec<String>,
    pub exp: usize,
}

fn decode_bearer<T: DeserializeOwned>(req: &Request, secret: &str) -> Result<T, StatusCode> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    decode::<T>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| StatusCode::UNAUTHORIZED)
}

/// Booking and cancellation require a CUSTOMER token; the claims land in
/// request extensions for the handler.
pub async fn customer_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let claims: CustomerClaims = decode_bearer(&req, &state.auth.secret)?;

    if claims.role != "CUSTOMER" {
        return Err(StatusCode::FORBIDDEN);
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Showtime scheduling/deletion requires an ADMIN token carrying the right
/// permission; the permission itself is checked in the handler.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let claims: AdminClaims = decode_bearer(&req, &state.auth.secret)?;

    if claims.role != "ADMIN" && claims.role != "SUPER_ADMIN" {
        return Err(StatusCode::FORBIDDEN);
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

pub fn has_permission(claims: &AdminClaims, permission: &str) -> bool {
    claims.permissions.iter().any(|p| p == permission)
}
