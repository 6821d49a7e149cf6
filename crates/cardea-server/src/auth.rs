//! Bearer-token extractors and caller-origin resolution.

use std::net::SocketAddr;

use axum::{
  extract::{ConnectInfo, FromRequestParts},
  http::{HeaderMap, header, request::Parts},
};
use cardea_core::{
  Error, identity::IdentityProvider, store::DirectoryStore, token::IdToken,
};

use crate::{AppState, error::ApiError};

// ─── Bearer auth ─────────────────────────────────────────────────────────────

/// Verified token payload; present in a handler means the request carried a
/// valid, unexpired ID token.
///
/// Privilege decisions must not stop here — the token's claims may predate a
/// revocation. Handlers that gate on `admin` re-read the principal.
#[derive(Debug, Clone)]
pub struct AuthContext(pub IdToken);

async fn verify_bearer<S>(
  headers: &HeaderMap,
  state: &AppState<S>,
) -> Result<IdToken, Error>
where
  S: DirectoryStore + IdentityProvider + Clone + Send + Sync + 'static,
{
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthenticated)?;

  let token = header_val
    .strip_prefix("Bearer ")
    .ok_or(Error::Unauthenticated)?;

  state.store.verify_token(token).await
}

impl<S> FromRequestParts<AppState<S>> for AuthContext
where
  S: DirectoryStore + IdentityProvider + Clone + Send + Sync + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = verify_bearer(&parts.headers, state)
      .await
      .map_err(|_| ApiError(Error::Unauthenticated))?;
    Ok(AuthContext(token))
  }
}

/// Like [`AuthContext`] but never rejects: absent or invalid credentials
/// yield `None`. Used by the callable mutation, which folds the missing
/// case into its own `unauthenticated` error after rate limiting.
#[derive(Debug, Clone)]
pub struct MaybeAuth(pub Option<IdToken>);

impl<S> FromRequestParts<AppState<S>> for MaybeAuth
where
  S: DirectoryStore + IdentityProvider + Clone + Send + Sync + 'static,
{
  type Rejection = std::convert::Infallible;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    Ok(MaybeAuth(verify_bearer(&parts.headers, state).await.ok()))
  }
}

// ─── Caller origin ───────────────────────────────────────────────────────────

/// The rate-limit key: first `X-Forwarded-For` hop if present, else the
/// socket peer address.
#[derive(Debug, Clone)]
pub struct CallerOrigin(pub String);

impl<S> FromRequestParts<AppState<S>> for CallerOrigin
where
  S: DirectoryStore + IdentityProvider + Clone + Send + Sync + 'static,
{
  type Rejection = std::convert::Infallible;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let forwarded = parts
      .headers
      .get("x-forwarded-for")
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.split(',').next())
      .map(|v| v.trim().to_owned())
      .filter(|v| !v.is_empty());

    let origin = forwarded.unwrap_or_else(|| {
      parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
    });

    Ok(CallerOrigin(origin))
  }
}
