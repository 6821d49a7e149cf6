//! HTTP surface for Cardea.
//!
//! Exposes an axum [`Router`] over any backend implementing both
//! [`DirectoryStore`] and [`IdentityProvider`], plus the `server` binary's
//! configuration type. Lifecycle triggers fire from the mutation handlers;
//! the scheduled audit scan runs as a background task owned by the binary.

pub mod auth;
pub mod error;
pub mod etag;
pub mod handlers;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, patch, post},
};
use cardea_core::{identity::IdentityProvider, store::DirectoryStore};
use cardea_functions::RateLimiter;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_rate_limit() -> u32 { 30 }
fn default_scan_interval_hours() -> u64 { 24 }

/// Runtime server configuration, deserialised from `config.toml` plus
/// `CARDEA_*` environment overrides.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,

  /// Deploy-time secret signing the ID tokens. Opaque; never logged.
  pub token_secret: String,

  /// The single address the bootstrap rule promotes on first signup.
  pub bootstrap_admin_email: String,

  /// Callable-mutation ceiling per origin per minute.
  #[serde(default = "default_rate_limit")]
  pub rate_limit_per_minute: u32,

  /// Cadence of the scheduled audit scan.
  #[serde(default = "default_scan_interval_hours")]
  pub audit_scan_interval_hours: u64,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S> {
  pub store:   Arc<S>,
  pub config:  Arc<ServerConfig>,
  pub limiter: Arc<RateLimiter>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the Cardea API.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: DirectoryStore + IdentityProvider + Clone + Send + Sync + 'static,
{
  Router::new()
    .route("/auth/signup", post(handlers::auth::signup::<S>))
    .route("/auth/login", post(handlers::auth::login::<S>))
    .route(
      "/me",
      get(handlers::auth::me::<S>).delete(handlers::auth::delete_me::<S>),
    )
    .route("/cards", post(handlers::cards::create::<S>))
    .route(
      "/cards/{id}",
      get(handlers::cards::share::<S>).patch(handlers::cards::update::<S>),
    )
    .route("/cards/{id}/vcard", get(handlers::cards::vcard::<S>))
    .route("/users/{uid}", patch(handlers::users::update::<S>))
    .route(
      "/functions/assign-role",
      post(handlers::functions::assign_role::<S>),
    )
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────
