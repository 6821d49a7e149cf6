//! Handlers for `/auth/*` and `/me`.
//!
//! | Method   | Path           | Notes |
//! |----------|----------------|-------|
//! | `POST`   | `/auth/signup` | Creates the principal and fires the creation trigger |
//! | `POST`   | `/auth/login`  | Verifies credentials, reconciles the role |
//! | `GET`    | `/me`          | Current user document |
//! | `DELETE` | `/me`          | Deletes the principal and fires the deletion trigger |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use cardea_core::{
  Error, identity::IdentityProvider, principal::{Claims, NewPrincipal},
  role::Role, store::DirectoryStore, user::UserDocument,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError, auth::AuthContext};

const MIN_PASSWORD_LEN: usize = 8;

// ─── Bodies ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SignupBody {
  pub email:        String,
  pub password:     String,
  pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub email:    String,
  pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
  pub uid:   String,
  pub email: String,
  pub role:  Role,
  pub token: String,
}

// ─── Signup ──────────────────────────────────────────────────────────────────

/// `POST /auth/signup`
pub async fn signup<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<SignupBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DirectoryStore + IdentityProvider + Clone + Send + Sync + 'static,
{
  if !body.email.contains('@') {
    return Err(Error::InvalidArgument("email is not valid".into()).into());
  }
  if body.password.len() < MIN_PASSWORD_LEN {
    return Err(
      Error::InvalidArgument(format!(
        "password must be at least {MIN_PASSWORD_LEN} characters"
      ))
      .into(),
    );
  }

  let principal = state
    .store
    .create_principal(NewPrincipal {
      email:    body.email,
      password: body.password,
      claims:   Claims::default(),
    })
    .await?;

  // The creation trigger sets the bootstrap claim and writes the document.
  cardea_functions::on_create(
    state.store.as_ref(),
    state.store.as_ref(),
    &principal,
    &state.config.bootstrap_admin_email,
  )
  .await;

  if let Some(name) = body.display_name
    && let Some(mut user) = state.store.get_user(&principal.uid).await?
  {
    user.display_name = Some(name);
    user.updated_at = Utc::now();
    state.store.put_user(&user).await?;
  }

  let token = state.store.issue_token(&principal.uid).await?;
  let role = cardea_client::get_role(state.store.as_ref(), &principal.uid).await;

  Ok((
    StatusCode::CREATED,
    Json(SessionResponse {
      uid: principal.uid,
      email: principal.email,
      role,
      token,
    }),
  ))
}

// ─── Login ───────────────────────────────────────────────────────────────────

/// `POST /auth/login`
pub async fn login<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<LoginBody>,
) -> Result<Json<SessionResponse>, ApiError>
where
  S: DirectoryStore + IdentityProvider + Clone + Send + Sync + 'static,
{
  let principal = state
    .store
    .verify_password(&body.email, &body.password)
    .await?;

  // Repair any drift before the client sees a role.
  cardea_client::sync_role(state.store.as_ref(), state.store.as_ref(), &principal.uid)
    .await?;

  let token = state.store.issue_token(&principal.uid).await?;
  let role = cardea_client::get_role(state.store.as_ref(), &principal.uid).await;

  Ok(Json(SessionResponse {
    uid: principal.uid,
    email: principal.email,
    role,
    token,
  }))
}

// ─── Current user ────────────────────────────────────────────────────────────

/// `GET /me`
pub async fn me<S>(
  State(state): State<AppState<S>>,
  AuthContext(token): AuthContext,
) -> Result<Json<UserDocument>, ApiError>
where
  S: DirectoryStore + IdentityProvider + Clone + Send + Sync + 'static,
{
  let user = state
    .store
    .get_user(&token.sub)
    .await?
    .ok_or_else(|| Error::NotFound(format!("user {}", token.sub)))?;
  Ok(Json(user))
}

/// `DELETE /me` — delete the account and everything it owns.
pub async fn delete_me<S>(
  State(state): State<AppState<S>>,
  AuthContext(token): AuthContext,
) -> Result<StatusCode, ApiError>
where
  S: DirectoryStore + IdentityProvider + Clone + Send + Sync + 'static,
{
  let principal = state
    .store
    .principal(&token.sub)
    .await?
    .ok_or(Error::Unauthenticated)?;

  state.store.delete_principal(&principal.uid).await?;
  cardea_functions::on_delete(state.store.as_ref(), &principal).await;

  Ok(StatusCode::NO_CONTENT)
}
