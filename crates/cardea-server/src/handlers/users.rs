//! Administrator edits to user documents.
//!
//! Editing the `role` field here is the document-side path for granting or
//! revoking privilege: the update trigger re-derives the claim from the new
//! field value, exactly as it would for any other direct document edit.

use axum::{
  Json,
  extract::{Path, State},
};
use cardea_core::{
  Error, identity::IdentityProvider, role::Role, store::DirectoryStore,
  user::UserDocument,
};
use chrono::Utc;
use serde::Deserialize;

use crate::{AppState, auth::AuthContext, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserBody {
  pub display_name: Option<String>,
  pub role:         Option<Role>,
}

/// `PATCH /users/{uid}` — admin only.
pub async fn update<S>(
  State(state): State<AppState<S>>,
  AuthContext(token): AuthContext,
  Path(uid): Path<String>,
  Json(body): Json<UpdateUserBody>,
) -> Result<Json<UserDocument>, ApiError>
where
  S: DirectoryStore + IdentityProvider + Clone + Send + Sync + 'static,
{
  let is_admin = state
    .store
    .principal(&token.sub)
    .await?
    .map(|p| p.claims.admin)
    .unwrap_or(false);
  if !is_admin {
    return Err(Error::PermissionDenied.into());
  }

  let before = state
    .store
    .get_user(&uid)
    .await?
    .ok_or_else(|| Error::NotFound(format!("user {uid}")))?;

  let mut after = before.clone();
  if let Some(name) = body.display_name {
    after.display_name = Some(name);
  }
  if let Some(role) = body.role {
    after.role = role;
  }
  after.updated_at = Utc::now();

  state.store.put_user(&after).await?;

  // The document write is what fires the trigger; the trigger is what
  // actually moves the claim.
  cardea_functions::on_role_field_update(
    state.store.as_ref(),
    state.store.as_ref(),
    &before,
    &after,
  )
  .await;

  Ok(Json(after))
}
