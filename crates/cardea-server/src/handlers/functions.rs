//! The callable-mutation endpoint.

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use cardea_core::{Error, identity::IdentityProvider, store::DirectoryStore};
use cardea_functions::{AssignRoleRequest, AssignRoleResponse, CallContext};

use crate::{
  AppState,
  auth::{CallerOrigin, MaybeAuth},
  error::ApiError,
};

/// `POST /functions/assign-role`
///
/// The body is decoded leniently: a transport-level decode failure becomes
/// the same `invalid-argument` a missing field would, so clients see one
/// code for every malformed request.
pub async fn assign_role<S>(
  State(state): State<AppState<S>>,
  CallerOrigin(origin): CallerOrigin,
  MaybeAuth(token): MaybeAuth,
  body: Result<Json<AssignRoleRequest>, JsonRejection>,
) -> Result<Json<AssignRoleResponse>, ApiError>
where
  S: DirectoryStore + IdentityProvider + Clone + Send + Sync + 'static,
{
  let Json(req) = body
    .map_err(|e| Error::InvalidArgument(format!("malformed request body: {e}")))?;

  let ctx = CallContext {
    origin,
    caller_uid: token.map(|t| t.sub),
  };

  let resp = cardea_functions::assign_role(
    state.store.as_ref(),
    state.store.as_ref(),
    &state.limiter,
    &ctx,
    req,
  )
  .await?;

  Ok(Json(resp))
}
