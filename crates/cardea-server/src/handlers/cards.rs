//! Handlers for `/cards/*` — the dashboard CRUD and the public share
//! surface.
//!
//! The share surface is the one unauthenticated read in the system. A card
//! that is not [`AccountState::Active`] is indistinguishable from a missing
//! one: blocked, suspended, and expired cards all 404.

use axum::{
  Json,
  body::Body,
  extract::{Path, State},
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use cardea_core::{
  Error,
  card::{CardContact, CardDocument, CardStatus, Category},
  identity::IdentityProvider,
  store::DirectoryStore,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, auth::AuthContext, error::ApiError, etag::compute_etag};

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /cards` — publish a card owned by the caller.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  AuthContext(token): AuthContext,
  Json(contact): Json<CardContact>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DirectoryStore + IdentityProvider + Clone + Send + Sync + 'static,
{
  if contact.full_name.trim().is_empty() {
    return Err(Error::InvalidArgument("full_name is required".into()).into());
  }

  let card = CardDocument::new(
    &Uuid::new_v4().to_string(),
    &token.sub,
    contact,
    Utc::now(),
  );
  state.store.put_card(&card).await?;
  state.store.append_card_ref(&token.sub, &card.card_id).await?;

  Ok((StatusCode::CREATED, Json(card)))
}

// ─── Update ──────────────────────────────────────────────────────────────────

/// Owner-editable contact fields plus the administrator-only moderation
/// fields. Presence of any moderation field requires a fresh admin claim.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateCardBody {
  pub full_name: Option<String>,
  pub title:     Option<String>,
  pub company:   Option<String>,
  pub email:     Option<String>,
  pub phone:     Option<String>,
  pub website:   Option<String>,

  pub status:               Option<CardStatus>,
  pub category:             Option<Category>,
  pub subscription_expires: Option<DateTime<Utc>>,
}

/// `PATCH /cards/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  AuthContext(token): AuthContext,
  Path(card_id): Path<String>,
  Json(body): Json<UpdateCardBody>,
) -> Result<Json<CardDocument>, ApiError>
where
  S: DirectoryStore + IdentityProvider + Clone + Send + Sync + 'static,
{
  let mut card = state
    .store
    .get_card(&card_id)
    .await?
    .ok_or_else(|| Error::NotFound(format!("card {card_id}")))?;

  // Privilege is read fresh, not from the presented token.
  let is_admin = state
    .store
    .principal(&token.sub)
    .await?
    .map(|p| p.claims.admin)
    .unwrap_or(false);
  let is_owner = card.owner_uid == token.sub;

  let wants_moderation =
    body.status.is_some() || body.category.is_some() || body.subscription_expires.is_some();
  if wants_moderation && !is_admin {
    return Err(Error::PermissionDenied.into());
  }
  if !is_owner && !is_admin {
    return Err(Error::PermissionDenied.into());
  }

  if let Some(full_name) = body.full_name {
    if full_name.trim().is_empty() {
      return Err(Error::InvalidArgument("full_name cannot be empty".into()).into());
    }
    card.contact.full_name = full_name;
  }
  if let Some(title) = body.title {
    card.contact.title = Some(title);
  }
  if let Some(company) = body.company {
    card.contact.company = Some(company);
  }
  if let Some(email) = body.email {
    card.contact.email = Some(email);
  }
  if let Some(phone) = body.phone {
    card.contact.phone = Some(phone);
  }
  if let Some(website) = body.website {
    card.contact.website = Some(website);
  }
  if let Some(status) = body.status {
    card.status = status;
  }
  if let Some(category) = body.category {
    card.category = category;
  }
  if let Some(expires) = body.subscription_expires {
    card.subscription_expires = Some(expires);
  }

  card.updated_at = Utc::now();
  state.store.put_card(&card).await?;
  Ok(Json(card))
}

// ─── Share surface ───────────────────────────────────────────────────────────

/// Public projection of a card — owner and moderation fields stay private.
#[derive(Debug, Serialize)]
pub struct CardView {
  pub card_id:  String,
  pub contact:  CardContact,
  pub category: Category,
}

/// Resolve a card for the public surface, or 404.
async fn viewable_card<S>(state: &AppState<S>, card_id: &str) -> Result<CardDocument, ApiError>
where
  S: DirectoryStore + IdentityProvider + Clone + Send + Sync + 'static,
{
  let card = state
    .store
    .get_card(card_id)
    .await?
    .ok_or_else(|| Error::NotFound(format!("card {card_id}")))?;

  if !card.account_state(Utc::now()).is_viewable() {
    return Err(Error::NotFound(format!("card {card_id}")).into());
  }
  Ok(card)
}

/// `GET /cards/{id}` — the share URL. Unauthenticated, read-only, except for
/// the scan counter incremented for Premium/Executive tiers.
pub async fn share<S>(
  State(state): State<AppState<S>>,
  Path(card_id): Path<String>,
  headers: HeaderMap,
) -> Result<Response, ApiError>
where
  S: DirectoryStore + IdentityProvider + Clone + Send + Sync + 'static,
{
  let card = viewable_card(&state, &card_id).await?;

  if card.category.tracks_subscription() {
    state
      .store
      .record_scan(&card.card_id, &card.owner_uid, Utc::now())
      .await?;
  }

  let etag = compute_etag(&card);
  if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH)
    && if_none_match.to_str().is_ok_and(|v| v.trim_matches('"') == etag.trim_matches('"'))
  {
    return Ok(StatusCode::NOT_MODIFIED.into_response());
  }

  let view = CardView {
    card_id:  card.card_id.clone(),
    contact:  card.contact.clone(),
    category: card.category,
  };
  let mut res = Json(view).into_response();
  if let Ok(value) = etag.parse() {
    res.headers_mut().insert(header::ETAG, value);
  }
  Ok(res)
}

/// `GET /cards/{id}/vcard` — "save contact" download, same gate as the
/// share page.
pub async fn vcard<S>(
  State(state): State<AppState<S>>,
  Path(card_id): Path<String>,
) -> Result<Response, ApiError>
where
  S: DirectoryStore + IdentityProvider + Clone + Send + Sync + 'static,
{
  let card = viewable_card(&state, &card_id).await?;

  let vcf = cardea_vcard::serialize(&card)
    .map_err(|e| Error::Corrupt(format!("card {card_id}: {e}")))?;

  let res = Response::builder()
    .status(StatusCode::OK)
    .header(header::CONTENT_TYPE, "text/vcard; charset=utf-8")
    .header(
      header::CONTENT_DISPOSITION,
      format!("attachment; filename=\"{}.vcf\"", card.card_id),
    )
    .header(header::CONTENT_LENGTH, vcf.len())
    .body(Body::from(vcf))
    .map_err(|e| Error::external_msg(format!("response build failed: {e}")))?;
  Ok(res)
}
