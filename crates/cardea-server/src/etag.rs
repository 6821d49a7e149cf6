//! ETag computation for the public card surface.
//!
//! Strong ETags over the card's identity and last-modified instant; the
//! share page is unauthenticated and cacheable, so revalidation matters.

use cardea_core::card::CardDocument;
use sha2::{Digest, Sha256};

/// Compute a strong ETag for `card`. Stable across reads, changes whenever
/// the card is updated.
pub fn compute_etag(card: &CardDocument) -> String {
  let mut hasher = Sha256::new();
  hasher.update(card.card_id.as_bytes());
  hasher.update(card.updated_at.timestamp_micros().to_le_bytes());
  let hash = hasher.finalize();
  format!("\"{}\"", hex::encode(hash))
}
