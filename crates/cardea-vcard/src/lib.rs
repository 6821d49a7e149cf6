//! vCard 4.0 serializer for Cardea cards.
//!
//! Backs the share surface's "save contact" download. Pure synchronous; no
//! HTTP or database dependencies. Cards are published outward only, so
//! there is no parser here.

pub mod error;
mod serialize;

pub use error::{Error, Result};

use cardea_core::card::CardDocument;

/// Serialize `card` as a vCard 4.0 string (CRLF line endings, folded at 75
/// octets per RFC 6350 §3.2).
pub fn serialize(card: &CardDocument) -> Result<String> {
  serialize::serialize(card)
}
