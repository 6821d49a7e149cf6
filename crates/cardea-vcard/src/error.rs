//! Error types for the cardea-vcard serializer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A card with no display name cannot produce a valid `FN` property.
  #[error("card has no name to serialize")]
  MissingName,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
