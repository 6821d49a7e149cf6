//! Error taxonomy for Cardea.
//!
//! Every fallible surface in the workspace speaks this taxonomy. The wire
//! codes in [`ErrorCode`] are part of the external contract of the callable
//! mutation and must not be renamed.

use thiserror::Error;

/// Structured wire code attached to every error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
  Unauthenticated,
  PermissionDenied,
  InvalidArgument,
  NotFound,
  ResourceExhausted,
  AlreadyExists,
  Internal,
}

impl ErrorCode {
  /// The exact string clients match on.
  pub fn as_str(self) -> &'static str {
    match self {
      ErrorCode::Unauthenticated   => "unauthenticated",
      ErrorCode::PermissionDenied  => "permission-denied",
      ErrorCode::InvalidArgument   => "invalid-argument",
      ErrorCode::NotFound          => "not-found",
      ErrorCode::ResourceExhausted => "resource-exhausted",
      ErrorCode::AlreadyExists     => "already-exists",
      ErrorCode::Internal          => "internal",
    }
  }
}

#[derive(Debug, Error)]
pub enum Error {
  /// Bad input shape, length, or type. Rejected before any side effect.
  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  /// No credentials, or credentials that do not verify.
  #[error("unauthenticated")]
  Unauthenticated,

  /// Authenticated, but the caller's claims do not carry the privilege.
  #[error("permission denied")]
  PermissionDenied,

  /// The per-origin call budget is spent for the current window.
  #[error("too many attempts, try again in {retry_after_secs} seconds")]
  ResourceExhausted { retry_after_secs: u64 },

  #[error("not found: {0}")]
  NotFound(String),

  /// Signup with an email that already has a principal.
  #[error("email already in use")]
  EmailAlreadyInUse,

  /// Login with a password that does not match, or an unknown email.
  #[error("wrong email or password")]
  WrongCredential,

  /// Token minting or verification failed.
  #[error("token error: {0}")]
  Token(#[from] jsonwebtoken::errors::Error),

  /// The identity provider or document store call itself failed.
  #[error("external service error: {0}")]
  External(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// A stored record failed to decode. Points at data corruption, not at
  /// anything a retry can fix.
  #[error("corrupt record: {0}")]
  Corrupt(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn code(&self) -> ErrorCode {
    match self {
      Error::InvalidArgument(_)       => ErrorCode::InvalidArgument,
      Error::Unauthenticated          => ErrorCode::Unauthenticated,
      Error::PermissionDenied         => ErrorCode::PermissionDenied,
      Error::ResourceExhausted { .. } => ErrorCode::ResourceExhausted,
      Error::NotFound(_)              => ErrorCode::NotFound,
      Error::EmailAlreadyInUse        => ErrorCode::AlreadyExists,
      Error::WrongCredential          => ErrorCode::Unauthenticated,
      Error::Token(_)                 => ErrorCode::Unauthenticated,
      Error::External(_)              => ErrorCode::Internal,
      Error::Corrupt(_)               => ErrorCode::Internal,
      Error::Serialization(_)         => ErrorCode::Internal,
    }
  }

  /// Permanent errors are never retried by the client-side backoff helper.
  ///
  /// Only external-service failures are considered transient; everything
  /// else reflects a fact about the request that a retry cannot change.
  pub fn is_permanent(&self) -> bool {
    !matches!(self, Error::External(_))
  }

  /// Wrap an arbitrary backend failure as an external-service error.
  pub fn external<E>(source: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Error::External(Box::new(source))
  }

  /// External-service error from a bare message, for backends whose error
  /// type does not implement `std::error::Error`.
  pub fn external_msg(msg: impl Into<String>) -> Self {
    Error::External(msg.into().into())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wire_codes_are_stable() {
    assert_eq!(ErrorCode::PermissionDenied.as_str(), "permission-denied");
    assert_eq!(ErrorCode::ResourceExhausted.as_str(), "resource-exhausted");
    assert_eq!(ErrorCode::InvalidArgument.as_str(), "invalid-argument");
  }

  #[test]
  fn wrong_credential_maps_to_unauthenticated() {
    assert_eq!(Error::WrongCredential.code(), ErrorCode::Unauthenticated);
  }

  #[test]
  fn only_external_errors_are_transient() {
    let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout");
    assert!(!Error::external(io).is_permanent());
    assert!(Error::PermissionDenied.is_permanent());
    assert!(Error::EmailAlreadyInUse.is_permanent());
    assert!(Error::WrongCredential.is_permanent());
  }
}
