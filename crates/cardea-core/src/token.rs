//! Signed ID tokens carrying custom claims.
//!
//! HS256 via `jsonwebtoken`. The claim set is tamper-evident: only the
//! holder of the signing secret (the identity provider) can mint one, so a
//! verified token's `admin` claim is trusted without a directory read.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{Result, principal::Claims, role::Role};

/// Default token lifetime: one hour, matching the identity provider's
/// refresh cadence.
pub const DEFAULT_TTL_SECS: i64 = 3600;

// ─── Claims payload ──────────────────────────────────────────────────────────

/// The decoded payload of an ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdToken {
  /// Principal uid.
  pub sub:   String,
  pub email: String,
  pub iat:   i64,
  pub exp:   i64,

  /// Custom claims, flattened alongside the registered ones.
  #[serde(flatten)]
  pub claims: Claims,
}

impl IdToken {
  pub fn role(&self) -> Role {
    self.claims.role()
  }
}

// ─── Key material ────────────────────────────────────────────────────────────

/// Symmetric signing/verification keys derived from one deploy-time secret.
#[derive(Clone)]
pub struct TokenKeys {
  encoding: EncodingKey,
  decoding: DecodingKey,
}

impl TokenKeys {
  pub fn from_secret(secret: &[u8]) -> TokenKeys {
    TokenKeys {
      encoding: EncodingKey::from_secret(secret),
      decoding: DecodingKey::from_secret(secret),
    }
  }

  /// Mint a token over `claims` for `uid`, valid for `ttl_secs` from
  /// `issued_at` (unix seconds).
  pub fn mint(
    &self,
    uid: &str,
    email: &str,
    claims: &Claims,
    issued_at: i64,
    ttl_secs: i64,
  ) -> Result<String> {
    let payload = IdToken {
      sub:    uid.to_owned(),
      email:  email.to_owned(),
      iat:    issued_at,
      exp:    issued_at + ttl_secs,
      claims: claims.clone(),
    };
    Ok(jsonwebtoken::encode(
      &Header::new(Algorithm::HS256),
      &payload,
      &self.encoding,
    )?)
  }

  /// Verify signature and expiry, returning the decoded payload.
  pub fn verify(&self, token: &str) -> Result<IdToken> {
    let validation = Validation::new(Algorithm::HS256);
    let data = jsonwebtoken::decode::<IdToken>(token, &self.decoding, &validation)?;
    Ok(data.claims)
  }
}

impl std::fmt::Debug for TokenKeys {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str("TokenKeys(..)")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn keys() -> TokenKeys {
    TokenKeys::from_secret(b"test-secret")
  }

  fn now() -> i64 {
    chrono::Utc::now().timestamp()
  }

  #[test]
  fn mint_and_verify_round_trip() {
    let keys = keys();
    let claims = Claims::admin();
    let token = keys
      .mint("uid-1234567890", "a@example.com", &claims, now(), 60)
      .unwrap();

    let decoded = keys.verify(&token).unwrap();
    assert_eq!(decoded.sub, "uid-1234567890");
    assert_eq!(decoded.email, "a@example.com");
    assert_eq!(decoded.role(), Role::Admin);
  }

  #[test]
  fn tampered_token_fails_verification() {
    let keys = keys();
    let token = keys
      .mint("uid-1234567890", "a@example.com", &Claims::default(), now(), 60)
      .unwrap();

    let other = TokenKeys::from_secret(b"different-secret");
    assert!(other.verify(&token).is_err());
  }

  #[test]
  fn expired_token_fails_verification() {
    let keys = keys();
    // Issued far enough in the past that default leeway cannot save it.
    let token = keys
      .mint("uid-1234567890", "a@example.com", &Claims::default(), now() - 7200, 60)
      .unwrap();
    assert!(keys.verify(&token).is_err());
  }

  #[test]
  fn extra_claims_survive_the_round_trip() {
    let keys = keys();
    let mut claims = Claims::default();
    claims.extra.insert("plan".into(), serde_json::json!("pro"));

    let token = keys
      .mint("uid-1234567890", "a@example.com", &claims, now(), 60)
      .unwrap();
    let decoded = keys.verify(&token).unwrap();
    assert_eq!(decoded.claims.extra["plan"], "pro");
  }
}
