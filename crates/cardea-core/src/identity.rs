//! The `IdentityProvider` trait — authentication and custom-claim storage.
//!
//! Custom claims are settable only through this trait, server-side. The
//! signed token a provider mints is the client's only view of them; a
//! "forced refresh" is a fresh [`issue_token`](IdentityProvider::issue_token)
//! call, which re-reads the current claim set rather than whatever an older
//! token was minted from.

use std::future::Future;

use crate::{
  Result,
  principal::{Claims, NewPrincipal, Principal},
};

/// Abstraction over the identity provider.
pub trait IdentityProvider: Send + Sync {
  /// Create a principal. Fails with
  /// [`Error::EmailAlreadyInUse`](crate::Error::EmailAlreadyInUse) on a
  /// duplicate email.
  fn create_principal(
    &self,
    new: NewPrincipal,
  ) -> impl Future<Output = Result<Principal>> + Send + '_;

  /// Retrieve a principal by uid. Returns `None` if absent.
  fn principal<'a>(
    &'a self,
    uid: &'a str,
  ) -> impl Future<Output = Result<Option<Principal>>> + Send + 'a;

  fn principal_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<Principal>>> + Send + 'a;

  /// Verify an email/password pair. Fails with
  /// [`Error::WrongCredential`](crate::Error::WrongCredential) on mismatch
  /// or unknown email; the two cases are indistinguishable to the caller.
  fn verify_password<'a>(
    &'a self,
    email: &'a str,
    password: &'a str,
  ) -> impl Future<Output = Result<Principal>> + Send + 'a;

  /// Replace the principal's custom claims. Merging with pre-existing
  /// claims is the caller's job: read, [`Claims::with_admin`], write.
  fn set_claims<'a>(
    &'a self,
    uid: &'a str,
    claims: &'a Claims,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  /// Mint a fresh signed ID token from the principal's *current* claims.
  /// This is the forced-refresh primitive the reconciler relies on.
  fn issue_token<'a>(
    &'a self,
    uid: &'a str,
  ) -> impl Future<Output = Result<String>> + Send + 'a;

  /// Decode and verify a presented token, returning its payload.
  fn verify_token<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<crate::token::IdToken>> + Send + 'a;

  fn delete_principal<'a>(
    &'a self,
    uid: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a;
}
