//! Access gate — the route-level guard consuming the reconciled role.
//!
//! A gate starts in `Loading` and stays there until a session-change
//! notification arrives. Guarded content can only be produced by an
//! `Authorized` resolution, so there is no path that flashes it while
//! authorization is still unknown.

use cardea_core::identity::IdentityProvider;

use crate::{auth::Session, reconcile::is_admin};

/// What the guarded surface requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
  /// Any authenticated principal may pass.
  RequireAuth,
  /// Only principals whose fresh claims carry `admin`.
  RequireAdmin,
}

/// Gate lifecycle: `Loading` until the first session event resolves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
  Loading,
  Unauthenticated,
  /// Authenticated, but the required privilege is absent.
  Unauthorized,
  Authorized,
}

/// Terminal action for the navigation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
  RenderContent,
  RedirectToLogin,
  RedirectToDashboard,
}

#[derive(Debug)]
pub struct AccessGate {
  mode:  GateMode,
  state: GateState,
}

impl AccessGate {
  pub fn new(mode: GateMode) -> AccessGate {
    AccessGate { mode, state: GateState::Loading }
  }

  pub fn state(&self) -> GateState {
    self.state
  }

  /// The resolved action, or `None` while still loading. Callers must keep
  /// showing the loading surface until this returns `Some`.
  pub fn outcome(&self) -> Option<GateOutcome> {
    match self.state {
      GateState::Loading         => None,
      GateState::Unauthenticated => Some(GateOutcome::RedirectToLogin),
      GateState::Unauthorized    => Some(GateOutcome::RedirectToDashboard),
      GateState::Authorized      => Some(GateOutcome::RenderContent),
    }
  }

  /// Feed one session-change notification.
  ///
  /// When admin is required, resolution additionally awaits the fresh
  /// `is_admin` check before leaving `Loading` — which, like every claims
  /// read, fails closed.
  pub async fn observe<I>(
    &mut self,
    identity: &I,
    session: Option<&Session>,
  ) -> GateOutcome
  where
    I: IdentityProvider,
  {
    self.state = match session {
      None => GateState::Unauthenticated,
      Some(session) => match self.mode {
        GateMode::RequireAuth => GateState::Authorized,
        GateMode::RequireAdmin => {
          if is_admin(identity, &session.uid).await {
            GateState::Authorized
          } else {
            GateState::Unauthorized
          }
        }
      },
    };

    // The state is resolved, so the outcome always exists here.
    match self.state {
      GateState::Unauthenticated => GateOutcome::RedirectToLogin,
      GateState::Unauthorized    => GateOutcome::RedirectToDashboard,
      _                          => GateOutcome::RenderContent,
    }
  }
}

#[cfg(test)]
mod tests {
  use cardea_core::{
    identity::IdentityProvider,
    principal::{Claims, NewPrincipal},
    role::Role,
  };
  use cardea_store_sqlite::SqliteStore;

  use super::*;

  async fn store() -> SqliteStore {
    SqliteStore::open_in_memory(b"test-secret").await.unwrap()
  }

  async fn session(s: &SqliteStore, email: &str, admin: bool) -> Session {
    let claims = if admin { Claims::admin() } else { Claims::default() };
    let p = s
      .create_principal(NewPrincipal {
        email:    email.into(),
        password: "hunter2hunter2".into(),
        claims,
      })
      .await
      .unwrap();
    let token = s.issue_token(&p.uid).await.unwrap();
    Session {
      uid:   p.uid,
      email: p.email,
      role:  Role::from_admin_flag(admin),
      token,
    }
  }

  #[tokio::test]
  async fn gate_has_no_outcome_before_a_session_event() {
    let gate = AccessGate::new(GateMode::RequireAuth);
    assert_eq!(gate.state(), GateState::Loading);
    assert_eq!(gate.outcome(), None);
  }

  #[tokio::test]
  async fn null_session_redirects_to_login() {
    let s = store().await;
    let mut gate = AccessGate::new(GateMode::RequireAuth);
    let outcome = gate.observe(&s, None).await;
    assert_eq!(outcome, GateOutcome::RedirectToLogin);
    assert_eq!(gate.state(), GateState::Unauthenticated);
  }

  #[tokio::test]
  async fn any_principal_passes_a_plain_auth_gate() {
    let s = store().await;
    let session = session(&s, "alice@example.com", false).await;

    let mut gate = AccessGate::new(GateMode::RequireAuth);
    let outcome = gate.observe(&s, Some(&session)).await;
    assert_eq!(outcome, GateOutcome::RenderContent);
  }

  #[tokio::test]
  async fn non_admin_at_an_admin_gate_is_sent_to_the_dashboard() {
    let s = store().await;
    let session = session(&s, "alice@example.com", false).await;

    let mut gate = AccessGate::new(GateMode::RequireAdmin);
    let outcome = gate.observe(&s, Some(&session)).await;
    assert_eq!(outcome, GateOutcome::RedirectToDashboard);
    assert_eq!(gate.state(), GateState::Unauthorized);
  }

  #[tokio::test]
  async fn admin_passes_an_admin_gate() {
    let s = store().await;
    let session = session(&s, "root@example.com", true).await;

    let mut gate = AccessGate::new(GateMode::RequireAdmin);
    let outcome = gate.observe(&s, Some(&session)).await;
    assert_eq!(outcome, GateOutcome::RenderContent);
    assert_eq!(gate.state(), GateState::Authorized);
  }

  #[tokio::test]
  async fn revoked_admin_is_caught_by_the_fresh_check() {
    let s = store().await;
    let session = session(&s, "root@example.com", true).await;

    // Claim revoked after the session token was minted.
    let claims = s.principal(&session.uid).await.unwrap().unwrap().claims;
    s.set_claims(&session.uid, &claims.with_admin(false))
      .await
      .unwrap();

    let mut gate = AccessGate::new(GateMode::RequireAdmin);
    let outcome = gate.observe(&s, Some(&session)).await;
    assert_eq!(outcome, GateOutcome::RedirectToDashboard);
  }
}
