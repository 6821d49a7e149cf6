//! Client-side auth utilities for Cardea.
//!
//! The role reconciler treats the signed token claim as ground truth and
//! repairs the directory's `role` field when the two drift; the access gate
//! holds navigation until the reconciled role is known. Both are generic
//! over the provider traits, so they run against any backend.

pub mod auth;
pub mod gate;
pub mod reconcile;
pub mod retry;

pub use auth::{Session, log_in, sign_up};
pub use gate::{AccessGate, GateMode, GateOutcome, GateState};
pub use reconcile::{get_role, is_admin, sync_role};
pub use retry::{BackoffPolicy, with_backoff};
