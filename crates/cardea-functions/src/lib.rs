//! Server-side functions for Cardea.
//!
//! Three lifecycle triggers keep the identity provider's custom claims and
//! the directory's `role` field in agreement, one externally callable
//! mutation lets administrators assign roles, and a scheduled scan audits
//! the result. Lifecycle triggers have no caller waiting on them and never
//! propagate errors; the callable mutation always does.

pub mod assign;
pub mod lifecycle;
pub mod ratelimit;
pub mod scan;

pub use assign::{AssignRoleRequest, AssignRoleResponse, CallContext, assign_role};
pub use lifecycle::{on_create, on_delete, on_role_field_update};
pub use ratelimit::{RateLimitConfig, RateLimiter};
pub use scan::{ScanConfig, run_audit_scan};
