//! Bounded exponential backoff for client-side auth calls.
//!
//! Only transient failures retry. Permanent codes — wrong credential, email
//! already in use, permission denied, invalid argument — return immediately:
//! repeating them cannot change the answer and hammers the provider.

use std::{future::Future, time::Duration};

use cardea_core::Result;

#[derive(Debug, Clone)]
pub struct BackoffPolicy {
  /// Total attempts, including the first.
  pub max_attempts: u32,
  pub base_delay:   Duration,
  pub max_delay:    Duration,
}

impl Default for BackoffPolicy {
  fn default() -> Self {
    BackoffPolicy {
      max_attempts: 3,
      base_delay:   Duration::from_millis(200),
      max_delay:    Duration::from_secs(5),
    }
  }
}

/// Run `op`, retrying transient failures with doubling delays.
pub async fn with_backoff<T, F, Fut>(policy: &BackoffPolicy, mut op: F) -> Result<T>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T>>,
{
  let mut delay = policy.base_delay;
  let mut attempt = 1u32;

  loop {
    match op().await {
      Ok(value) => return Ok(value),
      Err(e) if e.is_permanent() || attempt >= policy.max_attempts.max(1) => {
        return Err(e);
      }
      Err(e) => {
        tracing::debug!(attempt, error = %e, "transient failure; backing off");
        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(policy.max_delay);
        attempt += 1;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use cardea_core::Error;

  use super::*;

  fn fast() -> BackoffPolicy {
    BackoffPolicy {
      max_attempts: 3,
      base_delay:   Duration::from_millis(1),
      max_delay:    Duration::from_millis(4),
    }
  }

  #[tokio::test]
  async fn transient_failures_are_retried_until_success() {
    let calls = AtomicU32::new(0);
    let result = with_backoff(&fast(), || {
      let n = calls.fetch_add(1, Ordering::SeqCst);
      async move {
        if n < 2 {
          Err(Error::external_msg("flaky"))
        } else {
          Ok("done")
        }
      }
    })
    .await;

    assert_eq!(result.unwrap(), "done");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn permanent_errors_are_never_retried() {
    let calls = AtomicU32::new(0);
    let result: Result<(), _> = with_backoff(&fast(), || {
      calls.fetch_add(1, Ordering::SeqCst);
      async { Err(Error::WrongCredential) }
    })
    .await;

    assert!(matches!(result.unwrap_err(), Error::WrongCredential));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn attempts_are_bounded() {
    let calls = AtomicU32::new(0);
    let result: Result<(), _> = with_backoff(&fast(), || {
      calls.fetch_add(1, Ordering::SeqCst);
      async { Err(Error::external_msg("always down")) }
    })
    .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn already_in_use_is_permanent() {
    let calls = AtomicU32::new(0);
    let result: Result<(), _> = with_backoff(&fast(), || {
      calls.fetch_add(1, Ordering::SeqCst);
      async { Err(Error::EmailAlreadyInUse) }
    })
    .await;

    assert!(matches!(result.unwrap_err(), Error::EmailAlreadyInUse));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }
}
