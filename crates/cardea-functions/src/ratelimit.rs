//! Per-origin sliding-window rate limiter for the callable mutation.
//!
//! The counter store is in-memory per process. Under multiple server
//! instances the effective ceiling is the per-instance ceiling multiplied by
//! the instance count; a shared counting store would be required for a
//! strict global limit.

use std::{
  collections::{HashMap, VecDeque},
  sync::Mutex,
  time::{Duration, Instant},
};

use cardea_core::{Error, Result};

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
  /// Calls allowed per origin inside one window.
  pub max_calls: u32,
  pub window:    Duration,
}

impl Default for RateLimitConfig {
  fn default() -> Self {
    RateLimitConfig { max_calls: 30, window: Duration::from_secs(60) }
  }
}

/// Sliding one-minute window, keyed by caller network origin.
pub struct RateLimiter {
  config: RateLimitConfig,
  hits:   Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
  pub fn new(config: RateLimitConfig) -> RateLimiter {
    RateLimiter { config, hits: Mutex::new(HashMap::new()) }
  }

  /// Count one call from `origin`.
  ///
  /// A rejected call is not counted: the budget measures calls that passed
  /// the gate, so a client hammering the endpoint cannot extend its own
  /// penalty window.
  pub fn check(&self, origin: &str) -> Result<()> {
    let now = Instant::now();
    let mut map = self.hits.lock().unwrap_or_else(|p| p.into_inner());
    let hits = map.entry(origin.to_owned()).or_default();

    while let Some(oldest) = hits.front() {
      if now.duration_since(*oldest) >= self.config.window {
        hits.pop_front();
      } else {
        break;
      }
    }

    if hits.len() >= self.config.max_calls as usize {
      let retry_after = match hits.front() {
        Some(oldest) => {
          self
            .config
            .window
            .saturating_sub(now.duration_since(*oldest))
        }
        None => self.config.window,
      };
      return Err(Error::ResourceExhausted {
        retry_after_secs: retry_after.as_secs().max(1),
      });
    }

    hits.push_back(now);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn allows_up_to_the_ceiling_then_rejects() {
    let limiter = RateLimiter::new(RateLimitConfig::default());

    for i in 0..30 {
      assert!(limiter.check("1.2.3.4").is_ok(), "call {} rejected", i + 1);
    }
    let err = limiter.check("1.2.3.4").unwrap_err();
    assert!(matches!(err, Error::ResourceExhausted { .. }));
  }

  #[test]
  fn origins_have_independent_budgets() {
    let limiter = RateLimiter::new(RateLimitConfig {
      max_calls: 2,
      window:    Duration::from_secs(60),
    });

    assert!(limiter.check("a").is_ok());
    assert!(limiter.check("a").is_ok());
    assert!(limiter.check("a").is_err());
    assert!(limiter.check("b").is_ok());
  }

  #[test]
  fn window_expiry_frees_the_budget() {
    let limiter = RateLimiter::new(RateLimitConfig {
      max_calls: 1,
      window:    Duration::from_millis(20),
    });

    assert!(limiter.check("a").is_ok());
    assert!(limiter.check("a").is_err());
    std::thread::sleep(Duration::from_millis(30));
    assert!(limiter.check("a").is_ok());
  }

  #[test]
  fn rejected_calls_do_not_extend_the_window() {
    let limiter = RateLimiter::new(RateLimitConfig {
      max_calls: 1,
      window:    Duration::from_millis(40),
    });

    assert!(limiter.check("a").is_ok());
    for _ in 0..10 {
      assert!(limiter.check("a").is_err());
    }
    std::thread::sleep(Duration::from_millis(50));
    // Had the rejections been counted, the budget would still be spent.
    assert!(limiter.check("a").is_ok());
  }

  #[test]
  fn retry_after_is_at_least_one_second() {
    let limiter = RateLimiter::new(RateLimitConfig {
      max_calls: 1,
      window:    Duration::from_secs(60),
    });
    limiter.check("a").unwrap();
    match limiter.check("a").unwrap_err() {
      Error::ResourceExhausted { retry_after_secs } => {
        assert!(retry_after_secs >= 1 && retry_after_secs <= 60);
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }
}
