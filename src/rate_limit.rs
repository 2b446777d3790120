use std::{
  sync::Mutex,
  time::{Duration, Instant},
};

use crate::{Error, Result};

/// A single process-wide fixed-window request counter.
pub struct RateLimiter {
  max: u32,
  window: Duration,
  state: Mutex<Window>,
}

struct Window {
  started: Instant,
  count: u32,
}

impl RateLimiter {
  /// `max == 0` disables limiting.
  pub fn new(max: u32, window: Duration) -> Self {
    Self {
      max,
      window,
      state: Mutex::new(Window {
        started: Instant::now(),
        count: 0,
      }),
    }
  }

  pub fn check(&self) -> Result<()> {
    if self.max == 0 {
      return Ok(());
    }

    let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
    let now = Instant::now();
    if now.duration_since(state.started) >= self.window {
      state.started = now;
      state.count = 0;
    }

    if state.count >= self.max {
      return Err(Error::RateLimited);
    }

    state.count += 1;
    Ok(())
  }
}
