// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use std::time::Duration;

use canonical_error::{CanonicalError, invalid_argument_error, unavailable_error};
use log::{debug, warn};

// Abstracts the blocking pause between retries so tests can observe it
// without actually waiting.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

// Best-effort policy for operations that fail transiently (bus glitches). The
// operation is attempted up to `max_attempts` times with `delay` between
// attempts, after which the device is considered unreachable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy{max_attempts: 500, delay: Duration::from_millis(2)}
    }
}

impl RetryPolicy {
    // `max_attempts` must be at least 1.
    pub fn new(max_attempts: u32, delay: Duration) -> Result<Self, CanonicalError> {
        if max_attempts == 0 {
            return Err(invalid_argument_error(
                "Retry policy needs at least one attempt"));
        }
        Ok(RetryPolicy{max_attempts, delay})
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    // Invokes `op` until it succeeds or the attempts are used up. There is no
    // sleep after the final failed attempt. On exhaustion the returned error
    // has Unavailable code and carries the last failure's message.
    pub fn run<T, F>(&self, sleeper: &mut dyn Sleeper, mut op: F)
                     -> Result<T, CanonicalError>
    where F: FnMut() -> Result<T, CanonicalError>
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if attempt >= self.max_attempts {
                        warn!("Giving up after {} attempts: {}", attempt, e.message);
                        return Err(unavailable_error(&format!(
                            "Device unreachable after {} attempts; last error: {}",
                            attempt, e.message)));
                    }
                    debug!("Attempt {} failed: {}", attempt, e.message);
                    sleeper.sleep(self.delay);
                }
            }
        }
    }
}

// mod tests.
