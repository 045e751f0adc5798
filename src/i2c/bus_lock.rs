// Licensed under the Apache-2.0 license

//! Bus ownership.
//!
//! Exactly one caller may program the controller at a time. The lock is a
//! flag guarded by a mutex with a condition variable for waiters, so testing
//! and taking ownership happen under the same mutex: there is no window
//! between "the bus looks free" and "the bus is mine".

use crate::i2c::common::I2cError;
use core::time::Duration;
use std::sync::{Condvar, Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct BusLock {
    held: Mutex<bool>,
    released: Condvar,
}

/// Proof of bus ownership; releases the bus when dropped.
#[must_use = "the bus is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct BusGuard<'a> {
    lock: &'a BusLock,
}

impl BusLock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            held: Mutex::new(false),
            released: Condvar::new(),
        }
    }

    /// Take the bus, waiting at most `timeout` for the current owner.
    ///
    /// # Errors
    ///
    /// [`I2cError::BusBusy`] when the bus is still owned after `timeout`.
    pub fn acquire(&self, timeout: Duration) -> Result<BusGuard<'_>, I2cError> {
        let held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut held, result) = self
            .released
            .wait_timeout_while(held, timeout, |held| *held)
            .unwrap_or_else(PoisonError::into_inner);
        if *held {
            debug_assert!(result.timed_out());
            return Err(I2cError::BusBusy);
        }
        *held = true;
        Ok(BusGuard { lock: self })
    }

    #[must_use]
    pub fn is_held(&self) -> bool {
        *self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        *held = false;
        drop(held);
        self.released.notify_one();
    }
}

impl Drop for BusGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
