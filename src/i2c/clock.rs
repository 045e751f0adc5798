// Licensed under the Apache-2.0 license

//! Module clock gate.
//!
//! The power manager may gate the I2C functional clock while the bus is idle,
//! so every transfer makes sure MODULEMODE is enabled and that the module
//! reports itself functional before touching the controller.

use crate::i2c::common::I2cError;
use crate::i2c::registers::{clkctrl, RegisterPort};

pub struct ClockGate<C: RegisterPort> {
    port: C,
    clkctrl_offset: usize,
    poll_limit: u32,
}

impl<C: RegisterPort> ClockGate<C> {
    /// `port` maps the clock module block (CM_PER or CM_WKUP) and
    /// `clkctrl_offset` selects this controller's CLKCTRL register in it.
    #[must_use]
    pub fn new(port: C, clkctrl_offset: usize, poll_limit: u32) -> Self {
        Self {
            port,
            clkctrl_offset,
            poll_limit: poll_limit.max(1),
        }
    }

    /// Enable the module clock if needed and wait until it reads back enabled.
    ///
    /// Returns `true` when the enable bit had to be set.
    ///
    /// # Errors
    ///
    /// [`I2cError::ClockTimeout`] if the register never shows the enabled
    /// pattern within the poll limit.
    pub fn ensure_enabled(&self) -> Result<bool, I2cError> {
        let current = self.port.read32(self.clkctrl_offset);
        let woke = current & clkctrl::MODULEMODE_ENABLE == 0;
        if woke {
            self.port
                .write32(self.clkctrl_offset, current | clkctrl::MODULEMODE_ENABLE);
        }

        for _ in 0..self.poll_limit {
            if self.port.read32(self.clkctrl_offset) & clkctrl::STATUS_MASK == clkctrl::ENABLED {
                return Ok(woke);
            }
            core::hint::spin_loop();
        }
        Err(I2cError::ClockTimeout)
    }
}
