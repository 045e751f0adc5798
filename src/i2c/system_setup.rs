// Licensed under the Apache-2.0 license

//! I2C System Setup Helper
//!
//! Brings a controller from reset into master mode and back down again. The
//! helpers only touch registers; ownership of the bus is the caller's
//! business.

use crate::i2c::clock::ClockGate;
use crate::i2c::common::{BusTiming, I2cConfig, I2cError};
use crate::i2c::registers::{offset, Con, RegisterPort, IRQ_CLEAR_ALL};

pub struct I2cSystemSetup;

impl I2cSystemSetup {
    /// Complete controller initialization.
    ///
    /// - wake the module clock
    /// - hold the module disabled while PSC, SCLL and SCLH are programmed
    /// - leave auto-idle and the wake-up logic off
    /// - mask and acknowledge every interrupt
    /// - enable the module as master transmitter
    ///
    /// # Errors
    ///
    /// [`I2cError::InvalidTiming`] before any register is touched when the
    /// timing cannot be produced, or [`I2cError::ClockTimeout`] when the
    /// clock domain does not come up.
    pub fn initialize<P, C>(
        port: &P,
        clock: &ClockGate<C>,
        config: &I2cConfig,
    ) -> Result<BusTiming, I2cError>
    where
        P: RegisterPort,
        C: RegisterPort,
    {
        let timing = config.timing_config.resolve(config.speed)?;
        clock.ensure_enabled()?;

        port.write32(offset::CON, 0);
        Self::configure_timing(port, &timing);
        port.write32(offset::SYSC, 0);
        Self::mask_interrupts(port);
        port.write32(offset::CON, (Con::EN | Con::MST | Con::TRX).bits());

        Ok(timing)
    }

    /// Program the clock divisors. The module must be disabled.
    pub fn configure_timing<P: RegisterPort>(port: &P, timing: &BusTiming) {
        port.write32(offset::PSC, u32::from(timing.prescaler));
        port.write32(offset::SCLL, u32::from(timing.scl_low));
        port.write32(offset::SCLH, u32::from(timing.scl_high));
    }

    pub fn mask_interrupts<P: RegisterPort>(port: &P) {
        port.write32(offset::IRQENABLE_CLR, IRQ_CLEAR_ALL);
        port.write32(offset::IRQSTATUS, IRQ_CLEAR_ALL);
    }

    /// Quiesce the controller: no interrupts, module disabled.
    pub fn shutdown<P: RegisterPort>(port: &P) {
        Self::mask_interrupts(port);
        port.write32(offset::CON, 0);
    }
}
