// Licensed under the Apache-2.0 license

//! Common types and constants for the AM335x I2C driver modules.
//!
//! This module provides shared definitions for error handling, bus timing,
//! and the controller configuration used across the driver implementation.

use core::fmt;
use fugit::{MicrosDurationU32, MillisDurationU32};

/// Size of each direction of the transaction buffer (one memory page).
pub const TRANSFER_CAPACITY: usize = 4096;

/// Functional clock feeding the I2C modules on the AM335x (PER_CLKOUTM2 / 4).
pub const DEFAULT_FUNCTIONAL_CLOCK_HZ: u32 = 48_000_000;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum I2cSpeed {
    Standard = 100_000,
    Fast = 400_000,
    FastPlus = 1_000_000,
}

impl I2cSpeed {
    #[must_use]
    pub const fn hz(self) -> u32 {
        self as u32
    }

    /// Internal sampling clock the prescaler should aim for at this speed.
    const fn target_internal_clock(self) -> u32 {
        match self {
            I2cSpeed::Standard | I2cSpeed::Fast => 12_000_000,
            I2cSpeed::FastPlus => 24_000_000,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum I2cError {
    /// Zero-length or over-capacity transfer, or an unsupported operation shape.
    InvalidArgument,
    /// The bus lock or the hardware bus-busy flag did not clear in time.
    BusBusy,
    /// The clock domain never reported the module as enabled.
    ClockTimeout,
    /// The addressed device did not acknowledge.
    Nacked,
    /// The interrupt handler never signalled completion in time.
    CompletionTimeout,
    /// The requested bus timing cannot be produced from the functional clock.
    InvalidTiming,
}

impl fmt::Display for I2cError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            I2cError::InvalidArgument => "invalid transfer argument",
            I2cError::BusBusy => "i2c bus busy",
            I2cError::ClockTimeout => "i2c module clock did not enable",
            I2cError::Nacked => "not acknowledged",
            I2cError::CompletionTimeout => "transfer did not complete",
            I2cError::InvalidTiming => "bus timing out of range",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for I2cError {}

impl embedded_hal::i2c::Error for I2cError {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
        match self {
            I2cError::Nacked => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            I2cError::BusBusy => ErrorKind::Bus,
            _ => ErrorKind::Other,
        }
    }
}

/// Register values derived from a [`TimingConfig`] for a given speed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BusTiming {
    pub prescaler: u8,
    pub scl_low: u8,
    pub scl_high: u8,
    /// Internal clock after the prescaler, in Hz.
    pub internal_clock: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimingConfig {
    pub clk_src: u32,
    pub manual_prescaler: Option<u8>,
    pub manual_scl_low: Option<u8>,
    pub manual_scl_high: Option<u8>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            clk_src: DEFAULT_FUNCTIONAL_CLOCK_HZ,
            manual_prescaler: None,
            manual_scl_low: None,
            manual_scl_high: None,
        }
    }
}

impl TimingConfig {
    /// Compute PSC/SCLL/SCLH for `speed`.
    ///
    /// The module divides the functional clock by `PSC + 1` to get ICLK; the
    /// low phase of SCL lasts `SCLL + 7` ICLK periods and the high phase
    /// `SCLH + 5`. Each phase gets half of the bus period.
    ///
    /// # Errors
    ///
    /// Returns [`I2cError::InvalidTiming`] when the source clock is zero or
    /// the divisors do not fit the 8-bit registers.
    pub fn resolve(&self, speed: I2cSpeed) -> Result<BusTiming, I2cError> {
        if self.clk_src == 0 {
            return Err(I2cError::InvalidTiming);
        }

        let prescaler = match self.manual_prescaler {
            Some(psc) => psc,
            None => {
                let divisor = (self.clk_src / speed.target_internal_clock()).max(1);
                u8::try_from(divisor - 1).map_err(|_| I2cError::InvalidTiming)?
            }
        };
        let internal_clock = self.clk_src / (u32::from(prescaler) + 1);
        let half_period = internal_clock / (2 * speed.hz());

        let scl_low = match self.manual_scl_low {
            Some(v) => v,
            None => half_period
                .checked_sub(7)
                .and_then(|v| u8::try_from(v).ok())
                .ok_or(I2cError::InvalidTiming)?,
        };
        let scl_high = match self.manual_scl_high {
            Some(v) => v,
            None => half_period
                .checked_sub(5)
                .and_then(|v| u8::try_from(v).ok())
                .ok_or(I2cError::InvalidTiming)?,
        };

        Ok(BusTiming {
            prescaler,
            scl_low,
            scl_high,
            internal_clock,
        })
    }
}

pub struct I2cConfig {
    pub speed: I2cSpeed,
    pub timing_config: TimingConfig,
    /// Bound on waiting for another caller to release the bus lock.
    pub lock_timeout: MillisDurationU32,
    /// Bound on waiting for the hardware bus-busy flag to clear.
    pub bus_busy_timeout: MillisDurationU32,
    /// Bound on waiting for the interrupt handler to finish a transfer.
    pub completion_timeout: MillisDurationU32,
    /// Reads of the clock-control register before giving up.
    pub clock_poll_limit: u32,
    /// Hold time after STOP before the bus lock is released.
    pub stop_settle: Option<MicrosDurationU32>,
}

impl Default for I2cConfig {
    fn default() -> Self {
        I2cConfigBuilder::new().build()
    }
}

impl I2cConfig {
    /// Settle time after STOP: the configured value, or ten bit-times at the
    /// configured bus speed.
    #[must_use]
    pub fn stop_settle_time(&self) -> MicrosDurationU32 {
        self.stop_settle.unwrap_or_else(|| {
            MicrosDurationU32::micros((10_000_000 / self.speed.hz()).max(1))
        })
    }
}

pub struct I2cConfigBuilder {
    speed: I2cSpeed,
    timing_config: Option<TimingConfig>,
    lock_timeout: MillisDurationU32,
    bus_busy_timeout: MillisDurationU32,
    completion_timeout: MillisDurationU32,
    clock_poll_limit: u32,
    stop_settle: Option<MicrosDurationU32>,
}

impl Default for I2cConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            speed: I2cSpeed::Fast,
            timing_config: None,
            lock_timeout: MillisDurationU32::millis(100),
            bus_busy_timeout: MillisDurationU32::millis(100),
            completion_timeout: MillisDurationU32::millis(100),
            clock_poll_limit: 1000,
            stop_settle: None,
        }
    }
    #[must_use]
    pub fn speed(mut self, speed: I2cSpeed) -> Self {
        self.speed = speed;
        self
    }
    #[must_use]
    pub fn timing_config(mut self, config: TimingConfig) -> Self {
        self.timing_config = Some(config);
        self
    }
    #[must_use]
    pub fn lock_timeout(mut self, timeout: MillisDurationU32) -> Self {
        self.lock_timeout = timeout;
        self
    }
    #[must_use]
    pub fn bus_busy_timeout(mut self, timeout: MillisDurationU32) -> Self {
        self.bus_busy_timeout = timeout;
        self
    }
    #[must_use]
    pub fn completion_timeout(mut self, timeout: MillisDurationU32) -> Self {
        self.completion_timeout = timeout;
        self
    }
    #[must_use]
    pub fn clock_poll_limit(mut self, limit: u32) -> Self {
        self.clock_poll_limit = limit;
        self
    }
    #[must_use]
    pub fn stop_settle(mut self, settle: MicrosDurationU32) -> Self {
        self.stop_settle = Some(settle);
        self
    }
    #[must_use]
    pub fn build(self) -> I2cConfig {
        I2cConfig {
            speed: self.speed,
            timing_config: self.timing_config.unwrap_or_default(),
            lock_timeout: self.lock_timeout,
            bus_busy_timeout: self.bus_busy_timeout,
            completion_timeout: self.completion_timeout,
            clock_poll_limit: self.clock_poll_limit,
            stop_settle: self.stop_settle,
        }
    }
}
