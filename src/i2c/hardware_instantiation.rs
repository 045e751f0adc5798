// Licensed under the Apache-2.0 license

//! # I2C Controller Instances for the AM335x
//!
//! The SoC carries three identical I2C modules. They differ only in where
//! their register block lives and which clock-control register gates them:
//!
//! | Instance | Registers    | Clock module         | CLKCTRL offset |
//! |----------|--------------|----------------------|----------------|
//! | I2C0     | `0x44E0B000` | CM_WKUP `0x44E00400` | `0xB8`         |
//! | I2C1     | `0x4802A000` | CM_PER `0x44E00000`  | `0x48`         |
//! | I2C2     | `0x4819C000` | CM_PER `0x44E00000`  | `0x44`         |
//!
//! Because all three share one register layout, a single controller type
//! ([`MmioI2cController`]) serves every instance; the enum only selects
//! addresses.
//!
//! ```rust,no_run
//! use am335x_i2c::common::{LogLogger, StdDelay};
//! use am335x_i2c::i2c::{mmio_controller, I2cConfig, I2cInstance};
//!
//! // SAFETY: runs on the target, where the blocks are mapped and unused.
//! let config = I2cConfig::default();
//! let bus = unsafe { mmio_controller(I2cInstance::I2c2, config, StdDelay, LogLogger) };
//! bus.init().unwrap();
//! ```

use crate::common::Logger;
use crate::i2c::clock::ClockGate;
use crate::i2c::common::I2cConfig;
use crate::i2c::i2c_controller::I2cController;
use crate::i2c::registers::MmioRegisterPort;
use embedded_hal::delay::DelayNs;

const CM_PER_BASE: usize = 0x44E0_0000;
const CM_WKUP_BASE: usize = 0x44E0_0400;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum I2cInstance {
    I2c0,
    I2c1,
    I2c2,
}

impl I2cInstance {
    pub const ALL: [I2cInstance; 3] = [I2cInstance::I2c0, I2cInstance::I2c1, I2cInstance::I2c2];

    #[must_use]
    pub const fn bus_number(self) -> u8 {
        match self {
            I2cInstance::I2c0 => 0,
            I2cInstance::I2c1 => 1,
            I2cInstance::I2c2 => 2,
        }
    }

    #[must_use]
    pub const fn from_bus_number(bus: u8) -> Option<Self> {
        match bus {
            0 => Some(I2cInstance::I2c0),
            1 => Some(I2cInstance::I2c1),
            2 => Some(I2cInstance::I2c2),
            _ => None,
        }
    }

    /// Physical base of the module's register block.
    #[must_use]
    pub const fn register_base(self) -> usize {
        match self {
            I2cInstance::I2c0 => 0x44E0_B000,
            I2cInstance::I2c1 => 0x4802_A000,
            I2cInstance::I2c2 => 0x4819_C000,
        }
    }

    /// Base of the clock module holding this instance's CLKCTRL register.
    #[must_use]
    pub const fn clock_module_base(self) -> usize {
        match self {
            I2cInstance::I2c0 => CM_WKUP_BASE,
            I2cInstance::I2c1 | I2cInstance::I2c2 => CM_PER_BASE,
        }
    }

    #[must_use]
    pub const fn clkctrl_offset(self) -> usize {
        match self {
            I2cInstance::I2c0 => 0xB8,
            I2cInstance::I2c1 => 0x48,
            I2cInstance::I2c2 => 0x44,
        }
    }
}

pub type MmioI2cController<D, L> = I2cController<MmioRegisterPort, MmioRegisterPort, D, L>;

/// Build a controller over the fixed register blocks of `instance`.
///
/// # Safety
///
/// The register block and clock module of `instance` must be mapped at
/// their physical addresses, and no other controller for the same instance
/// may exist.
pub unsafe fn mmio_controller<D, L>(
    instance: I2cInstance,
    config: I2cConfig,
    delay: D,
    logger: L,
) -> MmioI2cController<D, L>
where
    D: DelayNs + Clone,
    L: Logger,
{
    controller_at(
        instance.register_base(),
        instance.clock_module_base(),
        instance.clkctrl_offset(),
        config,
        delay,
        logger,
    )
}

/// Build a controller over register blocks at arbitrary addresses, for
/// remapped windows.
///
/// # Safety
///
/// `register_base` and `clock_base` must map live register blocks laid out
/// like the AM335x I2C and clock modules, for the controller's lifetime.
pub unsafe fn controller_at<D, L>(
    register_base: usize,
    clock_base: usize,
    clkctrl_offset: usize,
    config: I2cConfig,
    delay: D,
    logger: L,
) -> MmioI2cController<D, L>
where
    D: DelayNs + Clone,
    L: Logger,
{
    let clock = ClockGate::new(
        MmioRegisterPort::new(clock_base),
        clkctrl_offset,
        config.clock_poll_limit,
    );
    I2cController::new(
        MmioRegisterPort::new(register_base),
        clock,
        config,
        delay,
        logger,
    )
}
