// Licensed under the Apache-2.0 license

//! AM335x I2C bus-master driver module.
//!
//! The hardware-free pieces (register map, timing, transaction state machine)
//! build without `std`. The blocking controller, which parks callers on a
//! lock and a completion channel, needs the `std` feature.

#[cfg(feature = "std")]
pub mod bus_lock;
pub mod clock;
pub mod common;
#[cfg(feature = "std")]
pub mod hardware_instantiation;
#[cfg(feature = "std")]
pub mod i2c_controller;
#[cfg(test)]
pub(crate) mod mock;
pub mod registers;
pub mod state_machine;
pub mod system_setup;
pub mod traits;
pub mod transaction;

pub use common::{
    BusTiming, I2cConfig, I2cConfigBuilder, I2cError, I2cSpeed, TimingConfig, TRANSFER_CAPACITY,
};
#[cfg(feature = "std")]
pub use hardware_instantiation::{controller_at, mmio_controller, I2cInstance, MmioI2cController};
#[cfg(feature = "std")]
pub use i2c_controller::I2cController;
pub use registers::{MmioRegisterPort, RegisterPort};
#[cfg(feature = "std")]
pub use traits::I2cBus;
pub use traits::{InterruptHandler, IrqReturn};
