// Licensed under the Apache-2.0 license

//! # I2C Driver Traits
//!
//! The driver exposes two seams:
//!
//! ```text
//! I2cBus           (blocking transfers, called by device drivers)
//! InterruptHandler (called from the controller's interrupt line)
//! ```
//!
//! Sensor and device drivers only ever depend on [`I2cBus`], so they can be
//! tested against a fake bus. The platform glue registers the controller's
//! [`InterruptHandler`] with whatever dispatches the I2C interrupt.
//!
//! # Examples
//!
//! ```rust,no_run
//! use am335x_i2c::i2c::I2cBus;
//!
//! const WHO_AM_I: u8 = 0x75;
//!
//! fn responds<B: I2cBus>(bus: &B, address: u8) -> Result<bool, B::Error> {
//!     bus.write(address, &[0x6B, 0x00])?;
//!     Ok(bus.read_register(address, WHO_AM_I)? == address)
//! }
//! ```

/// Whether an interrupt invocation found anything to service.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IrqReturn {
    /// At least one enabled status flag was pending and has been serviced.
    Handled,
    /// Nothing was pending; the line may be shared with another device.
    None,
}

/// Entry point for the controller's interrupt.
///
/// Takes `&self`: the handler runs concurrently with a caller blocked inside
/// a transfer on the same controller.
pub trait InterruptHandler {
    fn handle_interrupt(&self) -> IrqReturn;
}

/// Blocking bus-master transfers, one at a time per controller.
///
/// Every method may be called from any number of threads; calls are
/// serialized on the bus and each returns only after its STOP condition.
#[cfg(feature = "std")]
pub trait I2cBus {
    type Error: embedded_hal::i2c::Error;

    /// Send `bytes` to the 7-bit `address`.
    ///
    /// # Errors
    ///
    /// Fails on an empty or over-capacity buffer, a busy bus, a NACK, or a
    /// transfer that does not complete in time.
    fn write(&self, address: u8, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Read `length` bytes from `address`.
    ///
    /// # Errors
    ///
    /// As [`I2cBus::write`]; a zero length is rejected.
    fn read(&self, address: u8, length: u8) -> Result<Vec<u8>, Self::Error>;

    /// Write the register index, then read one byte back after a repeated
    /// START, without releasing the bus in between.
    ///
    /// # Errors
    ///
    /// As [`I2cBus::write`].
    fn read_register(&self, address: u8, register: u8) -> Result<u8, Self::Error>;
}
