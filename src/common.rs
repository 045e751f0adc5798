// Licensed under the Apache-2.0 license

//! Crate-wide helpers shared by the driver modules: logging sinks and delays.

use core::fmt;

/// Sink for driver diagnostics.
///
/// Methods take `&self` because the interrupt handler logs too, and it only
/// ever sees the controller through a shared reference.
pub trait Logger {
    fn debug(&self, args: fmt::Arguments<'_>);
    fn warn(&self, args: fmt::Arguments<'_>);
    fn error(&self, args: fmt::Arguments<'_>);
}

/// Logger that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn debug(&self, _args: fmt::Arguments<'_>) {}
    fn warn(&self, _args: fmt::Arguments<'_>) {}
    fn error(&self, _args: fmt::Arguments<'_>) {}
}

/// Forwards driver diagnostics to the `log` facade under the `am335x_i2c`
/// target, so whatever logger the embedding system installed picks them up.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogLogger;

impl Logger for LogLogger {
    fn debug(&self, args: fmt::Arguments<'_>) {
        log::debug!(target: "am335x_i2c", "{args}");
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        log::warn!(target: "am335x_i2c", "{args}");
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        log::error!(target: "am335x_i2c", "{args}");
    }
}

impl<L: Logger + ?Sized> Logger for &L {
    fn debug(&self, args: fmt::Arguments<'_>) {
        (**self).debug(args);
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        (**self).warn(args);
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        (**self).error(args);
    }
}

/// `DelayNs` backed by `std::thread::sleep`.
#[cfg(feature = "std")]
#[derive(Clone, Copy, Debug, Default)]
pub struct StdDelay;

#[cfg(feature = "std")]
impl embedded_hal::delay::DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(core::time::Duration::from_nanos(u64::from(ns)));
    }
}

/// Convert a fugit millisecond duration into a `core::time::Duration`.
#[must_use]
pub fn millis_to_duration(duration: fugit::MillisDurationU32) -> core::time::Duration {
    core::time::Duration::from_millis(u64::from(duration.to_millis()))
}
