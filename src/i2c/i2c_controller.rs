// Licensed under the Apache-2.0 license

//! Blocking, interrupt-driven I2C bus master.
//!
//! A caller takes the bus lock, programs the first phase of the transfer,
//! issues START and sleeps. The interrupt handler moves the bytes, one flag
//! at a time, through the [`Transaction`] state machine and wakes the caller
//! exactly once with the outcome. The caller then issues STOP, waits for the
//! bus to settle and releases the lock.
//!
//! The controller is used through `&self` from any number of threads. It
//! implements the embedded-hal [`I2c`](embedded_hal::i2c::I2c) trait both by
//! value and by shared reference, so several device drivers can borrow one
//! controller as their bus.

use crate::common::{millis_to_duration, Logger, NoOpLogger, StdDelay};
use crate::i2c::bus_lock::BusLock;
use crate::i2c::clock::ClockGate;
use crate::i2c::common::{I2cConfig, I2cError};
use crate::i2c::registers::{offset, Con, Irq, RegisterPort, IRQ_CLEAR_ALL};
use crate::i2c::state_machine::{
    check_shape, InterruptEvent, Transaction, TransferKind, TransferOutcome, SERVICE_ORDER,
};
use crate::i2c::system_setup::I2cSystemSetup;
use crate::i2c::traits::{I2cBus, InterruptHandler, IrqReturn};
use core::cell::RefCell;
use critical_section::Mutex;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Operation, SevenBitAddress};
use std::sync::mpsc::{self, SyncSender};

/// State shared between the blocked caller and the interrupt handler.
struct Shared {
    transaction: Transaction,
    /// Wakes the caller. Taken by whoever finishes the transfer first, so
    /// the caller is signalled at most once.
    completion: Option<SyncSender<TransferOutcome>>,
}

pub struct I2cController<P: RegisterPort, C: RegisterPort, D = StdDelay, L: Logger = NoOpLogger> {
    port: P,
    clock: ClockGate<C>,
    config: I2cConfig,
    bus_lock: BusLock,
    shared: Mutex<RefCell<Shared>>,
    delay: D,
    logger: L,
}

impl<P, C, D, L> I2cController<P, C, D, L>
where
    P: RegisterPort,
    C: RegisterPort,
    D: DelayNs + Clone,
    L: Logger,
{
    pub fn new(port: P, clock: ClockGate<C>, config: I2cConfig, delay: D, logger: L) -> Self {
        Self {
            port,
            clock,
            config,
            bus_lock: BusLock::new(),
            shared: Mutex::new(RefCell::new(Shared {
                transaction: Transaction::new(),
                completion: None,
            })),
            delay,
            logger,
        }
    }

    pub fn config(&self) -> &I2cConfig {
        &self.config
    }

    /// Bring the controller up in master mode.
    ///
    /// Returns the internal clock (after the prescaler) in Hz.
    ///
    /// # Errors
    ///
    /// [`I2cError::BusBusy`] if another caller holds the bus,
    /// [`I2cError::InvalidTiming`] or [`I2cError::ClockTimeout`] from the
    /// setup sequence.
    pub fn init(&self) -> Result<u32, I2cError> {
        let _guard = self.acquire_bus()?;
        let timing = I2cSystemSetup::initialize(&self.port, &self.clock, &self.config)
            .inspect_err(|err| {
                self.logger.error(format_args!("controller init failed: {err}"));
            })?;
        self.logger.debug(format_args!(
            "controller up: {} Hz bus, ICLK {} Hz, PSC {} SCLL {} SCLH {}",
            self.config.speed.hz(),
            timing.internal_clock,
            timing.prescaler,
            timing.scl_low,
            timing.scl_high
        ));
        Ok(timing.internal_clock)
    }

    /// Quiesce the controller: interrupts masked, module disabled.
    ///
    /// Waits for the bus like any transfer, so no transfer is in flight
    /// when the registers are touched.
    ///
    /// # Errors
    ///
    /// [`I2cError::BusBusy`] if another caller still owns the bus after the
    /// lock timeout; nothing is touched in that case.
    pub fn deinit(&self) -> Result<(), I2cError> {
        let _guard = self.acquire_bus()?;
        I2cSystemSetup::shutdown(&self.port);
        self.logger.debug(format_args!("controller down"));
        Ok(())
    }

    /// Send `bytes` to `address`.
    ///
    /// # Errors
    ///
    /// - [`I2cError::InvalidArgument`] for an empty or over-capacity buffer,
    ///   before the bus is touched
    /// - [`I2cError::BusBusy`] if the bus lock or the hardware busy flag does
    ///   not clear in time
    /// - [`I2cError::ClockTimeout`] if the module clock cannot be woken
    /// - [`I2cError::Nacked`] if the device stops acknowledging
    /// - [`I2cError::CompletionTimeout`] if the transfer never completes
    pub fn write(&self, address: u8, bytes: &[u8]) -> Result<(), I2cError> {
        self.transfer(address, TransferKind::Write, bytes, 0).map(drop)
    }

    /// Read `length` bytes from `address`.
    ///
    /// # Errors
    ///
    /// As [`I2cController::write`]; a zero length is an invalid argument.
    pub fn read(&self, address: u8, length: u8) -> Result<Vec<u8>, I2cError> {
        self.transfer(address, TransferKind::Read, &[], usize::from(length))
    }

    /// Write the register index, repeated START, read one byte.
    ///
    /// # Errors
    ///
    /// As [`I2cController::write`].
    pub fn read_register(&self, address: u8, register: u8) -> Result<u8, I2cError> {
        self.write_read(address, &[register], 1)?
            .first()
            .copied()
            .ok_or(I2cError::CompletionTimeout)
    }

    /// Write `bytes`, then read `length` bytes after a repeated START.
    ///
    /// # Errors
    ///
    /// As [`I2cController::write`].
    pub fn write_read(
        &self,
        address: u8,
        bytes: &[u8],
        length: usize,
    ) -> Result<Vec<u8>, I2cError> {
        self.transfer(address, TransferKind::WriteRead, bytes, length)
    }

    fn acquire_bus(&self) -> Result<crate::i2c::bus_lock::BusGuard<'_>, I2cError> {
        self.bus_lock
            .acquire(millis_to_duration(self.config.lock_timeout))
            .inspect_err(|_| {
                self.logger.warn(format_args!(
                    "timed out after {} ms waiting for the bus lock",
                    self.config.lock_timeout.to_millis()
                ));
            })
    }

    fn transfer(
        &self,
        address: u8,
        kind: TransferKind,
        outbound: &[u8],
        inbound_len: usize,
    ) -> Result<Vec<u8>, I2cError> {
        if address > 0x7F || check_shape(kind, outbound.len(), inbound_len).is_err() {
            self.logger.warn(format_args!(
                "rejected {kind:?} to {address:#04x}: {} bytes out, {inbound_len} in",
                outbound.len()
            ));
            return Err(I2cError::InvalidArgument);
        }

        let guard = self.acquire_bus()?;
        self.logger.debug(format_args!("bus lock acquired for {address:#04x}"));
        let result = self.run_locked(address, kind, outbound, inbound_len);
        self.logger.debug(format_args!("bus lock releasing"));
        drop(guard);

        if let Err(err) = &result {
            self.logger
                .warn(format_args!("{kind:?} to {address:#04x} failed: {err}"));
        }
        result
    }

    /// One transfer, with the bus lock held by the caller.
    fn run_locked(
        &self,
        address: u8,
        kind: TransferKind,
        outbound: &[u8],
        inbound_len: usize,
    ) -> Result<Vec<u8>, I2cError> {
        if self.clock.ensure_enabled()? {
            self.logger.debug(format_args!("module clock woken"));
        }

        self.port.write32(offset::SA, u32::from(address));
        let program = critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            shared.completion = None;
            shared.transaction.prepare(kind, outbound, inbound_len)?;
            Ok::<_, I2cError>(shared.transaction.program())
        })?;
        self.port.write32(offset::CNT, program.count);
        self.port.write32(offset::CON, program.control.bits());
        I2cSystemSetup::mask_interrupts(&self.port);
        self.port.write32(offset::IRQENABLE_SET, program.interrupts.bits());

        let mut delay = self.delay.clone();
        if let Err(err) = self.wait_bus_idle(&mut delay) {
            self.port.write32(offset::IRQENABLE_CLR, IRQ_CLEAR_ALL);
            return Err(err);
        }

        let (done_tx, done_rx) = mpsc::sync_channel(1);
        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            shared.completion = Some(done_tx);
            shared.transaction.start();
        });
        self.port.modify32(offset::CON, |con| con | Con::STT.bits());

        let deadline = millis_to_duration(self.config.completion_timeout);
        let outcome = match done_rx.recv_timeout(deadline) {
            Ok(outcome) => outcome,
            Err(_) => {
                self.abandon();
                // the handler may have finished while we were giving up
                done_rx
                    .try_recv()
                    .unwrap_or(Err(I2cError::CompletionTimeout))
            }
        };

        // STOP goes out on every path once START has been issued.
        self.port
            .modify32(offset::CON, |con| (con & !Con::STT.bits()) | Con::STP.bits());
        delay.delay_us(self.config.stop_settle_time().to_micros());

        outcome?;
        Ok(critical_section::with(|cs| {
            self.shared
                .borrow_ref(cs)
                .transaction
                .buffer()
                .inbound()
                .to_vec()
        }))
    }

    /// Poll the bus-busy flag in 1 ms steps up to the configured bound.
    fn wait_bus_idle(&self, delay: &mut D) -> Result<(), I2cError> {
        let limit = self.config.bus_busy_timeout.to_millis();
        for waited in 0..=limit {
            if self.port.read32(offset::IRQSTATUS_RAW) & Irq::BB.bits() == 0 {
                return Ok(());
            }
            if waited < limit {
                delay.delay_ms(1);
            }
        }
        self.logger.warn(format_args!("bus still busy after {limit} ms"));
        Err(I2cError::BusBusy)
    }

    fn abandon(&self) {
        let was_active = critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            shared.completion = None;
            shared.transaction.abandon()
        });
        self.port.write32(offset::IRQENABLE_CLR, IRQ_CLEAR_ALL);
        if was_active {
            self.logger.warn(format_args!(
                "no completion within {} ms, transfer abandoned",
                self.config.completion_timeout.to_millis()
            ));
        }
    }

    /// Service the controller's interrupt.
    ///
    /// Pending flags are handled in a fixed order (NACK first) and every
    /// status bit is acknowledged before returning. Acknowledgement and the
    /// hand-off to the blocked caller happen in the same critical section,
    /// so a caller that gives up afterwards still finds the outcome.
    pub fn handle_interrupt(&self) -> IrqReturn {
        let raw = self.port.read32(offset::IRQSTATUS);
        if raw == 0 {
            return IrqReturn::None;
        }
        let status = Irq::from_bits_truncate(raw);

        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            let mut outcome = None;
            for flag in SERVICE_ORDER.into_iter().filter(|flag| status.contains(*flag)) {
                let event = if flag == Irq::NACK {
                    let phase = shared.transaction.phase();
                    self.logger.warn(format_args!("NACK, phase {phase:?}"));
                    InterruptEvent::Nack
                } else if flag == Irq::AL {
                    self.logger.warn(format_args!("arbitration lost"));
                    InterruptEvent::ArbitrationLost
                } else if flag == Irq::XRDY {
                    InterruptEvent::TxReady
                } else if flag == Irq::RRDY {
                    InterruptEvent::RxReady(self.port.read32(offset::DATA) as u8)
                } else {
                    InterruptEvent::AccessReady
                };

                let step = shared.transaction.on_event(event);
                for write in &step.writes {
                    write.apply(&self.port);
                }
                if step.outcome.is_some() {
                    outcome = step.outcome;
                }
            }

            self.port.write32(offset::IRQSTATUS, IRQ_CLEAR_ALL);
            if let Some(outcome) = outcome {
                if let Some(completion) = shared.completion.take() {
                    // the caller may already have given up; nobody is left to tell
                    let _ = completion.try_send(outcome);
                }
            }
        });
        IrqReturn::Handled
    }

    fn hal_read(&self, address: SevenBitAddress, buffer: &mut [u8]) -> Result<(), I2cError> {
        let bytes = self.transfer(address, TransferKind::Read, &[], buffer.len())?;
        for (slot, byte) in buffer.iter_mut().zip(bytes) {
            *slot = byte;
        }
        Ok(())
    }

    fn hal_write_read(
        &self,
        address: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), I2cError> {
        let read = self.transfer(address, TransferKind::WriteRead, bytes, buffer.len())?;
        for (slot, byte) in buffer.iter_mut().zip(read) {
            *slot = byte;
        }
        Ok(())
    }

    /// Only the shapes the controller can run without releasing the bus are
    /// accepted: a single write, a single read, or a write then a read.
    fn hal_transaction(
        &self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), I2cError> {
        let count = operations.len();
        match operations {
            [] => Ok(()),
            [Operation::Write(bytes)] => self.write(address, bytes),
            [Operation::Read(buffer)] => self.hal_read(address, buffer),
            [Operation::Write(bytes), Operation::Read(buffer)] => {
                self.hal_write_read(address, bytes, buffer)
            }
            _ => {
                self.logger
                    .warn(format_args!("unsupported transaction of {count} operations"));
                Err(I2cError::InvalidArgument)
            }
        }
    }

    #[cfg(test)]
    fn with_transaction<R>(&self, f: impl FnOnce(&Transaction) -> R) -> R {
        critical_section::with(|cs| f(&self.shared.borrow_ref(cs).transaction))
    }
}

impl<P, C, D, L> InterruptHandler for I2cController<P, C, D, L>
where
    P: RegisterPort,
    C: RegisterPort,
    D: DelayNs + Clone,
    L: Logger,
{
    fn handle_interrupt(&self) -> IrqReturn {
        I2cController::handle_interrupt(self)
    }
}

impl<P, C, D, L> I2cBus for I2cController<P, C, D, L>
where
    P: RegisterPort,
    C: RegisterPort,
    D: DelayNs + Clone,
    L: Logger,
{
    type Error = I2cError;

    fn write(&self, address: u8, bytes: &[u8]) -> Result<(), I2cError> {
        I2cController::write(self, address, bytes)
    }

    fn read(&self, address: u8, length: u8) -> Result<Vec<u8>, I2cError> {
        I2cController::read(self, address, length)
    }

    fn read_register(&self, address: u8, register: u8) -> Result<u8, I2cError> {
        I2cController::read_register(self, address, register)
    }
}

impl<P, C, D, L> embedded_hal::i2c::ErrorType for I2cController<P, C, D, L>
where
    P: RegisterPort,
    C: RegisterPort,
    L: Logger,
{
    type Error = I2cError;
}

impl<P, C, D, L> embedded_hal::i2c::I2c for I2cController<P, C, D, L>
where
    P: RegisterPort,
    C: RegisterPort,
    D: DelayNs + Clone,
    L: Logger,
{
    fn read(&mut self, address: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.hal_read(address, buffer)
    }

    fn write(&mut self, address: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        I2cController::write(self, address, bytes)
    }

    fn write_read(
        &mut self,
        address: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.hal_write_read(address, bytes, buffer)
    }

    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.hal_transaction(address, operations)
    }
}

impl<P, C, D, L> embedded_hal::i2c::ErrorType for &I2cController<P, C, D, L>
where
    P: RegisterPort,
    C: RegisterPort,
    L: Logger,
{
    type Error = I2cError;
}

impl<P, C, D, L> embedded_hal::i2c::I2c for &I2cController<P, C, D, L>
where
    P: RegisterPort,
    C: RegisterPort,
    D: DelayNs + Clone,
    L: Logger,
{
    fn read(&mut self, address: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.hal_read(address, buffer)
    }

    fn write(&mut self, address: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        I2cController::write(self, address, bytes)
    }

    fn write_read(
        &mut self,
        address: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.hal_write_read(address, bytes, buffer)
    }

    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.hal_transaction(address, operations)
    }
}
