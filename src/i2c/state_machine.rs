// Licensed under the Apache-2.0 license

//! Transaction state machine driven by the controller's interrupt flags.
//!
//! The machine is hardware free: it consumes [`InterruptEvent`]s and answers
//! with a [`Step`] listing the register writes to perform and, on a terminal
//! transition, the outcome to hand to the blocked caller. The interrupt
//! handler is the only thing that applies those writes.
//!
//! Phases are visited in the fixed order
//! `Transmitting -> [AwaitingAccessReady ->] Receiving -> Done`, with the
//! bracketed phase only used by combined write-then-read transfers.

use crate::i2c::common::{I2cError, TRANSFER_CAPACITY};
use crate::i2c::registers::{offset, Con, Irq, RegisterWrite, IRQ_CLEAR_ALL};
use crate::i2c::transaction::TransactionBuffer;
use heapless::HistoryBuffer;

const MAX_STEP_WRITES: usize = 4;
const TRACE_DEPTH: usize = 32;

/// Status bits in the order the interrupt handler services them. A NACK
/// fails the transfer before any data flag raised alongside it is looked at.
pub const SERVICE_ORDER: [Irq; 5] = [Irq::NACK, Irq::AL, Irq::XRDY, Irq::RRDY, Irq::ARDY];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Transmitting,
    AwaitingAccessReady,
    Receiving,
    Done,
}

impl Phase {
    /// Phases in which the interrupt handler owns the transfer.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Phase::Transmitting | Phase::AwaitingAccessReady | Phase::Receiving
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransferKind {
    Write,
    Read,
    /// Write, then repeated START into a read without releasing the bus.
    WriteRead,
}

/// Reject transfers that do not match `kind` (a write without bytes, a read
/// without length) or that exceed the transaction buffer.
///
/// # Errors
///
/// [`I2cError::InvalidArgument`] on any mismatch.
pub fn check_shape(kind: TransferKind, out_len: usize, in_len: usize) -> Result<(), I2cError> {
    let shape_ok = match kind {
        TransferKind::Write => out_len > 0 && in_len == 0,
        TransferKind::Read => out_len == 0 && in_len > 0,
        TransferKind::WriteRead => out_len > 0 && in_len > 0,
    };
    if shape_ok && out_len <= TRANSFER_CAPACITY && in_len <= TRANSFER_CAPACITY {
        Ok(())
    } else {
        Err(I2cError::InvalidArgument)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InterruptEvent {
    TxReady,
    /// Carries the byte the handler pulled from the data register.
    RxReady(u8),
    AccessReady,
    Nack,
    ArbitrationLost,
}

pub type TransferOutcome = Result<(), I2cError>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Trace {
    Armed(TransferKind),
    Tx(u8),
    Rx(u8),
    AccessReady,
    Nack,
    ArbitrationLost,
    Spurious(Phase, InterruptEvent),
    Complete,
    Abandoned,
}

/// Transitions taken during the current transaction.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TransitionCounts {
    pub tx_ready: usize,
    pub rx_ready: usize,
    pub access_ready: usize,
}

/// Register programming for the first phase of a transfer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Program {
    pub count: u32,
    pub control: Con,
    pub interrupts: Irq,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Step {
    pub writes: heapless::Vec<RegisterWrite, MAX_STEP_WRITES>,
    pub outcome: Option<TransferOutcome>,
}

impl Step {
    fn write(&mut self, offset: usize, value: u32) {
        let pushed = self.writes.push(RegisterWrite::new(offset, value)).is_ok();
        debug_assert!(pushed, "step write capacity exceeded");
    }
}

pub struct Transaction {
    phase: Phase,
    kind: TransferKind,
    buffer: TransactionBuffer,
    counts: TransitionCounts,
    trace: HistoryBuffer<Trace, TRACE_DEPTH>,
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl Transaction {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: Phase::Idle,
            kind: TransferKind::Write,
            buffer: TransactionBuffer::new(),
            counts: TransitionCounts {
                tx_ready: 0,
                rx_ready: 0,
                access_ready: 0,
            },
            trace: HistoryBuffer::new(),
        }
    }

    /// Reset the buffer and load a new transfer. The machine stays `Idle`
    /// until [`Transaction::start`].
    ///
    /// # Errors
    ///
    /// [`I2cError::InvalidArgument`] as for [`check_shape`].
    pub fn prepare(
        &mut self,
        kind: TransferKind,
        outbound: &[u8],
        inbound_len: usize,
    ) -> Result<(), I2cError> {
        self.phase = Phase::Idle;
        self.buffer.reset();
        self.counts = TransitionCounts::default();
        check_shape(kind, outbound.len(), inbound_len)?;
        self.buffer.load_outbound(outbound)?;
        self.buffer.expect_inbound(inbound_len)?;
        self.kind = kind;
        Ok(())
    }

    /// Controller programming for the first phase of the prepared transfer.
    #[must_use]
    pub fn program(&self) -> Program {
        match self.kind {
            TransferKind::Write => Program {
                count: self.buffer.outbound_len() as u32,
                control: Con::EN | Con::MST | Con::TRX,
                interrupts: Irq::XRDY | Irq::NACK | Irq::AL,
            },
            TransferKind::WriteRead => Program {
                count: self.buffer.outbound_len() as u32,
                control: Con::EN | Con::MST | Con::TRX,
                interrupts: Irq::XRDY | Irq::ARDY | Irq::NACK | Irq::AL,
            },
            TransferKind::Read => Program {
                count: self.buffer.inbound_len() as u32,
                control: Con::EN | Con::MST,
                interrupts: Irq::RRDY | Irq::NACK | Irq::AL,
            },
        }
    }

    /// Hand the prepared transfer to the interrupt handler.
    pub fn start(&mut self) -> Phase {
        self.phase = match self.kind {
            TransferKind::Write | TransferKind::WriteRead => Phase::Transmitting,
            TransferKind::Read => Phase::Receiving,
        };
        self.trace.write(Trace::Armed(self.kind));
        self.phase
    }

    /// Take the transfer away from the interrupt handler after the caller
    /// gave up waiting. Returns whether it was still in flight.
    pub fn abandon(&mut self) -> bool {
        let was_active = self.phase.is_active();
        if was_active {
            self.trace.write(Trace::Abandoned);
        }
        self.phase = Phase::Done;
        was_active
    }

    pub fn on_event(&mut self, event: InterruptEvent) -> Step {
        let mut step = Step::default();

        match (self.phase, event) {
            (phase, InterruptEvent::Nack) if phase.is_active() => {
                self.trace.write(Trace::Nack);
                step.write(offset::IRQENABLE_CLR, IRQ_CLEAR_ALL);
                self.finish(&mut step, Err(I2cError::Nacked));
            }
            (_, InterruptEvent::ArbitrationLost) => {
                self.trace.write(Trace::ArbitrationLost);
            }
            (Phase::Transmitting, InterruptEvent::TxReady) => {
                let Some(byte) = self.buffer.next_outbound() else {
                    self.trace.write(Trace::Spurious(self.phase, event));
                    return step;
                };
                self.counts.tx_ready += 1;
                self.trace.write(Trace::Tx(byte));
                step.write(offset::DATA, u32::from(byte));

                if self.buffer.outbound_done() {
                    match self.kind {
                        TransferKind::WriteRead => self.phase = Phase::AwaitingAccessReady,
                        TransferKind::Write | TransferKind::Read => {
                            step.write(offset::IRQENABLE_CLR, Irq::XRDY.bits());
                            self.finish(&mut step, Ok(()));
                        }
                    }
                }
            }
            (Phase::AwaitingAccessReady, InterruptEvent::AccessReady) => {
                self.counts.access_ready += 1;
                self.trace.write(Trace::AccessReady);
                step.write(offset::IRQENABLE_CLR, (Irq::ARDY | Irq::XRDY).bits());
                step.write(offset::CNT, self.buffer.inbound_len() as u32);
                step.write(
                    offset::CON,
                    (Con::EN | Con::MST | Con::STP | Con::STT).bits(),
                );
                step.write(offset::IRQENABLE_SET, Irq::RRDY.bits());
                self.phase = Phase::Receiving;
            }
            (Phase::Receiving, InterruptEvent::RxReady(byte)) => {
                self.counts.rx_ready += 1;
                self.trace.write(Trace::Rx(byte));
                self.buffer.push_inbound(byte);

                if self.buffer.inbound_done() {
                    step.write(offset::IRQENABLE_CLR, Irq::RRDY.bits());
                    self.finish(&mut step, Ok(()));
                }
            }
            (phase, event) => {
                self.trace.write(Trace::Spurious(phase, event));
            }
        }

        step
    }

    fn finish(&mut self, step: &mut Step, outcome: TransferOutcome) {
        if outcome.is_ok() {
            self.trace.write(Trace::Complete);
        }
        self.phase = Phase::Done;
        step.outcome = Some(outcome);
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn kind(&self) -> TransferKind {
        self.kind
    }

    #[must_use]
    pub fn buffer(&self) -> &TransactionBuffer {
        &self.buffer
    }

    #[must_use]
    pub fn counts(&self) -> TransitionCounts {
        self.counts
    }

    /// Trace entries, oldest first.
    pub fn trace(&self) -> impl Iterator<Item = &Trace> {
        self.trace.oldest_ordered()
    }
}
