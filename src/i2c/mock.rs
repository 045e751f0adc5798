// Licensed under the Apache-2.0 license

//! Test doubles for the controller: a simulated I2C register block with a
//! scripted target device, a clock-control register, a recording logger and
//! an interrupt line that calls the handler while an enabled flag is pending.
//!
//! XRDY and RRDY behave like level interrupts driven by the byte counter, so
//! they re-assert after being cleared as long as bytes remain. ARDY and NACK
//! are edges that the target posts after the byte that caused them; they
//! become visible once the handler acknowledges the current status, the way
//! they would after a byte time on a real bus.

use crate::common::Logger;
use crate::i2c::registers::{clkctrl, offset, Con, Irq, RegisterPort};
use crate::i2c::traits::InterruptHandler;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    Read(usize, u32),
    Write(usize, u32),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mode {
    Idle,
    Transmit { remaining: u32 },
    Receive { remaining: u32 },
}

#[derive(Debug)]
struct TargetState {
    regs: HashMap<usize, u32>,
    enabled: u32,
    edges: u32,
    posted: u32,
    mode: Mode,
    bus_busy: bool,
    silent: bool,
    nack_after: Option<usize>,
    sent_in_transfer: usize,
    rx_script: VecDeque<u8>,
    sent: Vec<u8>,
    log: Vec<Access>,
}

impl TargetState {
    fn raw_status(&self) -> u32 {
        let level = match self.mode {
            Mode::Transmit { remaining } if remaining > 0 => Irq::XRDY.bits(),
            Mode::Receive { remaining } if remaining > 0 => Irq::RRDY.bits(),
            _ => 0,
        };
        let busy = if self.bus_busy { Irq::BB.bits() } else { 0 };
        self.edges | level | busy
    }

    fn start(&mut self, con: u32) {
        if self.silent {
            return;
        }
        self.sent_in_transfer = 0;
        if self.nack_after == Some(0) {
            self.mode = Mode::Idle;
            self.edges |= Irq::NACK.bits();
            return;
        }
        let count = self.regs.get(&offset::CNT).copied().unwrap_or(0);
        self.mode = if con & Con::TRX.bits() != 0 {
            Mode::Transmit { remaining: count }
        } else {
            Mode::Receive { remaining: count }
        };
    }

    fn transmit(&mut self, value: u32) {
        let Mode::Transmit { remaining } = self.mode else {
            return;
        };
        if remaining == 0 {
            return;
        }
        self.sent.push(value as u8);
        self.sent_in_transfer += 1;
        if self.nack_after == Some(self.sent_in_transfer) {
            self.mode = Mode::Idle;
            self.posted |= Irq::NACK.bits();
        } else if remaining == 1 {
            self.mode = Mode::Idle;
            self.posted |= Irq::ARDY.bits();
        } else {
            self.mode = Mode::Transmit {
                remaining: remaining - 1,
            };
        }
    }

    fn receive(&mut self) -> u32 {
        let Mode::Receive { remaining } = self.mode else {
            return 0;
        };
        if remaining == 0 {
            return 0;
        }
        let byte = self.rx_script.pop_front().unwrap_or(0xFF);
        if remaining == 1 {
            self.mode = Mode::Idle;
            self.posted |= Irq::ARDY.bits();
        } else {
            self.mode = Mode::Receive {
                remaining: remaining - 1,
            };
        }
        u32::from(byte)
    }
}

type Hook = Box<dyn FnMut() + Send>;

/// Simulated I2C register block with a target device behind it.
#[derive(Clone)]
pub struct MockI2cRegisters {
    state: Arc<Mutex<TargetState>>,
    on_status_ack: Arc<Mutex<Option<Hook>>>,
}

impl Default for MockI2cRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl MockI2cRegisters {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TargetState {
                regs: HashMap::new(),
                enabled: 0,
                edges: 0,
                posted: 0,
                mode: Mode::Idle,
                bus_busy: false,
                silent: false,
                nack_after: None,
                sent_in_transfer: 0,
                rx_script: VecDeque::new(),
                sent: Vec::new(),
                log: Vec::new(),
            })),
            on_status_ack: Arc::new(Mutex::new(None)),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut TargetState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    /// Bytes the target returns on successive reads.
    pub fn script_rx(&self, bytes: &[u8]) {
        self.with(|s| s.rx_script.extend(bytes.iter().copied()));
    }

    /// NACK after `count` bytes of a transmit (0 refuses the address).
    pub fn nack_after(&self, count: Option<usize>) {
        self.with(|s| s.nack_after = count);
    }

    /// Target never reacts to START.
    pub fn set_silent(&self, silent: bool) {
        self.with(|s| s.silent = silent);
    }

    /// Run `hook` right after every write to IRQSTATUS.
    pub fn on_status_ack(&self, hook: impl FnMut() + Send + 'static) {
        *self.on_status_ack.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn set_bus_busy(&self, busy: bool) {
        self.with(|s| s.bus_busy = busy);
    }

    /// Whether an enabled interrupt flag is asserted. Not logged.
    pub fn irq_pending(&self) -> bool {
        self.with(|s| s.raw_status() & s.enabled != 0)
    }

    pub fn sent(&self) -> Vec<u8> {
        self.with(|s| s.sent.clone())
    }

    pub fn log(&self) -> Vec<Access> {
        self.with(|s| s.log.clone())
    }

    pub fn clear_log(&self) {
        self.with(|s| s.log.clear());
    }

    /// Values written to `offset`, oldest first.
    pub fn writes_to(&self, offset: usize) -> Vec<u32> {
        self.log()
            .into_iter()
            .filter_map(|access| match access {
                Access::Write(o, v) if o == offset => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn reg(&self, offset: usize) -> u32 {
        self.with(|s| s.regs.get(&offset).copied().unwrap_or(0))
    }

    pub fn enabled(&self) -> u32 {
        self.with(|s| s.enabled)
    }
}

impl RegisterPort for MockI2cRegisters {
    fn read32(&self, off: usize) -> u32 {
        self.with(|s| {
            let value = match off {
                offset::IRQSTATUS_RAW => s.raw_status(),
                offset::IRQSTATUS => s.raw_status() & s.enabled,
                offset::IRQENABLE_SET | offset::IRQENABLE_CLR => s.enabled,
                offset::DATA => s.receive(),
                _ => s.regs.get(&off).copied().unwrap_or(0),
            };
            s.log.push(Access::Read(off, value));
            value
        })
    }

    fn write32(&self, off: usize, value: u32) {
        self.with(|s| {
            s.log.push(Access::Write(off, value));
            match off {
                offset::IRQENABLE_SET => s.enabled |= value,
                offset::IRQENABLE_CLR => s.enabled &= !value,
                offset::IRQSTATUS => {
                    s.edges &= !value;
                    s.edges |= core::mem::take(&mut s.posted);
                }
                offset::DATA => s.transmit(value),
                offset::CON => {
                    s.regs.insert(off, value);
                    let start = Con::EN | Con::STT;
                    if value & start.bits() == start.bits() {
                        s.start(value);
                    }
                }
                _ => {
                    s.regs.insert(off, value);
                }
            }
        });
        if off == offset::IRQSTATUS {
            if let Some(hook) = self.on_status_ack.lock().unwrap().as_mut() {
                hook();
            }
        }
    }
}

#[derive(Debug, Default)]
struct ClockState {
    value: u32,
    reads: usize,
    writes: usize,
    stuck: bool,
    idle_reads: usize,
}

/// A CLKCTRL register that echoes MODULEMODE, optionally after reporting
/// the module as still transitioning for a few reads.
#[derive(Clone, Debug)]
pub struct MockClockRegisters {
    clkctrl_offset: usize,
    state: Arc<Mutex<ClockState>>,
}

impl MockClockRegisters {
    pub fn new(clkctrl_offset: usize) -> Self {
        Self {
            clkctrl_offset,
            state: Arc::new(Mutex::new(ClockState::default())),
        }
    }

    pub fn set_stuck(&self, stuck: bool) {
        self.state.lock().unwrap().stuck = stuck;
    }

    pub fn set_idle_reads(&self, reads: usize) {
        self.state.lock().unwrap().idle_reads = reads;
    }

    pub fn value(&self) -> u32 {
        self.state.lock().unwrap().value
    }

    pub fn reads(&self) -> usize {
        self.state.lock().unwrap().reads
    }

    pub fn writes(&self) -> usize {
        self.state.lock().unwrap().writes
    }
}

impl RegisterPort for MockClockRegisters {
    fn read32(&self, off: usize) -> u32 {
        let mut s = self.state.lock().unwrap();
        s.reads += 1;
        if off != self.clkctrl_offset {
            return 0;
        }
        if s.idle_reads > 0 && s.value & clkctrl::MODULEMODE_ENABLE != 0 {
            s.idle_reads -= 1;
            // IDLEST = transitioning
            return s.value | 0x0001_0000;
        }
        s.value
    }

    fn write32(&self, off: usize, value: u32) {
        let mut s = self.state.lock().unwrap();
        s.writes += 1;
        if off == self.clkctrl_offset && !s.stuck {
            s.value = value;
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Level {
    Debug,
    Warn,
    Error,
}

#[derive(Clone, Debug)]
pub struct LogEntry {
    pub level: Level,
    pub thread: ThreadId,
    pub message: String,
}

/// Logger that keeps every message with the thread that produced it.
#[derive(Clone, Debug, Default)]
pub struct RecordingLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl RecordingLogger {
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries()
            .iter()
            .any(|entry| entry.message.contains(needle))
    }

    fn record(&self, level: Level, args: fmt::Arguments<'_>) {
        self.entries.lock().unwrap().push(LogEntry {
            level,
            thread: thread::current().id(),
            message: args.to_string(),
        });
    }
}

impl Logger for RecordingLogger {
    fn debug(&self, args: fmt::Arguments<'_>) {
        self.record(Level::Debug, args);
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        self.record(Level::Warn, args);
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        self.record(Level::Error, args);
    }
}

/// Background thread standing in for the interrupt controller.
pub struct InterruptLine {
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl InterruptLine {
    pub fn spawn<H>(handler: Arc<H>, registers: MockI2cRegisters) -> Self
    where
        H: InterruptHandler + Send + Sync + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let worker = {
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    if registers.irq_pending() {
                        handler.handle_interrupt();
                    } else {
                        thread::sleep(Duration::from_micros(20));
                    }
                }
            })
        };
        Self {
            stop,
            worker: Some(worker),
        }
    }
}

impl Drop for InterruptLine {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
