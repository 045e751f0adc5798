// Licensed under the Apache-2.0 license

//! Register map of the AM335x I2C module and the port used to reach it.
//!
//! Every access is a single aligned 32-bit read or write at a fixed offset
//! from the mapped base. Values are never cached: two reads of the same
//! offset are two bus cycles.

use bitflags::bitflags;

/// Register offsets inside the I2C module block.
pub mod offset {
    pub const REVNB_LO: usize = 0x00;
    pub const REVNB_HI: usize = 0x04;
    pub const SYSC: usize = 0x10;
    pub const IRQSTATUS_RAW: usize = 0x24;
    pub const IRQSTATUS: usize = 0x28;
    pub const IRQENABLE_SET: usize = 0x2C;
    pub const IRQENABLE_CLR: usize = 0x30;
    pub const WE: usize = 0x34;
    pub const SYSS: usize = 0x90;
    pub const BUF: usize = 0x94;
    pub const CNT: usize = 0x98;
    pub const DATA: usize = 0x9C;
    pub const CON: usize = 0xA4;
    pub const OA: usize = 0xA8;
    pub const SA: usize = 0xAC;
    pub const PSC: usize = 0xB0;
    pub const SCLL: usize = 0xB4;
    pub const SCLH: usize = 0xB8;
}

bitflags! {
    /// I2C_CON bits.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Con: u32 {
        const EN = 1 << 15;
        const MST = 1 << 10;
        const TRX = 1 << 9;
        const STP = 1 << 1;
        const STT = 1 << 0;
    }
}

bitflags! {
    /// I2C_IRQSTATUS / IRQSTATUS_RAW / IRQENABLE_* bits.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Irq: u32 {
        const BB = 1 << 12;
        const XRDY = 1 << 4;
        const RRDY = 1 << 3;
        const ARDY = 1 << 2;
        const NACK = 1 << 1;
        const AL = 1 << 0;
    }
}

/// Write-one-to-clear mask covering every status/enable bit of the module.
pub const IRQ_CLEAR_ALL: u32 = 0x0000_6FFF;

/// Clock-control register bits (CM_PER_I2Cx_CLKCTRL / CM_WKUP_I2C0_CLKCTRL).
pub mod clkctrl {
    /// MODULEMODE = ENABLE.
    pub const MODULEMODE_ENABLE: u32 = 0x0000_0002;
    /// MODULEMODE and IDLEST fields.
    pub const STATUS_MASK: u32 = 0x0003_0003;
    /// MODULEMODE enabled and IDLEST functional.
    pub const ENABLED: u32 = MODULEMODE_ENABLE;
}

/// Typed accessor over a memory-mapped register block.
pub trait RegisterPort {
    fn read32(&self, offset: usize) -> u32;
    fn write32(&self, offset: usize, value: u32);

    /// Read-modify-write of a single register.
    fn modify32(&self, offset: usize, f: impl FnOnce(u32) -> u32) {
        let value = self.read32(offset);
        self.write32(offset, f(value));
    }
}

impl<P: RegisterPort + ?Sized> RegisterPort for &P {
    fn read32(&self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        (**self).write32(offset, value);
    }
}

/// A register write produced by the transaction state machine.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegisterWrite {
    pub offset: usize,
    pub value: u32,
}

impl RegisterWrite {
    #[must_use]
    pub const fn new(offset: usize, value: u32) -> Self {
        Self { offset, value }
    }

    pub fn apply<P: RegisterPort + ?Sized>(&self, port: &P) {
        port.write32(self.offset, self.value);
    }
}

/// Volatile MMIO access at `base + offset`.
#[derive(Debug)]
pub struct MmioRegisterPort {
    base: usize,
}

impl MmioRegisterPort {
    /// # Safety
    ///
    /// `base` must be the address of a mapped register block that stays
    /// valid for the lifetime of the port, and nothing else may assume
    /// exclusive ownership of it.
    #[must_use]
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    #[must_use]
    pub const fn base(&self) -> usize {
        self.base
    }
}

impl RegisterPort for MmioRegisterPort {
    fn read32(&self, offset: usize) -> u32 {
        debug_assert_eq!(offset % 4, 0);
        // SAFETY: `new` requires `base` to map a live register block.
        unsafe { core::ptr::read_volatile((self.base + offset) as *const u32) }
    }

    fn write32(&self, offset: usize, value: u32) {
        debug_assert_eq!(offset % 4, 0);
        // SAFETY: `new` requires `base` to map a live register block.
        unsafe { core::ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }
}
