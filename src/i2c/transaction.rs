// Licensed under the Apache-2.0 license

//! The shared transaction buffer.
//!
//! One buffer exists per controller. It is owned by whichever caller holds
//! the bus lock, plus the interrupt handler acting for that caller, and is
//! reset at the start of every transaction.

use crate::i2c::common::{I2cError, TRANSFER_CAPACITY};
use heapless::Vec;

#[derive(Debug, Default)]
pub struct TransactionBuffer {
    outbound: Vec<u8, TRANSFER_CAPACITY>,
    out_cursor: usize,
    inbound: Vec<u8, TRANSFER_CAPACITY>,
    in_len: usize,
}

impl TransactionBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            outbound: Vec::new(),
            out_cursor: 0,
            inbound: Vec::new(),
            in_len: 0,
        }
    }

    /// Zero lengths and cursors and drop any stored bytes.
    pub fn reset(&mut self) {
        self.outbound.clear();
        self.out_cursor = 0;
        self.inbound.clear();
        self.in_len = 0;
    }

    /// # Errors
    ///
    /// [`I2cError::InvalidArgument`] if `bytes` exceeds the buffer capacity.
    pub fn load_outbound(&mut self, bytes: &[u8]) -> Result<(), I2cError> {
        self.outbound.clear();
        self.out_cursor = 0;
        self.outbound
            .extend_from_slice(bytes)
            .map_err(|()| I2cError::InvalidArgument)
    }

    /// # Errors
    ///
    /// [`I2cError::InvalidArgument`] if `len` exceeds the buffer capacity.
    pub fn expect_inbound(&mut self, len: usize) -> Result<(), I2cError> {
        if len > TRANSFER_CAPACITY {
            return Err(I2cError::InvalidArgument);
        }
        self.inbound.clear();
        self.in_len = len;
        Ok(())
    }

    /// Next byte to shift out, advancing the outbound cursor.
    pub fn next_outbound(&mut self) -> Option<u8> {
        let byte = self.outbound.get(self.out_cursor).copied()?;
        self.out_cursor += 1;
        Some(byte)
    }

    /// Store a received byte. Bytes past the expected length are dropped.
    pub fn push_inbound(&mut self, byte: u8) -> bool {
        if self.inbound.len() >= self.in_len {
            return false;
        }
        self.inbound.push(byte).is_ok()
    }

    #[must_use]
    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    #[must_use]
    pub fn out_cursor(&self) -> usize {
        self.out_cursor
    }

    #[must_use]
    pub fn outbound_done(&self) -> bool {
        self.out_cursor >= self.outbound.len()
    }

    #[must_use]
    pub fn inbound_len(&self) -> usize {
        self.in_len
    }

    #[must_use]
    pub fn in_cursor(&self) -> usize {
        self.inbound.len()
    }

    #[must_use]
    pub fn inbound_done(&self) -> bool {
        self.inbound.len() >= self.in_len
    }

    #[must_use]
    pub fn inbound(&self) -> &[u8] {
        &self.inbound
    }
}
