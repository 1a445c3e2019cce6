//! Leaf entry storage and access semantics.

use crate::error::{Result, VdevError};
use serde::{Deserialize, Serialize};

/// Stock capacity of the module's raw buffer entry.
pub const RAW_BUFFER_CAPACITY: usize = 32;

/// Access mode of a control-surface entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Readable only; writes are refused.
    ReadOnly,
    /// Readable and writable.
    ReadWrite,
}

impl AccessMode {
    pub fn is_writable(&self) -> bool {
        matches!(self, AccessMode::ReadWrite)
    }
}

/// Fixed-capacity byte storage with offset-addressed partial access.
///
/// The capacity is fixed at creation. Reads and writes are clamped at that
/// capacity: an overrun is truncated, never wrapped and never zero-filled.
/// An offset at or past capacity reads as zero bytes and writes nothing,
/// which callers treat as end-of-entry rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBuffer {
    bytes: Box<[u8]>,
}

impl RawBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0u8; capacity].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Read up to `len` bytes starting at `offset`.
    ///
    /// Returns `min(capacity - offset, len)` bytes; empty once `offset`
    /// reaches capacity.
    pub fn read_at(&self, offset: usize, len: usize) -> Vec<u8> {
        if offset >= self.bytes.len() {
            return Vec::new();
        }
        let n = len.min(self.bytes.len() - offset);
        self.bytes[offset..offset + n].to_vec()
    }

    /// Write `data` starting at `offset`, dropping bytes past capacity.
    ///
    /// Returns the number of bytes actually stored, clamped by the same
    /// bound as reads. Callers must not assume the full request was written.
    pub fn write_at(&mut self, offset: usize, data: &[u8]) -> usize {
        if offset >= self.bytes.len() {
            return 0;
        }
        let n = data.len().min(self.bytes.len() - offset);
        self.bytes[offset..offset + n].copy_from_slice(&data[..n]);
        n
    }
}

/// Parse a textual boolean write.
///
/// Accepts the forgiving forms `1/0`, `y/n`, `yes/no`, `true/false`,
/// `on/off`, case-insensitively and ignoring surrounding whitespace.
/// Anything else is `InvalidInput` and the caller leaves its cell unchanged.
pub fn parse_bool_text(text: &str) -> Result<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "y" | "yes" | "true" | "on" => Ok(true),
        "0" | "n" | "no" | "false" | "off" => Ok(false),
        other => Err(VdevError::invalid_input(format!(
            "not a boolean value: '{}'",
            other
        ))),
    }
}
