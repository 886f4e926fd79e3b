//! Bytecode emission.
//!
//! Code is generated strictly left to right. When a later token reveals
//! that a header must precede bytes already written (an operator after its
//! left operand, a conversion after its source), the header is appended and
//! then spliced back with [`CodeBuffer::move_tail`].

mod fixup;

pub use fixup::{FixupKind, FixupRequest, FixupSlot};

use thiserror::Error;

use crate::bytecode::{NO_TARGET, OpCode};

/// A relative offset that does not fit a 16-bit operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("code offset {0} exceeds the 16-bit operand range")]
pub struct OffsetOverflow(pub usize);

/// Growable byte buffer for one class's bytecode.
#[derive(Debug, Clone, Default)]
pub struct CodeBuffer {
    code: Vec<u8>,
    /// Start of the callable being emitted; jump operands are relative to it.
    entry: usize,
}

impl CodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume appending to existing class code.
    pub fn from_vec(code: Vec<u8>) -> Self {
        Self { code, entry: 0 }
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.code
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.code
    }

    /// Start a new callable at the current end of the buffer.
    pub fn begin_callable(&mut self) -> usize {
        self.entry = self.code.len();
        self.entry
    }

    #[inline]
    pub fn entry(&self) -> usize {
        self.entry
    }

    /// Bytes emitted since [`begin_callable`](Self::begin_callable).
    pub fn callable_code(&self) -> &[u8] {
        &self.code[self.entry..]
    }

    // =========================================
    // Emission
    // =========================================

    #[inline]
    pub fn emit_op(&mut self, op: OpCode) {
        self.code.push(op.into());
    }

    #[inline]
    pub fn emit_u8(&mut self, value: u8) {
        self.code.push(value);
    }

    #[inline]
    pub fn emit_u16(&mut self, value: u16) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    #[inline]
    pub fn emit_i32(&mut self, value: i32) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    #[inline]
    pub fn emit_f32(&mut self, value: f32) {
        self.code.extend_from_slice(&value.to_bits().to_le_bytes());
    }

    /// Zero-terminated string constant.
    pub fn emit_cstr(&mut self, text: &str) {
        self.code.extend_from_slice(text.as_bytes());
        self.code.push(0);
    }

    /// Reserve a 2-byte operand to be patched later. Returns its position.
    pub fn placeholder(&mut self) -> usize {
        let at = self.code.len();
        self.emit_u16(NO_TARGET);
        at
    }

    // =========================================
    // Offsets and patching
    // =========================================

    /// Relative offset of the current end of the buffer.
    pub fn here(&self) -> Result<u16, OffsetOverflow> {
        self.relative(self.code.len())
    }

    /// Offset of an absolute buffer position relative to the callable entry.
    pub fn relative(&self, at: usize) -> Result<u16, OffsetOverflow> {
        let rel = at - self.entry;
        u16::try_from(rel).ok().filter(|&v| v != NO_TARGET).ok_or(OffsetOverflow(rel))
    }

    pub fn patch_u16(&mut self, at: usize, value: u16) {
        self.code[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }

    /// Point the placeholder at `at` to the current end of the buffer.
    pub fn patch_to_here(&mut self, at: usize) -> Result<(), OffsetOverflow> {
        let here = self.here()?;
        self.patch_u16(at, here);
        Ok(())
    }

    pub fn read_u16(&self, at: usize) -> u16 {
        u16::from_le_bytes([self.code[at], self.code[at + 1]])
    }

    /// Discard everything after `len`.
    pub fn truncate(&mut self, len: usize) {
        self.code.truncate(len);
    }

    /// Move the bytes from `block_start` to the end so they begin at `insert_at`.
    ///
    /// The bytes previously in `insert_at..block_start` shift right by the
    /// block's length; the caller adjusts any positions it holds into them.
    pub fn move_tail(&mut self, block_start: usize, insert_at: usize) {
        debug_assert!(insert_at <= block_start && block_start <= self.code.len());
        let block_len = self.code.len() - block_start;
        self.code[insert_at..].rotate_right(block_len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_tail_splices_header_before_operand() {
        let mut buf = CodeBuffer::new();
        buf.emit_op(OpCode::IntOne);
        let header = buf.len();
        buf.emit_op(OpCode::Native);
        buf.emit_u16(7);
        buf.move_tail(header, 0);
        assert_eq!(buf.as_slice(), &[u8::from(OpCode::Native), 7, 0, u8::from(OpCode::IntOne)]);
    }

    #[test]
    fn offsets_are_relative_to_callable_entry() {
        let mut buf = CodeBuffer::new();
        buf.emit_u16(0);
        buf.begin_callable();
        buf.emit_op(OpCode::Jump);
        let at = buf.placeholder();
        buf.emit_op(OpCode::Nothing);
        buf.patch_to_here(at).unwrap();
        assert_eq!(buf.read_u16(at), 4);
        assert_eq!(buf.callable_code().len(), 4);
    }

    #[test]
    fn reserved_offset_overflows() {
        let mut buf = CodeBuffer::new();
        buf.begin_callable();
        assert_eq!(buf.relative(0xFFFF), Err(OffsetOverflow(0xFFFF)));
        assert!(buf.relative(0x10000).is_err());
        assert_eq!(buf.relative(12), Ok(12));
    }

    #[test]
    fn floats_are_bit_exact() {
        let mut buf = CodeBuffer::new();
        buf.emit_f32(-0.0);
        assert_eq!(buf.as_slice(), &(-0.0f32).to_bits().to_le_bytes());
    }
}
