//! The bytecode contract shared with the interpreter.
//!
//! Each compiled callable is a self-contained byte run:
//!
//! ```text
//! u8  parameter count
//! (u16 size, u8 flags) * count      flags: 1 = out, 2 = optional, 4 = coerce
//! u16 frame size
//! body...
//! Return Nothing | Stop             implicit end of function / state code
//! [LabelTable (u16 name, u16 offset)* u16 0xFFFF]
//! EndCode
//! ```
//!
//! Operands are little-endian. Jump targets are offsets from the start of
//! the callable. Name operands index the owning class's [`NamePool`].

mod cast;
mod names;
mod opcode;

pub use cast::CastKind;
pub use names::NamePool;
pub use opcode::OpCode;

/// Operand value reserved for "no target" (default case, unpatched jump).
pub const NO_TARGET: u16 = 0xFFFF;

/// Parameter flag bits in the callable header.
pub mod param_flags {
    pub const OUT: u8 = 1;
    pub const OPTIONAL: u8 = 2;
    pub const COERCE: u8 = 4;
}

/// Read a little-endian `u16` at `at`.
#[inline]
pub fn read_u16(code: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes([*code.get(at)?, *code.get(at + 1)?]))
}

/// Read a little-endian `i32` at `at`.
#[inline]
pub fn read_i32(code: &[u8], at: usize) -> Option<i32> {
    let bytes = code.get(at..at + 4)?;
    Some(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Read a little-endian `f32` at `at`.
#[inline]
pub fn read_f32(code: &[u8], at: usize) -> Option<f32> {
    read_i32(code, at).map(|bits| f32::from_bits(bits as u32))
}

/// Size in bytes of a callable's parameter-frame header.
pub fn header_len(code: &[u8]) -> Option<usize> {
    let count = *code.first()? as usize;
    let len = 1 + count * 3 + 2;
    (code.len() >= len).then_some(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn little_endian_reads() {
        let code = [0x34, 0x12, 0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(read_u16(&code, 0), Some(0x1234));
        assert_eq!(read_i32(&code, 2), Some(-1));
        assert_eq!(read_u16(&code, 5), None);
    }

    #[test]
    fn header_len_counts_params() {
        // two params, frame size
        let code = [2, 4, 0, 0, 4, 0, 1, 8, 0, 0x04];
        assert_eq!(header_len(&code), Some(9));
        assert_eq!(header_len(&[3, 0]), None);
    }
}
