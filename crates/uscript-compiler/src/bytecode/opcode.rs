//! Opcode definitions.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// One-byte instruction codes.
///
/// Expressions are prefix-encoded: an instruction header precedes its
/// operand expressions, so `a + b * c` is emitted as `[+] a [*] b c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum OpCode {
    // =========================================
    // Variables
    // =========================================
    /// `u16 offset` into the call frame.
    LocalVariable = 0x00,
    /// `u16 offset` into the object.
    InstanceVariable = 0x01,
    /// `u16 offset` into the class defaults.
    DefaultVariable = 0x02,
    /// `u16 offset` into the class-static block.
    StaticVariable = 0x03,

    // =========================================
    // Control flow
    // =========================================
    /// Followed by the value expression or `Nothing`.
    Return = 0x04,
    /// `u16 end`, scrutinee expression.
    Switch = 0x05,
    /// `u16 target`.
    Jump = 0x06,
    /// `u16 target`, bool condition.
    JumpIfNot = 0x07,
    Stop = 0x08,
    /// `u16 next case` (0xFFFF for default), value expression unless default.
    Case = 0x0A,
    Nothing = 0x0B,
    /// `(u16 name, u16 offset)*` terminated by a 0xFFFF name.
    LabelTable = 0x0C,
    /// Name expression; resolved at run time against the label table.
    GotoLabel = 0x0D,

    // =========================================
    // Assignment and context
    // =========================================
    Let = 0x0F,
    LetBool = 0x14,
    EndFunctionParms = 0x16,
    SelfObject = 0x17,
    /// Object expression, `u16 skip`, member expression.
    Context = 0x19,
    /// `u16 dim`, `u16 element size`, array variable, index expression.
    ArrayElement = 0x1A,

    // =========================================
    // Calls
    // =========================================
    /// `u16 name`, arguments, `EndFunctionParms`.
    VirtualFunction = 0x1B,
    /// `u16 owner class name`, `u16 node index`, arguments, `EndFunctionParms`.
    FinalFunction = 0x1C,
    /// `u16 name`, arguments, `EndFunctionParms`; skips state overrides.
    GlobalFunction = 0x38,
    /// `u16 native index`, arguments, `EndFunctionParms`.
    Native = 0x40,

    // =========================================
    // Constants
    // =========================================
    IntConst = 0x1D,
    FloatConst = 0x1E,
    StringConst = 0x1F,
    ObjectConst = 0x20,
    NameConst = 0x21,
    RotationConst = 0x22,
    VectorConst = 0x23,
    ByteConst = 0x24,
    IntZero = 0x25,
    IntOne = 0x26,
    True = 0x27,
    False = 0x28,
    NoObject = 0x2A,

    // =========================================
    // Casts and iteration
    // =========================================
    /// `u16 class name`, object expression.
    DynamicCast = 0x2E,
    /// Iterator call expression, `u16 end`.
    Iterator = 0x2F,
    IteratorPop = 0x30,
    IteratorNext = 0x31,
    /// Extended second byte [`CastKind`](super::CastKind), then the operand.
    Conversion = 0x39,

    EndCode = 0x53,
}

impl OpCode {
    /// Decode an opcode byte.
    #[inline]
    pub fn from_u8(byte: u8) -> Option<Self> {
        Self::try_from(byte).ok()
    }

    /// Whether this opcode starts a call that ends with `EndFunctionParms`.
    pub fn is_call(self) -> bool {
        matches!(
            self,
            OpCode::VirtualFunction | OpCode::FinalFunction | OpCode::GlobalFunction | OpCode::Native
        )
    }

    /// Whether this opcode addresses a variable by offset.
    pub fn is_variable(self) -> bool {
        matches!(
            self,
            OpCode::LocalVariable
                | OpCode::InstanceVariable
                | OpCode::DefaultVariable
                | OpCode::StaticVariable
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_round_trip() {
        for op in [OpCode::LocalVariable, OpCode::Conversion, OpCode::EndCode, OpCode::Native] {
            let byte: u8 = op.into();
            assert_eq!(OpCode::from_u8(byte), Some(op));
        }
        assert_eq!(OpCode::from_u8(0xEE), None);
    }

    #[test]
    fn classification() {
        assert!(OpCode::FinalFunction.is_call());
        assert!(!OpCode::Context.is_call());
        assert!(OpCode::StaticVariable.is_variable());
    }
}
