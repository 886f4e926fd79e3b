//! Primitive conversion codes, the second byte of `OpCode::Conversion`.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use uscript_core::TypeTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum CastKind {
    ByteToInt = 0x01,
    ByteToBool,
    ByteToFloat,
    ByteToString,
    IntToByte,
    IntToBool,
    IntToFloat,
    IntToString,
    BoolToByte,
    BoolToInt,
    BoolToFloat,
    BoolToString,
    FloatToByte,
    FloatToInt,
    FloatToBool,
    FloatToString,
    ObjectToBool,
    ObjectToString,
    NameToBool,
    NameToString,
    StringToByte,
    StringToInt,
    StringToBool,
    StringToFloat,
    StringToVector,
    StringToRotator,
    VectorToBool,
    VectorToRotator,
    VectorToString,
    RotatorToBool,
    RotatorToVector,
    RotatorToString,
}

impl CastKind {
    #[inline]
    pub fn from_u8(byte: u8) -> Option<Self> {
        Self::try_from(byte).ok()
    }

    /// Destination type of the conversion.
    pub fn dest(self) -> TypeTag {
        use CastKind::*;
        match self {
            IntToByte | BoolToByte | FloatToByte | StringToByte => TypeTag::Byte,
            ByteToInt | BoolToInt | FloatToInt | StringToInt => TypeTag::Int,
            ByteToBool | IntToBool | FloatToBool | ObjectToBool | NameToBool | StringToBool
            | VectorToBool | RotatorToBool => TypeTag::Bool,
            ByteToFloat | IntToFloat | BoolToFloat | StringToFloat => TypeTag::Float,
            ByteToString | IntToString | BoolToString | FloatToString | ObjectToString
            | NameToString | VectorToString | RotatorToString => TypeTag::String,
            StringToVector | RotatorToVector => TypeTag::Vector,
            StringToRotator | VectorToRotator => TypeTag::Rotator,
        }
    }

    /// Source keyword for an explicit cast to the destination type.
    pub fn dest_keyword(self) -> &'static str {
        match self.dest() {
            TypeTag::Byte => "byte",
            TypeTag::Int => "int",
            TypeTag::Bool => "bool",
            TypeTag::Float => "float",
            TypeTag::String => "string",
            TypeTag::Vector => "vector",
            TypeTag::Rotator => "rotator",
            _ => "none",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destinations() {
        assert_eq!(CastKind::IntToFloat.dest(), TypeTag::Float);
        assert_eq!(CastKind::VectorToRotator.dest_keyword(), "rotator");
        assert_eq!(CastKind::from_u8(CastKind::NameToString.into()), Some(CastKind::NameToString));
        assert_eq!(CastKind::from_u8(0), None);
    }
}
