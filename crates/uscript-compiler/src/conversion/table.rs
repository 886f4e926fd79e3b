//! Primitive conversion table, indexed `[dest][src]` by [`TypeTag`].

use uscript_core::TypeTag;

use crate::bytecode::CastKind;

/// How a table entry may be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionMode {
    /// Applied implicitly wherever the destination type is required.
    Auto,
    /// Lossy; only applied by an explicit cast or to a `coerce` parameter.
    Truncate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conversion {
    pub cast: CastKind,
    pub mode: ConversionMode,
}

const N: usize = TypeTag::COUNT;

const fn auto(cast: CastKind) -> Option<Conversion> {
    Some(Conversion { cast, mode: ConversionMode::Auto })
}

const fn trunc(cast: CastKind) -> Option<Conversion> {
    Some(Conversion { cast, mode: ConversionMode::Truncate })
}

static TABLE: [[Option<Conversion>; N]; N] = build_table();

const fn build_table() -> [[Option<Conversion>; N]; N] {
    use CastKind::*;
    use TypeTag as T;

    let mut t: [[Option<Conversion>; N]; N] = [[None; N]; N];

    t[T::Byte as usize][T::Int as usize] = trunc(IntToByte);
    t[T::Byte as usize][T::Bool as usize] = trunc(BoolToByte);
    t[T::Byte as usize][T::Float as usize] = trunc(FloatToByte);
    t[T::Byte as usize][T::String as usize] = trunc(StringToByte);

    t[T::Int as usize][T::Byte as usize] = auto(ByteToInt);
    t[T::Int as usize][T::Bool as usize] = trunc(BoolToInt);
    t[T::Int as usize][T::Float as usize] = trunc(FloatToInt);
    t[T::Int as usize][T::String as usize] = trunc(StringToInt);

    t[T::Bool as usize][T::Byte as usize] = trunc(ByteToBool);
    t[T::Bool as usize][T::Int as usize] = trunc(IntToBool);
    t[T::Bool as usize][T::Float as usize] = trunc(FloatToBool);
    t[T::Bool as usize][T::Object as usize] = trunc(ObjectToBool);
    t[T::Bool as usize][T::Name as usize] = trunc(NameToBool);
    t[T::Bool as usize][T::String as usize] = trunc(StringToBool);
    t[T::Bool as usize][T::Vector as usize] = trunc(VectorToBool);
    t[T::Bool as usize][T::Rotator as usize] = trunc(RotatorToBool);

    t[T::Float as usize][T::Byte as usize] = auto(ByteToFloat);
    t[T::Float as usize][T::Int as usize] = auto(IntToFloat);
    t[T::Float as usize][T::Bool as usize] = trunc(BoolToFloat);
    t[T::Float as usize][T::String as usize] = trunc(StringToFloat);

    t[T::String as usize][T::Byte as usize] = trunc(ByteToString);
    t[T::String as usize][T::Int as usize] = trunc(IntToString);
    t[T::String as usize][T::Bool as usize] = trunc(BoolToString);
    t[T::String as usize][T::Float as usize] = trunc(FloatToString);
    t[T::String as usize][T::Object as usize] = trunc(ObjectToString);
    t[T::String as usize][T::Name as usize] = trunc(NameToString);
    t[T::String as usize][T::Vector as usize] = trunc(VectorToString);
    t[T::String as usize][T::Rotator as usize] = trunc(RotatorToString);

    t[T::Vector as usize][T::String as usize] = trunc(StringToVector);
    t[T::Vector as usize][T::Rotator as usize] = trunc(RotatorToVector);

    t[T::Rotator as usize][T::String as usize] = trunc(StringToRotator);
    t[T::Rotator as usize][T::Vector as usize] = trunc(VectorToRotator);

    t
}

/// Enum values are bytes for conversion purposes.
#[inline]
fn storage_tag(tag: TypeTag) -> TypeTag {
    if tag == TypeTag::Enum { TypeTag::Byte } else { tag }
}

/// Table entry for converting `src` into `dest`.
pub fn lookup(dest: TypeTag, src: TypeTag) -> Option<Conversion> {
    TABLE[storage_tag(dest).index()][storage_tag(src).index()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widening_is_automatic() {
        assert_eq!(lookup(TypeTag::Int, TypeTag::Byte).map(|c| c.mode), Some(ConversionMode::Auto));
        assert_eq!(lookup(TypeTag::Float, TypeTag::Int).map(|c| c.cast), Some(CastKind::IntToFloat));
    }

    #[test]
    fn narrowing_truncates() {
        assert_eq!(lookup(TypeTag::Byte, TypeTag::Int).map(|c| c.mode), Some(ConversionMode::Truncate));
        assert_eq!(lookup(TypeTag::Enum, TypeTag::Int).map(|c| c.cast), Some(CastKind::IntToByte));
    }

    #[test]
    fn no_entry_for_unrelated_types() {
        assert_eq!(lookup(TypeTag::Name, TypeTag::Int), None);
        assert_eq!(lookup(TypeTag::Object, TypeTag::String), None);
        assert_eq!(lookup(TypeTag::Int, TypeTag::Int), None);
    }
}
