//! Property descriptors.
//!
//! A [`Property`] describes a variable, parameter, return value, or the
//! type of an expression result. Its [`PropType`] carries the class or enum
//! reference where one applies; [`TypeTag`] is the payload-free tag used to
//! index the conversion table.

use bitflags::bitflags;
use std::fmt;

/// Payload-free type tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(u8)]
pub enum TypeTag {
    None = 0,
    Byte,
    Int,
    Bool,
    Float,
    Object,
    Name,
    String,
    Vector,
    Rotator,
    Enum,
}

impl TypeTag {
    pub const COUNT: usize = 11;

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// A concrete type with its class or enum reference.
///
/// Class and enum names are stored in their declared spelling, so plain
/// equality is type identity.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum PropType {
    #[default]
    None,
    Byte,
    Int,
    Bool,
    Float,
    /// Object reference. `None` is the type of the `none` literal.
    Object(Option<String>),
    Name,
    String,
    Vector,
    Rotator,
    Enum(String),
}

impl PropType {
    pub fn object(class: impl Into<String>) -> Self {
        PropType::Object(Some(class.into()))
    }

    pub fn tag(&self) -> TypeTag {
        match self {
            PropType::None => TypeTag::None,
            PropType::Byte => TypeTag::Byte,
            PropType::Int => TypeTag::Int,
            PropType::Bool => TypeTag::Bool,
            PropType::Float => TypeTag::Float,
            PropType::Object(_) => TypeTag::Object,
            PropType::Name => TypeTag::Name,
            PropType::String => TypeTag::String,
            PropType::Vector => TypeTag::Vector,
            PropType::Rotator => TypeTag::Rotator,
            PropType::Enum(_) => TypeTag::Enum,
        }
    }

    /// Storage size of one element in bytes.
    pub fn element_size(&self) -> u16 {
        match self {
            PropType::None => 0,
            PropType::Byte | PropType::Enum(_) => 1,
            PropType::Vector | PropType::Rotator => 12,
            _ => 4,
        }
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            PropType::Object(Some(c)) => Some(c),
            _ => None,
        }
    }

    pub fn enum_name(&self) -> Option<&str> {
        match self {
            PropType::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, PropType::Object(_))
    }

    /// Named components addressable with `.` on a variable of this type,
    /// as (name, byte offset, component type).
    pub fn components(&self) -> &'static [(&'static str, u16, PropType)] {
        static VECTOR: [(&str, u16, PropType); 3] = [
            ("X", 0, PropType::Float),
            ("Y", 4, PropType::Float),
            ("Z", 8, PropType::Float),
        ];
        static ROTATOR: [(&str, u16, PropType); 3] = [
            ("Pitch", 0, PropType::Int),
            ("Yaw", 4, PropType::Int),
            ("Roll", 8, PropType::Int),
        ];
        match self {
            PropType::Vector => &VECTOR,
            PropType::Rotator => &ROTATOR,
            _ => &[],
        }
    }
}

impl fmt::Display for PropType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropType::None => f.write_str("none"),
            PropType::Byte => f.write_str("byte"),
            PropType::Int => f.write_str("int"),
            PropType::Bool => f.write_str("bool"),
            PropType::Float => f.write_str("float"),
            PropType::Object(Some(c)) if c.eq_ignore_ascii_case("Class") => f.write_str("class"),
            PropType::Object(Some(c)) => f.write_str(c),
            PropType::Object(None) => f.write_str("none"),
            PropType::Name => f.write_str("name"),
            PropType::String => f.write_str("string"),
            PropType::Vector => f.write_str("vector"),
            PropType::Rotator => f.write_str("rotator"),
            PropType::Enum(e) => f.write_str(e),
        }
    }
}

bitflags! {
    /// Property qualifiers.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    pub struct PropertyFlags: u16 {
        const CONST = 1 << 0;
        const PARM = 1 << 1;
        const OUT_PARM = 1 << 2;
        const OPTIONAL_PARM = 1 << 3;
        const COERCE_PARM = 1 << 4;
        const RETURN_PARM = 1 << 5;
    }
}

/// Storage bin a property lives in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Bin {
    /// Per-object storage.
    #[default]
    Instance,
    /// Per-class storage shared by every instance.
    Static,
    /// Per-call stack frame (parameters, return value, locals).
    Frame,
}

/// A variable, parameter, return value, or expression-result descriptor.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Property {
    pub name: String,
    pub ty: PropType,
    /// Static array dimension; 1 for scalars.
    pub array_dim: u16,
    pub bin: Bin,
    pub flags: PropertyFlags,
    /// Byte offset inside the bin.
    pub offset: u16,
}

impl Property {
    pub fn new(name: impl Into<String>, ty: PropType) -> Self {
        Self {
            name: name.into(),
            ty,
            array_dim: 1,
            bin: Bin::Instance,
            flags: PropertyFlags::empty(),
            offset: 0,
        }
    }

    /// Anonymous descriptor for an expression result.
    pub fn value(ty: PropType) -> Self {
        Self {
            bin: Bin::Frame,
            ..Self::new(String::new(), ty)
        }
    }

    pub fn with_flags(mut self, flags: PropertyFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_bin(mut self, bin: Bin) -> Self {
        self.bin = bin;
        self
    }

    pub fn with_dim(mut self, dim: u16) -> Self {
        self.array_dim = dim;
        self
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        self.array_dim > 1
    }

    /// Total storage size in bytes.
    pub fn size(&self) -> u16 {
        self.ty.element_size().saturating_mul(self.array_dim.max(1))
    }

    /// Whether `offset` falls inside this property's storage.
    pub fn contains(&self, offset: u16) -> bool {
        offset >= self.offset && (offset as u32) < self.offset as u32 + self.size().max(1) as u32
    }

    pub fn is_out(&self) -> bool {
        self.flags.contains(PropertyFlags::OUT_PARM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_follow_element_and_dim() {
        let p = Property::new("Locs", PropType::Vector).with_dim(4);
        assert_eq!(p.size(), 48);
        assert!(p.is_array());
        assert_eq!(Property::new("B", PropType::Byte).size(), 1);
    }

    #[test]
    fn contains_covers_whole_storage() {
        let mut p = Property::new("V", PropType::Vector);
        p.offset = 8;
        assert!(p.contains(8));
        assert!(p.contains(19));
        assert!(!p.contains(20));
        assert!(!p.contains(7));
    }

    #[test]
    fn display_uses_source_keywords() {
        assert_eq!(PropType::object("Class").to_string(), "class");
        assert_eq!(PropType::object("Pawn").to_string(), "Pawn");
        assert_eq!(PropType::Rotator.to_string(), "rotator");
    }

    #[test]
    fn vector_components() {
        let comps = PropType::Vector.components();
        assert_eq!(comps[1].0, "Y");
        assert_eq!(comps[1].1, 4);
        assert!(PropType::Int.components().is_empty());
    }
}
