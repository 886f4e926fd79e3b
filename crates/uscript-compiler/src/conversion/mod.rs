//! Type compatibility and conversion cost.
//!
//! [`conversion_cost`] is the single measure used by overload resolution,
//! argument checking and assignment: lower is better, `0` is identical and
//! [`ConversionCost::INCOMPATIBLE`] rules a pairing out.

mod table;

pub use table::{Conversion, ConversionMode, lookup};

use uscript_core::{PropType, Property, PropertyFlags};

use crate::bytecode::CastKind;

/// Ancestry queries needed to price object upcasts.
pub trait ClassHierarchy {
    /// Declared parent of `class`, or `None` for a root or unknown class.
    fn parent_name(&self, class: &str) -> Option<&str>;
}

/// Guard against a malformed (cyclic) hierarchy.
const MAX_HIERARCHY_DEPTH: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConversionCost(pub u32);

impl ConversionCost {
    pub const IDENTICAL: Self = Self(0);
    /// Enum/byte retagging and `none` to any object.
    pub const GENERALIZE: Self = Self(1);
    pub const WIDEN: Self = Self(101);
    pub const INTEGRAL_TO_FLOAT: Self = Self(102);
    pub const TRUNCATE: Self = Self(104);
    pub const INCOMPATIBLE: Self = Self(u32::MAX);

    #[inline]
    pub fn is_compatible(self) -> bool {
        self != Self::INCOMPATIBLE
    }
}

/// Number of parent links from `src` up to `dest`, if `dest` is an ancestor.
pub fn upcast_distance(dest: &str, src: &str, classes: &dyn ClassHierarchy) -> Option<u32> {
    let mut current = src;
    for steps in 0..MAX_HIERARCHY_DEPTH {
        if current.eq_ignore_ascii_case(dest) {
            return Some(steps);
        }
        current = classes.parent_name(current)?;
    }
    None
}

/// Cost of converting a value of type `src` where `dest` is required.
pub fn conversion_cost(dest: &Property, src: &Property, classes: &dyn ClassHierarchy) -> ConversionCost {
    if dest.array_dim != src.array_dim {
        return ConversionCost::INCOMPATIBLE;
    }
    if same_type(&dest.ty, &src.ty) {
        return ConversionCost::IDENTICAL;
    }
    if dest.is_out() {
        return ConversionCost::INCOMPATIBLE;
    }

    match (&dest.ty, &src.ty) {
        (PropType::Object(Some(_)), PropType::Object(None)) => ConversionCost::GENERALIZE,
        (PropType::Object(Some(d)), PropType::Object(Some(s))) => upcast_distance(d, s, classes)
            .map(ConversionCost)
            .unwrap_or(ConversionCost::INCOMPATIBLE),
        (PropType::Object(_), _) | (PropType::Enum(_), PropType::Enum(_)) => ConversionCost::INCOMPATIBLE,
        (PropType::Enum(_), PropType::Byte) | (PropType::Byte, PropType::Enum(_)) => ConversionCost::GENERALIZE,
        (PropType::Enum(_), _) => ConversionCost::INCOMPATIBLE,
        _ => match lookup(dest.ty.tag(), src.ty.tag()) {
            None => ConversionCost::INCOMPATIBLE,
            Some(Conversion { mode: ConversionMode::Auto, cast }) => match cast {
                CastKind::ByteToInt => ConversionCost::WIDEN,
                _ => ConversionCost::INTEGRAL_TO_FLOAT,
            },
            Some(Conversion { mode: ConversionMode::Truncate, .. }) => {
                if dest.flags.contains(PropertyFlags::COERCE_PARM) {
                    ConversionCost::TRUNCATE
                } else {
                    ConversionCost::INCOMPATIBLE
                }
            }
        },
    }
}

/// Opcode-level conversion needed to turn `src` into `dest`, if any.
///
/// Generalizations (object upcasts, enum retagging) need none.
pub fn implicit_cast(dest: &PropType, src: &PropType) -> Option<CastKind> {
    if dest.tag() == src.tag() || dest.is_object() {
        return None;
    }
    lookup(dest.tag(), src.tag()).map(|c| c.cast)
}

/// Type equality with class and enum names compared case-insensitively.
pub fn same_type(a: &PropType, b: &PropType) -> bool {
    match (a, b) {
        (PropType::Object(Some(x)), PropType::Object(Some(y))) | (PropType::Enum(x), PropType::Enum(y)) => {
            x.eq_ignore_ascii_case(y)
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    struct Tree(FxHashMap<&'static str, &'static str>);

    impl ClassHierarchy for Tree {
        fn parent_name(&self, class: &str) -> Option<&str> {
            self.0.get(class).copied()
        }
    }

    fn tree() -> Tree {
        Tree([("Actor", "Object"), ("Pawn", "Actor"), ("Light", "Actor")].into_iter().collect())
    }

    fn v(ty: PropType) -> Property {
        Property::value(ty)
    }

    #[test]
    fn identical_types_cost_nothing() {
        let classes = tree();
        assert_eq!(conversion_cost(&v(PropType::Int), &v(PropType::Int), &classes), ConversionCost::IDENTICAL);
        assert_eq!(
            conversion_cost(&v(PropType::object("pawn")), &v(PropType::object("Pawn")), &classes),
            ConversionCost::IDENTICAL
        );
    }

    #[test]
    fn upcast_costs_steps() {
        let classes = tree();
        let cost = conversion_cost(&v(PropType::object("Object")), &v(PropType::object("Pawn")), &classes);
        assert_eq!(cost, ConversionCost(2));
        let down = conversion_cost(&v(PropType::object("Pawn")), &v(PropType::object("Actor")), &classes);
        assert_eq!(down, ConversionCost::INCOMPATIBLE);
        let sibling = conversion_cost(&v(PropType::object("Light")), &v(PropType::object("Pawn")), &classes);
        assert_eq!(sibling, ConversionCost::INCOMPATIBLE);
        let none = conversion_cost(&v(PropType::object("Pawn")), &v(PropType::Object(None)), &classes);
        assert_eq!(none, ConversionCost::GENERALIZE);
    }

    #[test]
    fn arithmetic_ordering() {
        let classes = tree();
        let widen = conversion_cost(&v(PropType::Int), &v(PropType::Byte), &classes);
        let to_float = conversion_cost(&v(PropType::Float), &v(PropType::Int), &classes);
        assert!(ConversionCost::IDENTICAL < widen && widen < to_float);
        assert!(to_float < ConversionCost::TRUNCATE);
    }

    #[test]
    fn truncation_needs_coerce() {
        let classes = tree();
        let plain = v(PropType::Byte);
        let coerce = v(PropType::Byte).with_flags(PropertyFlags::COERCE_PARM);
        assert_eq!(conversion_cost(&plain, &v(PropType::Int), &classes), ConversionCost::INCOMPATIBLE);
        assert_eq!(conversion_cost(&coerce, &v(PropType::Int), &classes), ConversionCost::TRUNCATE);
    }

    #[test]
    fn out_params_accept_only_identical() {
        let classes = tree();
        let out = v(PropType::Int).with_flags(PropertyFlags::OUT_PARM);
        assert_eq!(conversion_cost(&out, &v(PropType::Byte), &classes), ConversionCost::INCOMPATIBLE);
        assert_eq!(conversion_cost(&out, &v(PropType::Int), &classes), ConversionCost::IDENTICAL);
    }

    #[test]
    fn enums_and_bytes_generalize() {
        let classes = tree();
        let e = v(PropType::Enum("EPhysics".into()));
        let other = v(PropType::Enum("ERole".into()));
        assert_eq!(conversion_cost(&e, &v(PropType::Byte), &classes), ConversionCost::GENERALIZE);
        assert_eq!(conversion_cost(&v(PropType::Byte), &e, &classes), ConversionCost::GENERALIZE);
        assert_eq!(conversion_cost(&v(PropType::Int), &e, &classes), ConversionCost::WIDEN);
        assert_eq!(conversion_cost(&e, &other, &classes), ConversionCost::INCOMPATIBLE);
        assert_eq!(conversion_cost(&e, &v(PropType::Int), &classes), ConversionCost::INCOMPATIBLE);
    }

    #[test]
    fn array_dims_must_match() {
        let classes = tree();
        let arr = v(PropType::Int).with_dim(4);
        assert_eq!(conversion_cost(&v(PropType::Int), &arr, &classes), ConversionCost::INCOMPATIBLE);
    }

    #[test]
    fn implicit_cast_skips_generalizations() {
        assert_eq!(implicit_cast(&PropType::Float, &PropType::Int), Some(CastKind::IntToFloat));
        assert_eq!(implicit_cast(&PropType::Int, &PropType::Enum("E".into())), Some(CastKind::ByteToInt));
        assert_eq!(implicit_cast(&PropType::Byte, &PropType::Enum("E".into())), None);
        assert_eq!(implicit_cast(&PropType::object("Actor"), &PropType::object("Pawn")), None);
        assert_eq!(implicit_cast(&PropType::Bool, &PropType::object("Pawn")), Some(CastKind::ObjectToBool));
    }
}
