//! Core types shared by the UnrealScript-style compiler crates.
//!
//! This crate holds the vocabulary every other crate speaks:
//!
//! - [`Span`] for source locations
//! - [`ClassId`], [`NodeIndex`], [`NodeRef`] and [`PropIndex`] for arena addressing
//! - [`Property`], [`PropType`] and [`PropertyFlags`] describing variables,
//!   parameters and expression results
//! - [`EnumDef`] for class-owned enumerations
//! - [`LexError`] and [`CompileError`], the error taxonomy
//! - [`SourceHash`] for change detection

mod enums;
mod error;
mod hash;
mod ids;
mod property;
mod span;

pub use enums::EnumDef;
pub use error::{CompileError, ErrorCategory, LexError, OperandSide};
pub use hash::SourceHash;
pub use ids::{ClassId, NodeIndex, NodeRef, PropIndex};
pub use property::{Bin, PropType, Property, PropertyFlags, TypeTag};
pub use span::Span;

/// Maximum identifier / name constant length in characters.
pub const NAME_SIZE: usize = 64;

/// Maximum string constant length in characters.
pub const MAX_STRING_CONST: usize = 255;
