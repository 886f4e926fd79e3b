//! UnrealScript-style class compiler
//!
//! A two-pass compiler from class source to compact bytecode, plus the
//! decompiler that prints that bytecode back as source.
//!
//! ## Architecture
//!
//! - **Pass 0 (Declaration)**: read each class once, building its property
//!   table and node forest; bodies are skipped
//! - **Pass 1 (Compilation)**: revisit each body and emit bytecode, with
//!   every class of the build already declared
//!
//! ## Modules
//!
//! - [`bytecode`]: opcodes, conversion tokens and the per-class name pool
//! - [`conversion`]: conversion cost and the conversion table
//! - [`decompiler`]: bytecode back to source
//! - [`emit`]: code buffer, fixups and operand reordering
//! - [`overload`]: operator overload resolution
//! - [`scope`]: nesting frames for classes, states, functions and blocks
//! - [`symbols`]: per-class symbol tables and cross-class lookup
//! - [`unit_set`]: the set of classes built together
//!
//! ```
//! use uscript_compiler::{CompilationUnitSet, CompilerConfig, NullHost};
//!
//! let mut set = CompilationUnitSet::new(CompilerConfig::default());
//! set.add_class("Object", "class Object; var int Count; function Reset() { Count = 0; }").unwrap();
//! let report = set.compile_all(&mut NullHost, &mut Vec::new()).unwrap();
//! assert!(report.is_success());
//! ```

pub mod bytecode;
mod compiler;
pub mod config;
pub mod conversion;
pub mod decompiler;
pub mod emit;
mod expr;
pub mod overload;
mod passes;
pub mod scope;
pub mod sink;
mod stmt;
pub mod symbols;
pub mod unit_set;

pub use bytecode::{CastKind, NamePool, OpCode};
pub use config::CompilerConfig;
pub use conversion::{ConversionCost, conversion_cost, implicit_cast};
pub use decompiler::{DecompileError, Decompiler};
pub use overload::OverloadMatch;
pub use sink::{HostCommands, LogSink, NullHost, RecordingHost};
pub use symbols::{ClassFlags, ClassSymbols, ClassTable, NodeFlags, NodeKind, OperatorKind, StackNode};
pub use unit_set::{BuildReport, ClassCode, ClassStatus, ClassUnit, CompilationUnitSet, DependencyKind};

pub use uscript_core::CompileError;
