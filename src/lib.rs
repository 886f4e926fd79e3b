//! UnrealScript-style class compiler.
//!
//! Facade over the workspace crates: the lexer, the two-pass compiler and
//! the decompiler, plus a directory loader used by the `uscriptc` host.
//!
//! ```
//! use uscript::prelude::*;
//!
//! let mut set = CompilationUnitSet::new(CompilerConfig::default());
//! let object = set.add_class("Object", "class Object; var int Ticks;").unwrap();
//! let report = set.compile_all(&mut NullHost, &mut Vec::new()).unwrap();
//! assert!(report.is_success());
//! assert_eq!(set.status(object), Some(ClassStatus::Compiled));
//! ```

pub mod loader;
#[doc(hidden)]
pub mod test_utils;

pub use uscript_compiler as compiler;
pub use uscript_core as core;
pub use uscript_parser as parser;

pub use loader::{LoadError, SourceFile, load_sources};

pub mod prelude {
    pub use uscript_compiler::{
        BuildReport, ClassStatus, ClassTable, CompilationUnitSet, CompilerConfig, DecompileError, HostCommands,
        LogSink, NullHost, RecordingHost,
    };
    pub use uscript_core::{ClassId, CompileError, ErrorCategory, Span};
}
