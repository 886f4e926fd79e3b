//! Helpers shared by unit and integration tests.

use std::sync::Once;

use uscript_compiler::{BuildReport, CompilationUnitSet, CompilerConfig, NullHost};
use uscript_core::ClassId;

static INIT: Once = Once::new();

/// Route `tracing` output through the test harness, filtered by `RUST_LOG`.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Add `classes` to a fresh set and build it once.
pub fn build_set(config: CompilerConfig, classes: &[(&str, &str)]) -> (CompilationUnitSet, BuildReport, Vec<String>) {
    init_test_logging();
    let mut set = CompilationUnitSet::new(config);
    for (name, source) in classes {
        if let Err(err) = set.add_class(name, *source) {
            panic!("cannot add {name}: {err}");
        }
    }
    let mut log = Vec::new();
    let report = match set.compile_all(&mut NullHost, &mut log) {
        Ok(report) => report,
        Err(err) => panic!("build aborted: {err}"),
    };
    (set, report, log)
}

/// Id of a class known to be in `set`.
pub fn class_id(set: &CompilationUnitSet, name: &str) -> ClassId {
    use uscript_compiler::ClassTable;
    set.find_class(name)
        .unwrap_or_else(|| panic!("class {name} is not in the set"))
}
