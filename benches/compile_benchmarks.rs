//! Build-pipeline benchmarks.
//!
//! - `fixtures`: the `test_scripts/` classes, both passes
//! - `generated/N`: one class with N arithmetic functions
//! - `decompile`: decompiling an already compiled class
//!
//! ```bash
//! cargo bench --bench compile_benchmarks
//! ```

use std::fmt::Write as _;
use std::hint::black_box;
use std::path::PathBuf;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use uscript::prelude::*;
use uscript::{SourceFile, load_sources};

fn fixtures() -> Vec<SourceFile> {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_scripts");
    load_sources(&dir).expect("fixtures load")
}

fn object_source() -> String {
    fixtures()
        .into_iter()
        .find(|f| f.class == "Object")
        .map(|f| f.text)
        .expect("Object fixture")
}

/// A class with `functions` bodies mixing loops, branches and operators.
fn generated_class(functions: usize) -> String {
    let mut source = String::from("class Generated expands Object;\nvar int Total;\n");
    for i in 0..functions {
        let _ = write!(
            source,
            "function int F{i}(int A, int B)
{{
    local int I;
    for (I = 0; I < A; I++)
    {{
        if (I > B)
            Total = Total + I * {i};
        else
            Total = Total - 1;
    }}
    return Total + A * B;
}}
"
        );
    }
    source
}

fn build(classes: &[(&str, &str)]) -> CompilationUnitSet {
    let mut set = CompilationUnitSet::new(CompilerConfig::default());
    for (name, source) in classes {
        set.add_class(name, *source).expect("class added");
    }
    let report = set.compile_all(&mut NullHost, &mut Vec::new()).expect("build runs");
    assert!(report.is_success());
    set
}

fn bench_fixtures(c: &mut Criterion) {
    let files = fixtures();
    let classes: Vec<(&str, &str)> = files.iter().map(|f| (f.class.as_str(), f.text.as_str())).collect();
    let bytes: usize = files.iter().map(|f| f.text.len()).sum();

    let mut group = c.benchmark_group("fixtures");
    group.throughput(Throughput::Bytes(bytes as u64));
    group.bench_function("compile_all", |b| b.iter(|| black_box(build(&classes))));
    group.finish();
}

fn bench_generated(c: &mut Criterion) {
    let object = object_source();
    let mut group = c.benchmark_group("generated");
    for functions in [10, 100, 500] {
        let source = generated_class(functions);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(functions), &source, |b, source| {
            b.iter(|| black_box(build(&[("Object", object.as_str()), ("Generated", source.as_str())])))
        });
    }
    group.finish();
}

fn bench_decompile(c: &mut Criterion) {
    let object = object_source();
    let source = generated_class(100);
    let set = build(&[("Object", object.as_str()), ("Generated", source.as_str())]);
    let id = set.find_class("Generated").expect("class present");

    c.bench_function("decompile/generated_100", |b| {
        b.iter(|| black_box(set.decompile(id).expect("decompiles")))
    });
}

criterion_group!(benches, bench_fixtures, bench_generated, bench_decompile);
criterion_main!(benches);
