//! Command-line host: compile every `*.uc` file in a directory.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};
use uscript::load_sources;
use uscript::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "uscriptc")]
#[command(about = "Compile UnrealScript-style class sources", long_about = None)]
struct Args {
    /// Directory holding one `<Class>.uc` file per class
    dir: PathBuf,

    /// Stop at the first class that fails to compile
    #[arg(long)]
    bootstrap: bool,

    /// Print decompiled source for every class
    #[arg(long)]
    decompile: bool,

    /// Decompile and recompile every class, reporting any byte difference
    #[arg(long)]
    verify: bool,

    /// Deepest allowed nesting of blocks
    #[arg(long, default_value_t = 16)]
    max_nest_depth: usize,

    /// Print `#exec` directives instead of ignoring them
    #[arg(long)]
    show_exec: bool,
}

/// Host that prints every `#exec` command it receives.
struct PrintingHost;

impl HostCommands for PrintingHost {
    fn exec(&mut self, class: &str, command: &str) -> Result<(), String> {
        println!("{class}: exec {command}");
        Ok(())
    }
}

struct StdoutLog;

impl LogSink for StdoutLog {
    fn log(&mut self, line: &str) {
        println!("{line}");
    }
}

fn init_logging() {
    // USCRIPT_LOG or RUST_LOG, warnings only by default
    let filter = EnvFilter::try_from_env("USCRIPT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    let files = match load_sources(&args.dir) {
        Ok(files) => files,
        Err(err) => {
            error!("{err}");
            eprintln!("uscriptc: {err}");
            return ExitCode::FAILURE;
        }
    };
    info!(dir = %args.dir.display(), classes = files.len(), "loaded sources");

    let config = CompilerConfig::new()
        .with_bootstrap(args.bootstrap)
        .with_decompile_all(args.decompile)
        .with_verify_round_trip(args.verify)
        .with_max_nest_depth(args.max_nest_depth);
    let mut set = CompilationUnitSet::new(config);
    for file in &files {
        if let Err(err) = set.add_class(&file.class, file.text.clone()) {
            eprintln!("uscriptc: {}: {err}", file.path.display());
            return ExitCode::FAILURE;
        }
    }

    let mut host: Box<dyn HostCommands> = if args.show_exec { Box::new(PrintingHost) } else { Box::new(NullHost) };
    let report = match set.compile_all(host.as_mut(), &mut StdoutLog) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("uscriptc: bootstrap build failed: {err}");
            return ExitCode::FAILURE;
        }
    };

    println!(
        "{} compiled, {} failed, {} round-trip mismatches",
        report.compiled.len(),
        report.failed.len(),
        report.round_trip_mismatches.len()
    );
    if report.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
