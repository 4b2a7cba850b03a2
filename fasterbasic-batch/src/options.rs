//! CLI surface contract (spec.md §6). This binary only ever drives the
//! batch-JIT path, but models the full flag set `clap`-derive style the
//! way `cranelift`'s own `src/` driver and `wasmtime-cli-flags` do, so the
//! struct stays a faithful stand-in for the real compiler driver even
//! though the AOT-only fields are inert here.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "fasterbasic-batch", about = "Run every *.bas file under a directory through the JIT pipeline")]
pub struct BatchOptions {
    /// Directory to recursively scan for `*.bas` files.
    #[arg(long = "batch-jit", value_name = "DIR")]
    pub batch_jit: PathBuf,

    /// Stop at the first failing file instead of continuing.
    #[arg(long = "fail-fast")]
    pub fail_fast: bool,

    /// Per-file execution timeout, in seconds.
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Raise log verbosity (stacks: `-v`, `-vv`).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print per-file SAMM allocator / opcode-histogram metrics.
    #[arg(long = "metrics")]
    pub metrics: bool,

    // --- AOT-only flags: accepted for interface completeness, not
    // exercised by anything in this crate (spec.md §1: the AOT linker
    // path is out of scope).
    /// Output path for the AOT linker (unused in batch-JIT mode).
    #[arg(short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// C compiler/linker driver for the AOT path (unused in batch-JIT mode).
    #[arg(long = "cc", value_name = "PATH")]
    pub cc: Option<PathBuf>,

    /// Runtime library directory for the AOT path (unused in batch-JIT mode).
    #[arg(long = "runtime-dir", value_name = "PATH")]
    pub runtime_dir: Option<PathBuf>,

    /// Skip the AST optimizer (unused in batch-JIT mode; optimize always runs).
    #[arg(long = "no-optimize")]
    pub no_optimize: bool,

    #[arg(short = 'A')]
    pub trace_a: bool,
    #[arg(short = 'S')]
    pub trace_s: bool,
    #[arg(short = 'G')]
    pub trace_g: bool,
}

impl BatchOptions {
    pub fn timeout(&self) -> Option<std::time::Duration> {
        self.timeout_secs.map(std::time::Duration::from_secs)
    }

    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_filter_escalates_with_repeated_verbose_flags() {
        let mut opts = BatchOptions {
            batch_jit: PathBuf::from("."),
            fail_fast: false,
            timeout_secs: None,
            verbose: 0,
            metrics: false,
            output: None,
            cc: None,
            runtime_dir: None,
            no_optimize: false,
            trace_a: false,
            trace_s: false,
            trace_g: false,
        };
        assert_eq!(opts.log_filter(), "warn");
        opts.verbose = 1;
        assert_eq!(opts.log_filter(), "info");
        opts.verbose = 3;
        assert_eq!(opts.log_filter(), "debug");
    }

    #[test]
    fn timeout_converts_seconds_to_a_duration() {
        let opts = BatchOptions {
            batch_jit: PathBuf::from("."),
            fail_fast: false,
            timeout_secs: Some(5),
            verbose: 0,
            metrics: false,
            output: None,
            cc: None,
            runtime_dir: None,
            no_optimize: false,
            trace_a: false,
            trace_s: false,
            trace_g: false,
        };
        assert_eq!(opts.timeout(), Some(std::time::Duration::from_secs(5)));
    }
}
