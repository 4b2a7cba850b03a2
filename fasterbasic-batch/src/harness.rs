//! The batch harness itself (spec.md §4.7): discovers `*.bas` files under
//! a directory, runs each one through the full pipeline in its own
//! per-file arena, and keeps failures from one file contaminating the
//! next. Modeled on `cranelift-filetests`'s directory-driven runner —
//! discover, run one pipeline per file, accumulate per-phase results.

use std::path::{Path, PathBuf};
use std::time::Instant;

use bumpalo::Bump;
use fasterbasic_jit::{JitMemoryRegion, Linker, Session, SymbolTable as LinkSymbolTable};
use fasterbasic_jit_backend::JitModule;
use log::{info, warn};
use walkdir::WalkDir;

use crate::frontend::Frontend;
use crate::metrics::BatchMetrics;
use crate::reporter::{BatchSummary, Phase, PipelineReport};

/// Default code/data region sizes for a single compiled `.bas` file.
/// Generous enough for the programs this harness is meant to smoke-test;
/// real AOT-sized workloads would size this from the JitModule's own
/// `code_len`/`data_len` instead of a fixed budget.
const CODE_REGION_CAPACITY: usize = 1 << 20;
const DATA_REGION_CAPACITY: usize = 1 << 16;

pub struct BatchHarness<F: Frontend> {
    frontend: F,
    fail_fast: bool,
    timeout: Option<std::time::Duration>,
    metrics_enabled: bool,
}

impl<F: Frontend> BatchHarness<F> {
    pub fn new(frontend: F, fail_fast: bool, timeout: Option<std::time::Duration>, metrics_enabled: bool) -> BatchHarness<F> {
        BatchHarness { frontend, fail_fast, timeout, metrics_enabled }
    }

    /// Recursively discovers `*.bas` files under `dir`, sorted for
    /// determinism (spec.md §4.7.1).
    pub fn discover(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| entry.path().extension().and_then(|e| e.to_str()) == Some("bas"))
            .map(|entry| entry.path().to_path_buf())
            .collect();
        files.sort();
        files
    }

    pub fn run_directory(&self, dir: &Path) -> BatchSummary {
        let mut summary = BatchSummary::default();
        let mut metrics = BatchMetrics::new();

        for path in Self::discover(dir) {
            let report = self.run_file(&path, &mut metrics);
            let failed = !report.succeeded();
            summary.push(report);
            if failed && self.fail_fast {
                warn!("stopping early: {} failed and --fail-fast is set", path.display());
                break;
            }
        }

        summary
    }

    /// Runs one file end to end. The per-file `Bump` arena is dropped at
    /// the end of this call, and `metrics` is reset via
    /// [`BatchMetrics::take`] before returning — spec.md §4.7's "global
    /// process state must be... reset before the next file starts".
    pub fn run_file(&self, path: &Path, metrics: &mut BatchMetrics) -> PipelineReport {
        let mut report = PipelineReport::new(path.to_path_buf());
        let arena = Bump::new();

        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                report.record(Phase::Lex, false, std::time::Duration::ZERO, Some(e.to_string()));
                metrics.take();
                return report;
            }
        };
        report.record(Phase::Lex, true, std::time::Duration::ZERO, None);

        let parse_start = Instant::now();
        let (program, symbols) = match self.frontend.parse_and_analyze(&source, &arena) {
            Ok(pair) => pair,
            Err(e) => {
                report.record(Phase::Parse, false, parse_start.elapsed(), Some(e.0));
                metrics.take();
                return report;
            }
        };
        report.record(Phase::Parse, true, parse_start.elapsed(), None);
        report.record(Phase::Analyze, true, std::time::Duration::ZERO, None);

        let mut program = program;
        let optimize_start = Instant::now();
        let outcome = match fasterbasic_optimize::optimize(&mut program, &symbols) {
            Ok(outcome) => outcome,
            Err(e) => {
                report.record(Phase::Optimize, false, optimize_start.elapsed(), Some(e.to_string()));
                metrics.take();
                return report;
            }
        };
        metrics.optimizer_rewrites += outcome.stats.total();
        report.record(Phase::Optimize, true, optimize_start.elapsed(), None);

        let codegen_start = Instant::now();
        let insts = match self.frontend.lower_to_jit_insts(&program, &outcome.step_directions, &arena) {
            Ok(insts) => insts,
            Err(e) => {
                report.record(Phase::Codegen, false, codegen_start.elapsed(), Some(e.0));
                metrics.take();
                return report;
            }
        };
        report.record(Phase::Codegen, true, codegen_start.elapsed(), None);

        let jit_start = Instant::now();
        let mut module = JitModule::new();
        module.encode_program(&insts);
        metrics.instructions_emitted += insts.len() as u64;
        metrics.labels_defined += module.labels.len() as u64;
        metrics.fixups_resolved += module.fixups_resolved;
        if module.has_errors() {
            let detail = module.diagnostics.iter().map(|d| d.to_string()).collect::<Vec<_>>().join("; ");
            report.record(Phase::JitCompile, false, jit_start.elapsed(), Some(detail));
            metrics.take();
            return report;
        }
        report.record(Phase::JitCompile, true, jit_start.elapsed(), None);

        let link_start = Instant::now();
        let symbol_table = LinkSymbolTable::new();
        let linker = Linker::new(&symbol_table, None);
        let mut region = match JitMemoryRegion::allocate(CODE_REGION_CAPACITY, DATA_REGION_CAPACITY) {
            Ok(region) => region,
            Err(e) => {
                report.record(Phase::Link, false, link_start.elapsed(), Some(e.to_string()));
                metrics.take();
                return report;
            }
        };
        let link_result = match linker.link_and_finalize(&module, &mut region) {
            Ok(result) => result,
            Err(e) => {
                report.record(Phase::Link, false, link_start.elapsed(), Some(e.to_string()));
                metrics.take();
                return report;
            }
        };
        report.record(Phase::Link, true, link_start.elapsed(), None);

        let exec_start = Instant::now();
        let session = match Session::new(region, link_result) {
            Ok(session) => session,
            Err(e) => {
                report.record(Phase::Execute, false, exec_start.elapsed(), Some(e.to_string()));
                metrics.take();
                return report;
            }
        };
        match session.run(self.timeout) {
            Ok(result) if result.completed => {
                report.record(Phase::Execute, true, exec_start.elapsed(), Some(format!("exit_code={}", result.exit_code)));
            }
            Ok(result) if result.timed_out => {
                report.record(Phase::Execute, false, exec_start.elapsed(), Some(format!("exit_code={}", result.exit_code)));
            }
            Ok(result) => {
                report.record(
                    Phase::Execute,
                    false,
                    exec_start.elapsed(),
                    Some(format!("signal={:?}", result.signal)),
                );
            }
            Err(e) => {
                report.record(Phase::Execute, false, exec_start.elapsed(), Some(e.to_string()));
            }
        }

        if self.metrics_enabled {
            info!("{}: {:?}", path.display(), metrics);
        }
        metrics.take();
        report
    }
}
