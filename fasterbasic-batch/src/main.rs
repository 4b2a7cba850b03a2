//! Binary entry point: parse CLI flags, run every `*.bas` file under
//! `--batch-jit` through the pipeline, print a summary, and translate the
//! outcome into a process exit code (spec.md §6):
//!
//! - `0`   every file's pipeline completed and ran to a normal exit
//! - `1`   a pipeline phase failed (parse, optimize, codegen, jit-compile, link)
//! - `124` at least one file's execution timed out
//! - `n`   an uncaught signal `n` terminated at least one file's execution,
//!         reported as the signal number itself when no timeout occurred
use clap::Parser;
use fasterbasic_batch::{BatchHarness, BatchOptions, BatchSummary, Phase, StubFrontend};

fn exit_code_for(summary: &BatchSummary) -> i32 {
    if summary.failed() == 0 {
        return 0;
    }

    let mut saw_timeout = false;
    let mut signal_code = None;
    let mut saw_pipeline_failure = false;

    for report in &summary.reports {
        let Some(phase) = report.failed_phase() else { continue };
        if phase != Phase::Execute {
            saw_pipeline_failure = true;
            continue;
        }
        let outcome = report.phases.iter().find(|p| p.phase == Phase::Execute).expect("failed_phase found Execute");
        match &outcome.detail {
            Some(detail) if detail.starts_with("exit_code=124") => saw_timeout = true,
            Some(detail) if detail.starts_with("signal=") => {
                if let Some(n) = parse_signal_number(detail) {
                    signal_code.get_or_insert(n);
                }
            }
            _ => saw_pipeline_failure = true,
        }
    }

    if saw_timeout {
        124
    } else if let Some(n) = signal_code {
        n
    } else if saw_pipeline_failure {
        1
    } else {
        1
    }
}

fn parse_signal_number(detail: &str) -> Option<i32> {
    // detail looks like "signal=Some(11)" or "signal=None"
    let start = detail.find("Some(")? + "Some(".len();
    let rest = &detail[start..];
    let end = rest.find(')')?;
    rest[..end].parse().ok()
}

fn main() -> anyhow::Result<()> {
    let opts = BatchOptions::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(opts.log_filter())).init();

    let harness = BatchHarness::new(StubFrontend, opts.fail_fast, opts.timeout(), opts.metrics);
    let summary = harness.run_directory(&opts.batch_jit);

    println!("{}", summary);

    std::process::exit(exit_code_for(&summary));
}
