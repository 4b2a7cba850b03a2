//! Phase-by-phase diagnostics (spec.md §2 "Pipeline Reporter"), formatted
//! the way `cranelift-codegen::print_errors` renders a phase-tagged
//! diagnostic list: one line per phase, failures called out explicitly.

use std::fmt;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Lex,
    Parse,
    Analyze,
    Optimize,
    Codegen,
    JitCompile,
    Link,
    Execute,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Lex => "lex",
            Phase::Parse => "parse",
            Phase::Analyze => "analyze",
            Phase::Optimize => "optimize",
            Phase::Codegen => "codegen",
            Phase::JitCompile => "jit-compile",
            Phase::Link => "link",
            Phase::Execute => "execute",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug)]
pub struct PhaseOutcome {
    pub phase: Phase,
    pub success: bool,
    pub duration: Duration,
    pub detail: Option<String>,
}

impl fmt::Display for PhaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "ok" } else { "FAILED" };
        write!(f, "  {:<12} {:>6} ({:>7.3}ms)", self.phase, status, self.duration.as_secs_f64() * 1000.0)?;
        if let Some(detail) = &self.detail {
            write!(f, " — {}", detail)?;
        }
        Ok(())
    }
}

/// One file's run through the pipeline: every phase attempted, in order,
/// stopping at the first failure (spec.md §4.7 step 5 — the phase that
/// failed is what gets recorded).
#[derive(Clone, Debug, Default)]
pub struct PipelineReport {
    pub file: std::path::PathBuf,
    pub phases: Vec<PhaseOutcome>,
}

impl PipelineReport {
    pub fn new(file: std::path::PathBuf) -> PipelineReport {
        PipelineReport { file, phases: Vec::new() }
    }

    pub fn record(&mut self, phase: Phase, success: bool, duration: Duration, detail: Option<String>) {
        self.phases.push(PhaseOutcome { phase, success, duration, detail });
    }

    pub fn succeeded(&self) -> bool {
        self.phases.iter().all(|p| p.success)
    }

    pub fn failed_phase(&self) -> Option<Phase> {
        self.phases.iter().find(|p| !p.success).map(|p| p.phase)
    }

    pub fn total_duration(&self) -> Duration {
        self.phases.iter().map(|p| p.duration).sum()
    }
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.file.display())?;
        for outcome in &self.phases {
            writeln!(f, "{}", outcome)?;
        }
        Ok(())
    }
}

/// Accumulated results across an entire batch run, printed as a final
/// summary (pass/fail counts, slowest files) after every discovered file
/// has been attempted.
#[derive(Clone, Debug, Default)]
pub struct BatchSummary {
    pub reports: Vec<PipelineReport>,
}

impl BatchSummary {
    pub fn push(&mut self, report: PipelineReport) {
        self.reports.push(report);
    }

    pub fn passed(&self) -> usize {
        self.reports.iter().filter(|r| r.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.len() - self.passed()
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} file(s): {} passed, {} failed", self.reports.len(), self.passed(), self.failed())?;
        for report in &self.reports {
            if !report.succeeded() {
                writeln!(f, "{}", report)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn an_empty_report_counts_as_succeeded() {
        let report = PipelineReport::new("x.bas".into());
        assert!(report.succeeded());
        assert_eq!(report.failed_phase(), None);
    }

    #[test]
    fn first_failing_phase_is_reported_even_when_later_phases_never_ran() {
        let mut report = PipelineReport::new("x.bas".into());
        report.record(Phase::Lex, true, Duration::from_millis(1), None);
        report.record(Phase::Parse, false, Duration::from_millis(1), Some("unexpected token".into()));
        assert!(!report.succeeded());
        assert_eq!(report.failed_phase(), Some(Phase::Parse));
    }

    #[test]
    fn summary_tallies_pass_and_fail_counts() {
        let mut summary = BatchSummary::default();
        let mut ok = PipelineReport::new("a.bas".into());
        ok.record(Phase::Lex, true, Duration::ZERO, None);
        let mut bad = PipelineReport::new("b.bas".into());
        bad.record(Phase::Lex, false, Duration::ZERO, None);
        summary.push(ok);
        summary.push(bad);
        assert_eq!(summary.passed(), 1);
        assert_eq!(summary.failed(), 1);
    }
}
