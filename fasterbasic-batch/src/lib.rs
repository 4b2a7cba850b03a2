//! Batch JIT harness binary crate. Discovers `*.bas` files under a
//! directory and runs each through parse/analyze → optimize → codegen →
//! JIT-compile → link → execute, reporting per-phase outcomes.

mod frontend;
mod harness;
mod metrics;
mod options;
mod reporter;

pub use frontend::{Frontend, FrontendError, StubFrontend};
pub use harness::BatchHarness;
pub use metrics::BatchMetrics;
pub use options::BatchOptions;
pub use reporter::{BatchSummary, Phase, PhaseOutcome, PipelineReport};
