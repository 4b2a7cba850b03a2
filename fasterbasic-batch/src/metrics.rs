//! Per-file counters the harness must reset between runs (spec.md §4.7
//! invariant: "global process state... must be either restored or
//! explicitly reset before the next file starts"). The real SAMM
//! allocator and opcode histogram live in the (out-of-scope) BASIC
//! runtime; this is the shape the harness resets/reports, not a
//! reimplementation of that runtime.

#[derive(Clone, Debug, Default)]
pub struct BatchMetrics {
    pub instructions_emitted: u64,
    pub labels_defined: u64,
    pub fixups_resolved: u64,
    pub optimizer_rewrites: u64,
    pub samm_bytes_allocated: u64,
}

impl BatchMetrics {
    pub fn new() -> BatchMetrics {
        BatchMetrics::default()
    }

    /// Returns the counters accumulated during the last file and resets
    /// every field to zero, ready for the next one.
    pub fn take(&mut self) -> BatchMetrics {
        std::mem::take(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_resets_every_counter_to_zero() {
        let mut metrics = BatchMetrics { instructions_emitted: 42, ..BatchMetrics::default() };
        let taken = metrics.take();
        assert_eq!(taken.instructions_emitted, 42);
        assert_eq!(metrics.instructions_emitted, 0);
    }
}
