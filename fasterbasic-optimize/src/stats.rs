/// One counter per transformation in spec.md §4.1, incremented each time
/// that specific rewrite fires. Returned alongside the rewritten program so
/// callers (and tests) can assert on exactly what the pass did without
/// re-walking the tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OptimizerStats {
    pub constants_folded: u64,
    pub constants_propagated: u64,
    pub strings_folded: u64,
    pub pow_reduced: u64,
    pub algebraic_identities: u64,
    pub double_negations: u64,
    pub div_to_mul: u64,
    pub mod_to_and: u64,
    pub bool_identities: u64,
    pub dead_branches: u64,
    pub dead_loops: u64,
    pub iif_simplified: u64,
    pub for_steps_tagged: u64,
    pub builtins_folded: u64,
}

impl OptimizerStats {
    pub fn new() -> OptimizerStats {
        OptimizerStats::default()
    }

    /// Total number of rewrites of any kind. Useful for a quick
    /// "did anything happen" check in callers and tests.
    pub fn total(&self) -> u64 {
        self.constants_folded
            + self.constants_propagated
            + self.strings_folded
            + self.pow_reduced
            + self.algebraic_identities
            + self.double_negations
            + self.div_to_mul
            + self.mod_to_and
            + self.bool_identities
            + self.dead_branches
            + self.dead_loops
            + self.iif_simplified
            + self.for_steps_tagged
            + self.builtins_folded
    }
}
