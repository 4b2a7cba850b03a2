use std::collections::HashMap;

/// Compile-time classification of a FOR loop's STEP expression, used by
/// codegen to specialize the loop-exit comparison (spec.md §3, §4.1 item 13).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StepDirection {
    Positive,
    Negative,
    Zero,
    #[default]
    Unknown,
}

/// Upper-cased FOR-loop variable name → step direction. A later FOR
/// statement reusing a name overwrites the prior entry, matching spec.md's
/// data-model note: "Reusing a name in a subsequent loop overwrites the
/// prior entry."
#[derive(Clone, Debug, Default)]
pub struct StepDirections {
    map: HashMap<String, StepDirection>,
}

impl StepDirections {
    pub fn new() -> StepDirections {
        StepDirections::default()
    }

    pub fn set(&mut self, var: &str, direction: StepDirection) {
        self.map.insert(var.to_ascii_uppercase(), direction);
    }

    pub fn get(&self, var: &str) -> StepDirection {
        self.map
            .get(&var.to_ascii_uppercase())
            .copied()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
