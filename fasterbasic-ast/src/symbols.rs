use std::collections::HashMap;

use crate::value::ConstValue;

/// Read-only view of the symbol table's CONST records the optimizer
/// consults for propagation (spec.md §3, §4.1 item 2). Keys are always
/// upper-cased, matching BASIC's case-insensitive identifiers.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    consts: HashMap<String, ConstValue>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    /// Register a CONST. The caller is expected to have already upper-cased
    /// `name`; this is just a defensive normalization.
    pub fn define_const(&mut self, name: &str, value: ConstValue) {
        self.consts.insert(name.to_ascii_uppercase(), value);
    }

    pub fn lookup_const(&self, name: &str) -> Option<&ConstValue> {
        self.consts.get(&name.to_ascii_uppercase())
    }
}
