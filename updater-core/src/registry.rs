//! Name → handler table consulted by the evaluator.

use crate::errors::Abort;
use crate::expr::Expr;
use crate::state::ExecutionState;
use crate::value::Value;
use std::collections::HashMap;

/// Signature shared by every builtin: the name it was called under, the state and
/// the unevaluated argument expressions.
pub type BuiltinFn = fn(&str, &mut ExecutionState<'_>, &[Expr]) -> Result<Value, Abort>;

/// Built once before evaluation starts and immutable afterwards.
#[derive(Default)]
pub struct Registry {
    table: HashMap<String, BuiltinFn>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding every updater builtin.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtins::register_install_functions(&mut registry);
        registry
    }

    /// Registering a name twice keeps the latest handler.
    pub fn register(&mut self, name: &str, handler: BuiltinFn) {
        self.table.insert(name.to_string(), handler);
    }

    pub fn find(&self, name: &str) -> Option<BuiltinFn> {
        self.table.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.table.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
