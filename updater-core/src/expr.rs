//! Script expression tree and its evaluator.
//!
//! The tree is produced outside this crate (see [`crate::script::ScriptLoader`]);
//! evaluation dispatches every call through the builtin [`crate::registry::Registry`].

use crate::errors::Abort;
use crate::state::ExecutionState;
use crate::value::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Literal(String),
    Call {
        name: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// Evaluated in order; yields the last value.
    Sequence(Vec<Expr>),
}

impl Expr {
    pub fn lit(s: impl Into<String>) -> Self {
        Expr::Literal(s.into())
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            name: name.into(),
            args,
        }
    }
}

pub fn evaluate(state: &mut ExecutionState<'_>, expr: &Expr) -> Result<Value, Abort> {
    match expr {
        Expr::Literal(s) => Ok(Value::String(s.clone())),
        Expr::Call { name, args } => match state.env().registry.find(name) {
            Some(builtin) => builtin(name, state, args),
            None => Err(state.error_abort(format!("unknown function \"{}\"", name))),
        },
        Expr::Sequence(exprs) => {
            let mut last = Value::empty();
            for e in exprs {
                last = evaluate(state, e)?;
            }
            Ok(last)
        }
    }
}

/// Evaluate `expr` in a string context. Blobs and absent values abort.
pub fn evaluate_string(state: &mut ExecutionState<'_>, expr: &Expr) -> Result<String, Abort> {
    match evaluate(state, expr)? {
        Value::String(s) => Ok(s),
        other => Err(state.error_abort(format!(
            "expecting string, got {:?} value",
            other.kind()
        ))),
    }
}
