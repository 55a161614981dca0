//! Command-pipe builtins.

use crate::args::{c_double_or_zero, c_long_or_zero, read_args, read_var_args};
use crate::errors::Abort;
use crate::expr::Expr;
use crate::state::ExecutionState;
use crate::value::Value;

/// show_progress(frac, secs): advance the bar by `frac` over `secs` seconds.
pub fn show_progress_fn(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    let [frac, secs] = read_args::<2>(name, state, argv)?;
    state
        .cmd()
        .progress(c_double_or_zero(&frac), c_long_or_zero(&secs));
    Ok(Value::string(frac))
}

pub fn set_progress_fn(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    let [frac] = read_args::<1>(name, state, argv)?;
    state.cmd().set_progress(c_double_or_zero(&frac));
    Ok(Value::string(frac))
}

pub fn ui_print_fn(
    _name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    let text = read_var_args(state, argv)?.concat();
    state.cmd().print_lines(&text);
    Ok(Value::string(text))
}

pub fn wipe_cache_fn(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    if !argv.is_empty() {
        return Err(state.error_abort(format!(
            "{}() expects no args, got {}",
            name,
            argv.len()
        )));
    }
    state.cmd().wipe_cache();
    Ok(Value::bool(true))
}
