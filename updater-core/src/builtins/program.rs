//! Builtins that reach outside the updater: `getprop`, `run_program` and
//! `set_bootloader_env`.

use super::require_non_empty;
use crate::args::{read_args, read_var_args};
use crate::errors::Abort;
use crate::expr::Expr;
use crate::state::ExecutionState;
use crate::value::Value;
use updater_hal::HalError;

/// Wait status reported when the program could not be started at all.
const SPAWN_FAILED_STATUS: i32 = 1 << 8;

pub fn getprop_fn(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    let [key] = read_args::<1>(name, state, argv)?;
    let value = match state.hal().property(&key) {
        Ok(value) => value.unwrap_or_default(),
        Err(e) => {
            log::warn!("{}: reading {} failed: {}", name, key, e);
            String::new()
        }
    };
    Ok(Value::string(value))
}

/// run_program(path, arg, ...): blocks until the child exits and returns its
/// raw wait status.
pub fn run_program_fn(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    if argv.is_empty() {
        return Err(state.error_abort(format!("{}() expects at least 1 arg", name)));
    }
    let args = read_var_args(state, argv)?;
    log::info!("about to run program [{}] with {} args", args[0], args.len());

    let status = match state.hal().run_program(&args) {
        Ok(status) => {
            if status != 0 {
                log::warn!("{}: {} returned status {}", name, args[0], status);
            }
            status
        }
        Err(HalError::CommandNotFound(program)) => {
            log::error!("{}: can't execute {}", name, program);
            SPAWN_FAILED_STATUS
        }
        Err(e) => {
            log::error!("{}: {} failed: {}", name, args[0], e);
            SPAWN_FAILED_STATUS
        }
    };
    Ok(Value::string(status.to_string()))
}

/// set_bootloader_env(name, value): returns `name` once the variable is written.
pub fn set_bootloader_env_fn(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    let [env_name, env_val] = read_args::<2>(name, state, argv)?;
    require_non_empty(name, state, &[("env_name", &env_name), ("env_val", &env_val)])?;

    let config = state.config();
    let result = state.hal().command_status(
        &config.fw_setenv,
        &[&env_name, &env_val],
        config.command_timeout(),
    );
    match result {
        Ok(()) => Ok(Value::string(env_name)),
        Err(e) => {
            log::error!("{}: setting {} failed: {}", name, env_name, e);
            Ok(Value::empty())
        }
    }
}
