//! Patch and hash builtins: `apply_patch`, `apply_patch_check`,
//! `apply_patch_space`, `sha1_check` and `read_file`.

use crate::applypatch::digest::{parse_sha1, sha1, sha1_hex};
use crate::applypatch::PatchRequest;
use crate::args::{parse_c_long, read_args, read_value_var_args, read_var_args};
use crate::errors::Abort;
use crate::expr::{evaluate_string, Expr};
use crate::state::ExecutionState;
use crate::value::Value;
use std::fs;
use std::path::{Path, PathBuf};

fn parse_byte_count(
    name: &str,
    state: &mut ExecutionState<'_>,
    text: &str,
) -> Result<u64, Abort> {
    match parse_c_long(text) {
        Some(n) => Ok(u64::try_from(n).unwrap_or(u64::MAX)),
        None => Err(state.error_abort(format!(
            "{}(): can't parse \"{}\" as byte count",
            name, text
        ))),
    }
}

/// apply_patch(source, target, target_sha1, target_size, sha1_1, patch_1, ...)
pub fn apply_patch_fn(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    if argv.len() < 6 || (argv.len() - 4) % 2 != 0 {
        return Err(state.error_abort(format!(
            "{}(): expected at least 6 args and an even number, got {}",
            name,
            argv.len()
        )));
    }

    let [source, target, target_sha1, target_size] = read_args::<4>(name, state, &argv[..4])?;
    let target_size = parse_byte_count(name, state, &target_size)?;

    let values = read_value_var_args(state, &argv[4..])?;
    let mut patches = Vec::with_capacity(values.len() / 2);
    let mut values = values.into_iter();
    let mut index = 0;
    while let (Some(hash), Some(patch)) = (values.next(), values.next()) {
        let Value::String(hash) = hash else {
            return Err(state.error_abort(format!("{}(): sha-1 #{} is not string", name, index)));
        };
        let Value::Blob(patch) = patch else {
            return Err(state.error_abort(format!("{}(): patch #{} is not blob", name, index)));
        };
        patches.push((hash, patch));
        index += 1;
    }

    let req = PatchRequest {
        source: PathBuf::from(source),
        target: PathBuf::from(target),
        target_sha1,
        target_size,
        patches,
    };
    let applied = match state.env().patcher.apply(&req) {
        Ok(()) => true,
        Err(e) => {
            log::error!("{}: patching {} failed: {}", name, req.target.display(), e);
            false
        }
    };
    Ok(Value::bool(applied))
}

/// apply_patch_check(file, [sha1, ...])
pub fn apply_patch_check_fn(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    let Some((file, hashes)) = argv.split_first() else {
        return Err(state.error_abort(format!(
            "{}(): expected at least 1 arg, got {}",
            name,
            argv.len()
        )));
    };
    let file = evaluate_string(state, file)?;
    let hashes = read_var_args(state, hashes)?;
    Ok(Value::bool(
        state.env().patcher.check(Path::new(&file), &hashes),
    ))
}

/// apply_patch_space(bytes): "t" if the cache can hold `bytes`.
pub fn apply_patch_space_fn(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    let [bytes] = read_args::<1>(name, state, argv)?;
    let bytes = parse_byte_count(name, state, &bytes)?;
    Ok(Value::bool(state.env().patcher.has_cache_space(bytes)))
}

/// sha1_check(data) returns the hex digest of `data`.
/// sha1_check(data, sha1_1, ...) returns the first argument matching it, or "".
pub fn sha1_check_fn(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    if argv.is_empty() {
        return Err(state.error_abort(format!("{}() expects at least 1 arg", name)));
    }
    let mut args = read_value_var_args(state, argv)?.into_iter();
    let data = args.next().unwrap_or_else(Value::empty);
    let Some(bytes) = data.as_bytes() else {
        log::error!("{}(): no file contents received", name);
        return Ok(Value::empty());
    };

    if argv.len() == 1 {
        return Ok(Value::string(sha1_hex(bytes)));
    }

    let digest = sha1(bytes);
    for (i, arg) in args.enumerate() {
        match arg {
            Value::String(text) => match parse_sha1(&text) {
                Ok(candidate) if candidate == digest => return Ok(Value::String(text)),
                Ok(_) => {}
                Err(_) => log::warn!("{}(): error parsing \"{}\" as sha-1; skipping", name, text),
            },
            _ => log::warn!("{}(): arg {} is not a string; skipping", name, i + 1),
        }
    }
    Ok(Value::empty())
}

pub fn read_file_fn(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    let [filename] = read_args::<1>(name, state, argv)?;
    match fs::read(&filename) {
        Ok(data) => Ok(Value::Blob(data)),
        Err(e) => Err(state.error_abort(format!(
            "{}() loading \"{}\" failed: {}",
            name, filename, e
        ))),
    }
}
