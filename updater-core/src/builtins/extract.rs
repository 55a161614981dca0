//! Package builtins: `package_extract_dir`, `package_extract_file` and
//! `install_package`.

use crate::args::read_args;
use crate::errors::Abort;
use crate::expr::Expr;
use crate::package::{fixed_mtime, PackageArchive};
use crate::script::{load_package_script, run_script, ScriptOutcome};
use crate::state::ExecutionState;
use crate::value::{Value, ValueKind};
use std::path::Path;

/// package_extract_dir(package_path, destination_path)
///
/// Every extracted file gets the same fixed mtime so repeated installs of a
/// package produce identical trees.
pub fn package_extract_dir_fn(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    let [zip_path, dest] = read_args::<2>(name, state, argv)?;
    let result = state
        .info
        .package
        .extract_recursive(&zip_path, Path::new(&dest), fixed_mtime());
    Ok(Value::bool(match result {
        Ok(count) => {
            log::info!("{}: extracted {} files from {} to {}", name, count, zip_path, dest);
            true
        }
        Err(e) => {
            log::error!("{}: extracting {} to {} failed: {}", name, zip_path, dest, e);
            false
        }
    }))
}

/// package_extract_file(package_path) returns the entry as a blob.
/// package_extract_file(package_path, destination_path) writes it to a file.
pub fn package_extract_file_fn(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    match argv.len() {
        1 => {
            let [zip_path] = read_args::<1>(name, state, argv)?;
            match state.info.package.read_entry(&zip_path) {
                Ok(data) => Ok(Value::Blob(data)),
                Err(e) => {
                    log::error!("{}: {}", name, e);
                    Ok(Value::Absent(ValueKind::Blob))
                }
            }
        }
        2 => {
            let [zip_path, dest] = read_args::<2>(name, state, argv)?;
            let result = state
                .info
                .package
                .extract_entry_to(&zip_path, Path::new(&dest));
            Ok(Value::bool(match result {
                Ok(_) => true,
                Err(e) => {
                    log::error!("{}: can't extract {} to {}: {}", name, zip_path, dest, e);
                    false
                }
            }))
        }
        n => Err(state.error_abort(format!("{}() expects 1 or 2 args, got {}", name, n))),
    }
}

/// install_package(path)
///
/// Runs the script of a nested package against the same command pipe. A
/// nested abort is reported but does not abort the calling script.
pub fn install_package_fn(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    let [path] = read_args::<1>(name, state, argv)?;
    let env = state.env();

    let mut package = match PackageArchive::open(Path::new(&path)) {
        Ok(package) => package,
        Err(e) => {
            log::error!("{}: {}", name, e);
            return Ok(Value::empty());
        }
    };
    let root = match load_package_script(env, &mut package) {
        Ok(root) => root,
        Err(e) => {
            log::error!("{}: {}", name, e);
            return Ok(Value::empty());
        }
    };

    match run_script(env, &mut package, state.cmd(), &root) {
        ScriptOutcome::Finished(_) => Ok(Value::string(path)),
        ScriptOutcome::Aborted(_) => Ok(Value::empty()),
    }
}
