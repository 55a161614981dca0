//! Filesystem builtins: `delete`, `delete_recursive`, `symlink`, `set_perm`,
//! `set_perm_recursive`, `file_getprop` and `is_file_exist`.

use crate::args::{parse_c_ulong_base0, read_args, read_var_args};
use crate::errors::Abort;
use crate::expr::{evaluate_string, Expr};
use crate::state::ExecutionState;
use crate::value::Value;
use std::fs;
use std::io;
use std::os::unix::fs::{chown, lchown, symlink, PermissionsExt};
use std::path::Path;
use updater_hal::propfile::find_property;
use walkdir::WalkDir;

const MAX_FILE_GETPROP_SIZE: u64 = 65536;

fn remove_tree(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// delete(path, ...) / delete_recursive(path, ...): returns how many paths
/// were removed.
pub fn delete_fn(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    let paths = read_var_args(state, argv)?;
    let recursive = name == "delete_recursive";

    let removed = paths
        .iter()
        .filter(|path| {
            let path = Path::new(path);
            let res = if recursive {
                remove_tree(path)
            } else {
                fs::remove_file(path)
            };
            match res {
                Ok(()) => true,
                Err(e) => {
                    log::debug!("{}: {} not removed: {}", name, path.display(), e);
                    false
                }
            }
        })
        .count();
    Ok(Value::string(removed.to_string()))
}

/// symlink(target, src, ...): replace every `src` with a link to `target`.
pub fn symlink_fn(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    let Some((target, srcs)) = argv.split_first() else {
        return Err(state.error_abort(format!("{}() expects 1+ args, got 0", name)));
    };
    let target = evaluate_string(state, target)?;
    let srcs = read_var_args(state, srcs)?;

    for src in &srcs {
        if let Err(e) = fs::remove_file(src) {
            if e.kind() != io::ErrorKind::NotFound {
                log::error!("{}: failed to remove {}: {}", name, src, e);
            }
        }
        if let Err(e) = symlink(&target, src) {
            log::error!("{}: failed to symlink {} to {}: {}", name, src, target, e);
        }
    }
    Ok(Value::empty())
}

#[derive(Debug, Clone, Copy)]
struct Ownership {
    uid: u32,
    gid: u32,
}

fn set_owner_and_mode(name: &str, path: &Path, owner: Ownership, mode: Option<u32>) {
    if let Err(e) = chown(path, Some(owner.uid), Some(owner.gid)) {
        log::error!(
            "{}: chown of {} to {} {} failed: {}",
            name,
            path.display(),
            owner.uid,
            owner.gid,
            e
        );
    }
    if let Some(mode) = mode {
        if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(mode)) {
            log::error!("{}: chmod of {} to {:o} failed: {}", name, path.display(), mode, e);
        }
    }
}

fn set_hierarchy(name: &str, root: &str, owner: Ownership, dir_mode: u32, file_mode: u32) {
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::error!("{}: can't walk {}: {}", name, root, e);
                continue;
            }
        };
        let path = entry.path();
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            if let Err(e) = lchown(path, Some(owner.uid), Some(owner.gid)) {
                log::error!("{}: lchown of {} failed: {}", name, path.display(), e);
            }
        } else if file_type.is_dir() {
            set_owner_and_mode(name, path, owner, Some(dir_mode));
        } else {
            set_owner_and_mode(name, path, owner, Some(file_mode));
        }
    }
}

/// set_perm(uid, gid, mode, path, ...)
/// set_perm_recursive(uid, gid, dirmode, filemode, path, ...)
///
/// Numbers follow C conventions: `0755` is octal and `0x1ed` hex.
pub fn set_perm_fn(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    let recursive = name == "set_perm_recursive";
    let min_args = if recursive { 5 } else { 4 };
    if argv.len() < min_args {
        return Err(state.error_abort(format!(
            "{}() expects {}+ args, got {}",
            name,
            min_args,
            argv.len()
        )));
    }
    let args = read_var_args(state, argv)?;

    let mut number = |index: usize, what: &str| -> Result<u32, Abort> {
        parse_c_ulong_base0(&args[index])
            .map(|n| n as u32)
            .ok_or_else(|| {
                state.error_abort(format!("{}: \"{}\" not a valid {}", name, args[index], what))
            })
    };
    let owner = Ownership {
        uid: number(0, "uid")?,
        gid: number(1, "gid")?,
    };

    if recursive {
        let dir_mode = number(2, "dirmode")?;
        let file_mode = number(3, "filemode")?;
        for root in &args[4..] {
            set_hierarchy(name, root, owner, dir_mode, file_mode);
        }
    } else {
        let mode = number(2, "mode")?;
        for path in &args[3..] {
            set_owner_and_mode(name, Path::new(path), owner, Some(mode));
        }
    }
    Ok(Value::empty())
}

/// file_getprop(file, key): value of `key` in a getprop-style file, or "".
pub fn file_getprop_fn(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    let [filename, key] = read_args::<2>(name, state, argv)?;

    let meta = fs::metadata(&filename).map_err(|e| {
        state.error_abort(format!("{}: failed to stat \"{}\": {}", name, filename, e))
    })?;
    if meta.len() > MAX_FILE_GETPROP_SIZE {
        return Err(state.error_abort(format!(
            "{} too large for {} (max {})",
            filename, name, MAX_FILE_GETPROP_SIZE
        )));
    }
    let content = fs::read(&filename).map_err(|e| {
        state.error_abort(format!("{}: failed to open {}: {}", name, filename, e))
    })?;
    let content = String::from_utf8_lossy(&content);

    match find_property(&content, &key) {
        Ok(value) => Ok(Value::string(value.unwrap_or_default())),
        Err(malformed) => Err(state.error_abort(format!(
            "{}: malformed line \"{}\": {} not a prop file?",
            name, malformed.0, filename
        ))),
    }
}

/// is_file_exist(path): `path` if it exists, "" otherwise.
pub fn is_file_exist_fn(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    let [path] = read_args::<1>(name, state, argv)?;
    Ok(if Path::new(&path).exists() {
        Value::string(path)
    } else {
        Value::empty()
    })
}
