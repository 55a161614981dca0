//! The updater's builtin functions.
//!
//! Contract violations (arity, empty required arguments, unparsable numbers)
//! abort the script. Device and file failures are logged and reported through
//! the returned value so scripts can branch on them.

mod extract;
mod files;
mod mount;
mod patch;
mod program;
mod raw_image;
mod retouch;
mod ui;

use crate::errors::Abort;
use crate::registry::Registry;
use crate::state::ExecutionState;

/// Abort naming the first `(label, value)` pair whose value is empty.
pub(crate) fn require_non_empty(
    name: &str,
    state: &mut ExecutionState<'_>,
    args: &[(&str, &str)],
) -> Result<(), Abort> {
    match args.iter().find(|(_, value)| value.is_empty()) {
        Some((label, _)) => Err(state.error_abort(format!(
            "{} argument to {}() can't be empty",
            label, name
        ))),
        None => Ok(()),
    }
}

pub fn register_install_functions(registry: &mut Registry) {
    registry.register("mount", mount::mount_fn);
    registry.register("is_mounted", mount::is_mounted_fn);
    registry.register("unmount", mount::unmount_fn);
    registry.register("format", mount::format_fn);
    registry.register("show_progress", ui::show_progress_fn);
    registry.register("set_progress", ui::set_progress_fn);
    registry.register("delete", files::delete_fn);
    registry.register("delete_recursive", files::delete_fn);
    registry.register("package_extract_dir", extract::package_extract_dir_fn);
    registry.register("package_extract_file", extract::package_extract_file_fn);
    registry.register("retouch_binaries", retouch::retouch_binaries_fn);
    registry.register("undo_retouch_binaries", retouch::undo_retouch_binaries_fn);
    registry.register("symlink", files::symlink_fn);
    registry.register("set_perm", files::set_perm_fn);
    registry.register("set_perm_recursive", files::set_perm_fn);
    registry.register("getprop", program::getprop_fn);
    registry.register("file_getprop", files::file_getprop_fn);
    registry.register("write_raw_image", raw_image::write_raw_image_fn);
    registry.register("apply_patch", patch::apply_patch_fn);
    registry.register("apply_patch_check", patch::apply_patch_check_fn);
    registry.register("apply_patch_space", patch::apply_patch_space_fn);
    registry.register("read_file", patch::read_file_fn);
    registry.register("sha1_check", patch::sha1_check_fn);
    registry.register("wipe_cache", ui::wipe_cache_fn);
    registry.register("ui_print", ui::ui_print_fn);
    registry.register("run_program", program::run_program_fn);
    registry.register("set_bootloader_env", program::set_bootloader_env_fn);
    registry.register("is_file_exist", files::is_file_exist_fn);
    registry.register("install_package", extract::install_package_fn);
}
