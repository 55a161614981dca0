//! Helpers related to block devices in sysfs.

use crate::{HalError, HalResult};
use std::fs;
use std::path::Path;

pub fn device_basename(path: &Path) -> HalResult<String> {
    let name = path
        .file_name()
        .ok_or_else(|| HalError::Parse(format!("invalid device path {}", path.display())))?
        .to_string_lossy()
        .to_string();
    Ok(name)
}

/// Reads the block device size from `<sys_block_dev_dir>/size`.
///
/// The `size` file is expressed in 512-byte sectors.
pub fn block_device_size_bytes(sys_block_dev_dir: &Path) -> HalResult<u64> {
    let sectors_str = fs::read_to_string(sys_block_dev_dir.join("size"))?;
    let sectors: u64 = sectors_str
        .trim()
        .parse()
        .map_err(|_| HalError::Parse(format!("bad sector count {:?}", sectors_str.trim())))?;
    Ok(sectors.saturating_mul(512))
}

/// Size of `device` in bytes: sysfs for block devices, file length for image files.
pub fn device_size_bytes(sys_class_block: &Path, device: &Path) -> HalResult<u64> {
    let name = device_basename(device)?;
    let sysfs_dir = sys_class_block.join(&name);
    if sysfs_dir.join("size").exists() {
        return block_device_size_bytes(&sysfs_dir);
    }
    Ok(fs::metadata(device)?.len())
}
