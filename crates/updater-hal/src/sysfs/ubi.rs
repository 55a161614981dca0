//! Helpers for the UBI sysfs tree (`/sys/class/ubi`).
//!
//! Device entries are named `ubiN`, volume entries `ubiN_M`. Each carries a `dev` file
//! with the `major:minor` of its character device node.

use crate::hal::{UbiDeviceInfo, UbiNode};
use crate::{HalError, HalResult};
use std::fs;
use std::path::Path;

/// Parses a sysfs `dev` attribute (`"10:59\n"`).
pub fn parse_dev_numbers(raw: &str) -> Option<(u64, u64)> {
    let (major, minor) = raw.trim().split_once(':')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

/// Major number of the UBI control device, or `None` when the kernel lacks
/// attach/detach support.
pub fn ctrl_major(ctrl_dev_attr: &Path) -> Option<u64> {
    let raw = fs::read_to_string(ctrl_dev_attr).ok()?;
    parse_dev_numbers(&raw).map(|(major, _)| major)
}

fn read_number<T: std::str::FromStr>(path: &Path) -> HalResult<T> {
    let raw = fs::read_to_string(path)?;
    raw.trim()
        .parse()
        .map_err(|_| HalError::Parse(format!("{}: {:?}", path.display(), raw.trim())))
}

enum Entry {
    Device(u32),
    Volume(u32, u32),
}

fn classify(name: &str) -> Option<Entry> {
    let rest = name.strip_prefix("ubi")?;
    match rest.split_once('_') {
        Some((dev, vol)) => Some(Entry::Volume(dev.parse().ok()?, vol.parse().ok()?)),
        None => Some(Entry::Device(rest.parse().ok()?)),
    }
}

/// Finds the UBI device currently attached to MTD partition `mtd_num`.
pub fn device_for_mtd(ubi_root: &Path, mtd_num: u32) -> HalResult<Option<u32>> {
    if !ubi_root.exists() {
        return Ok(None);
    }
    for entry in fs::read_dir(ubi_root)?.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(Entry::Device(dev_num)) = classify(&name) {
            let attached: u32 = read_number(&entry.path().join("mtd_num"))?;
            if attached == mtd_num {
                return Ok(Some(dev_num));
            }
        }
    }
    Ok(None)
}

pub fn device_info(ubi_root: &Path, dev_num: u32) -> HalResult<UbiDeviceInfo> {
    let dir = ubi_root.join(format!("ubi{}", dev_num));
    if !dir.exists() {
        return Err(HalError::NotFound(format!("UBI device {}", dev_num)));
    }
    let avail_eraseblocks: u64 = read_number(&dir.join("avail_eraseblocks"))?;
    let eraseblock_size: u64 = read_number(&dir.join("eraseblock_size"))?;
    Ok(UbiDeviceInfo {
        dev_num,
        mtd_num: read_number(&dir.join("mtd_num"))?,
        avail_bytes: avail_eraseblocks.saturating_mul(eraseblock_size),
    })
}

/// Resolves a `major:minor` pair to the UBI device or volume that owns it.
pub fn probe_dev_numbers(ubi_root: &Path, numbers: (u64, u64)) -> HalResult<Option<UbiNode>> {
    if !ubi_root.exists() {
        return Ok(None);
    }
    for entry in fs::read_dir(ubi_root)?.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(kind) = classify(&name) else {
            continue;
        };
        let Ok(raw) = fs::read_to_string(entry.path().join("dev")) else {
            continue;
        };
        if parse_dev_numbers(&raw) != Some(numbers) {
            continue;
        }
        return Ok(Some(match kind {
            Entry::Device(dev_num) => UbiNode::Device { dev_num },
            Entry::Volume(dev_num, vol_id) => UbiNode::Volume { dev_num, vol_id },
        }));
    }
    Ok(None)
}
