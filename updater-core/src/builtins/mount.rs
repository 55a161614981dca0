//! `mount`, `is_mounted`, `unmount` and `format`.

use super::require_non_empty;
use crate::args::{c_long_or_zero, read_args};
use crate::errors::Abort;
use crate::expr::Expr;
use crate::state::ExecutionState;
use crate::ubi;
use crate::value::Value;
use std::path::Path;
use updater_hal::procfs::mountinfo::find_by_mount_point;
use updater_hal::procfs::mtd::find_by_name;
use updater_hal::{Ext4Size, MountOptions, SystemHal};

/// Filesystem whose unmount also detaches the backing UBI device.
const UBIFS: &str = "ubifs";

fn mount_mtd(
    hal: &dyn SystemHal,
    name: &str,
    fs_type: &str,
    location: &str,
    target: &Path,
) -> bool {
    let partitions = match hal.scan_mtd_partitions() {
        Ok(partitions) => partitions,
        Err(e) => {
            log::error!("{}: failed to scan mtd partitions: {}", name, e);
            return false;
        }
    };
    let Some(partition) = find_by_name(location, &partitions) else {
        log::error!("{}: no mtd partition named \"{}\"", name, location);
        return false;
    };
    match hal.mount_mtd_partition(partition, target, fs_type, false) {
        Ok(()) => true,
        Err(e) => {
            log::error!("mtd mount of {} failed: {}", location, e);
            false
        }
    }
}

fn mount_device(
    hal: &dyn SystemHal,
    name: &str,
    device: &Path,
    fs_type: &str,
    location: &str,
    target: &Path,
) -> bool {
    match hal.mount_device(device, target, fs_type, MountOptions::updater_default()) {
        Ok(()) => true,
        Err(e) => {
            log::error!(
                "{}: failed to mount {} at {}: {}",
                name,
                location,
                target.display(),
                e
            );
            false
        }
    }
}

/// mount(fs_type, partition_type, location, mount_point)
///
/// `partition_type` is `MTD` (location names an MTD partition), `UBI` (location
/// names an MTD partition to attach) or anything else (location is a device).
pub fn mount_fn(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    let [fs_type, partition_type, location, mount_point] = read_args::<4>(name, state, argv)?;
    require_non_empty(
        name,
        state,
        &[
            ("fs_type", &fs_type),
            ("partition_type", &partition_type),
            ("location", &location),
            ("mount_point", &mount_point),
        ],
    )?;

    let hal = state.hal();
    let target = Path::new(&mount_point);
    if let Err(e) = hal.ensure_mount_point(target) {
        log::warn!("{}: can't create {}: {}", name, mount_point, e);
    }

    let mounted = match partition_type.as_str() {
        "MTD" => mount_mtd(hal, name, &fs_type, &location, target),
        "UBI" => match ubi::attach(hal, &location) {
            Ok(node) => mount_device(hal, name, &node, &fs_type, &location, target),
            Err(e) => {
                log::error!("{}: UBI attach of {} failed: {}", name, location, e);
                false
            }
        },
        _ => mount_device(hal, name, Path::new(&location), &fs_type, &location, target),
    };

    Ok(if mounted {
        Value::string(mount_point)
    } else {
        Value::empty()
    })
}

pub fn is_mounted_fn(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    let [mount_point] = read_args::<1>(name, state, argv)?;
    require_non_empty("unmount", state, &[("mount_point", &mount_point)])?;

    let volumes = match state.hal().mounted_volumes() {
        Ok(volumes) => volumes,
        Err(e) => {
            log::error!("{}: failed to read mount table: {}", name, e);
            return Ok(Value::empty());
        }
    };
    Ok(match find_by_mount_point(Path::new(&mount_point), &volumes) {
        Some(_) => Value::string(mount_point),
        None => Value::empty(),
    })
}

/// unmount(mount_point)
///
/// A `ubifs` mount also has its UBI device detached once the unmount succeeded.
/// Only that exact filesystem name triggers the detach.
pub fn unmount_fn(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    let [mount_point] = read_args::<1>(name, state, argv)?;
    require_non_empty("unmount", state, &[("mount_point", &mount_point)])?;

    let hal = state.hal();
    let target = Path::new(&mount_point);
    let volumes = match hal.mounted_volumes() {
        Ok(volumes) => volumes,
        Err(e) => {
            log::error!("unmount of {} failed; {}", mount_point, e);
            return Ok(Value::empty());
        }
    };
    let Some(volume) = find_by_mount_point(target, &volumes) else {
        log::error!("unmount of {} failed; no such volume", mount_point);
        return Ok(Value::empty());
    };

    // The mount table entry is stale once unmounted.
    let ubi_device = if volume.filesystem == UBIFS {
        Some(volume.device.clone())
    } else {
        log::debug!("{} is {}; no UBI detach", mount_point, volume.filesystem);
        None
    };

    if let Err(e) = hal.unmount(target) {
        log::error!("unmount of {} failed; {}", mount_point, e);
        return Ok(Value::empty());
    }

    if let Some(device) = ubi_device {
        if let Err(e) = ubi::detach(hal, &device) {
            log::warn!("UBI detach of {} after unmount failed: {}", device, e);
        }
    }
    Ok(Value::string(mount_point))
}

fn erase_mtd(hal: &dyn SystemHal, name: &str, location: &str) -> bool {
    let partitions = match hal.scan_mtd_partitions() {
        Ok(partitions) => partitions,
        Err(e) => {
            log::error!("{}: failed to scan mtd partitions: {}", name, e);
            return false;
        }
    };
    let Some(partition) = find_by_name(location, &partitions) else {
        log::error!("{}: no mtd partition named \"{}\"", name, location);
        return false;
    };
    let mut writer = match hal.open_mtd_writer(partition) {
        Ok(writer) => writer,
        Err(e) => {
            log::error!("{}: can't write \"{}\": {}", name, location, e);
            return false;
        }
    };
    if let Err(e) = writer.erase_remaining() {
        log::error!("{}: failed to erase \"{}\": {}", name, location, e);
        if let Err(e) = writer.close() {
            log::warn!("{}: close after failed erase of \"{}\": {}", name, location, e);
        }
        return false;
    }
    if let Err(e) = writer.close() {
        log::error!("{}: failed to close \"{}\": {}", name, location, e);
        return false;
    }
    true
}

fn format_ubi(hal: &dyn SystemHal, name: &str, location: &str) -> bool {
    match ubi::format(hal, location) {
        Ok(vol_id) => {
            log::info!("{}: created UBI volume {} on {}", name, vol_id, location);
            true
        }
        Err(e) => {
            log::error!("{}: UBI format of {} failed: {}", name, location, e);
            false
        }
    }
}

/// format(fs_type, partition_type, location, fs_size)
///
/// `MTD` and `UBI` partitions are erased; `UBI` then gets one dynamic volume
/// named after the partition. `ext4` on a block device honours `fs_size`: 0 for
/// the whole device, positive for an exact size, negative to reserve that many
/// bytes at the end.
pub fn format_fn(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    let [fs_type, partition_type, location, fs_size] = read_args::<4>(name, state, argv)?;
    require_non_empty(
        name,
        state,
        &[
            ("fs_type", &fs_type),
            ("partition_type", &partition_type),
            ("location", &location),
        ],
    )?;

    let hal = state.hal();
    let formatted = match partition_type.as_str() {
        "MTD" | "UBI" => {
            if !erase_mtd(hal, name, &location) {
                false
            } else if partition_type == "UBI" {
                format_ubi(hal, name, &location)
            } else {
                true
            }
        }
        _ if fs_type == "ext4" => {
            let size = Ext4Size::from_signed(c_long_or_zero(&fs_size));
            match hal.make_ext4fs(Path::new(&location), size) {
                Ok(()) => true,
                Err(e) => {
                    log::error!("{}: make_ext4fs failed ({}) on {}", name, e, location);
                    false
                }
            }
        }
        _ => {
            log::error!(
                "{}: unsupported fs_type \"{}\" partition_type \"{}\"",
                name,
                fs_type,
                partition_type
            );
            false
        }
    };

    Ok(if formatted {
        Value::string(location)
    } else {
        Value::empty()
    })
}
