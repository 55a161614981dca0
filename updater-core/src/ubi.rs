//! UBI lifecycle: attach, detach and format against the kernel control device.
//!
//! Nothing is kept between calls. Each operation opens its own [`UbiSession`],
//! and everything it attached for its own use is detached again before it returns.

use crate::errors::UbiError;
use std::path::PathBuf;
use updater_hal::path::{normalize_device_path, ubi_volume_node};
use updater_hal::procfs::mtd::find_by_name;
use updater_hal::{
    AttachRequest, MkVolRequest, MtdPartition, SystemHal, UbiAttachGuard, UbiControl,
    UbiVolumeType, UBI_NUM_AUTO,
};

/// Rescan the MTD table and look up `location`.
pub fn resolve_mtd(hal: &dyn SystemHal, location: &str) -> Result<MtdPartition, UbiError> {
    let partitions = hal
        .scan_mtd_partitions()
        .map_err(UbiError::hal("scan mtd partitions"))?;
    find_by_name(location, &partitions)
        .cloned()
        .ok_or_else(|| UbiError::UnknownPartition(location.to_string()))
}

/// A capability-checked handle on the UBI control interface. Dropping it closes
/// the handle.
pub struct UbiSession<'h> {
    ctrl: Box<dyn UbiControl + 'h>,
}

impl<'h> UbiSession<'h> {
    pub fn open(hal: &'h dyn SystemHal) -> Result<Self, UbiError> {
        let ctrl = hal
            .open_ubi_control()
            .map_err(UbiError::hal("open UBI control"))?;
        let info = ctrl
            .info()
            .map_err(UbiError::hal("cannot get UBI information"))?;
        if info.ctrl_major.is_none() {
            return Err(UbiError::Unsupported);
        }
        Ok(Self { ctrl })
    }

    /// Attach `mtd_num` with an automatic device number and the default VID
    /// header offset.
    pub fn attach(&mut self, mtd_num: u32) -> Result<u32, UbiError> {
        self.ctrl
            .attach(&AttachRequest::auto(mtd_num))
            .map_err(|e| UbiError::Attach(mtd_num, e))
    }

    /// Remove the UBI device behind `device` (a device or volume node, absolute
    /// or relative to `/dev`).
    pub fn detach_node(&mut self, device: &str) -> Result<u32, UbiError> {
        let path = normalize_device_path(device);
        let node = self
            .ctrl
            .probe_node(&path)
            .map_err(UbiError::hal("error while probing"))?;
        let dev_num = node.dev_num();
        self.ctrl
            .remove_device(dev_num)
            .map_err(UbiError::hal("could not remove dev"))?;
        Ok(dev_num)
    }

    /// Detach any stale attachment of `mtd_num`, attach it fresh, create one
    /// volume spanning the device and detach again. Returns the new volume id.
    pub fn format(
        mut self,
        mtd_num: u32,
        name: &str,
        vol_type: UbiVolumeType,
    ) -> Result<u32, UbiError> {
        if let Err(err) = self.ctrl.detach_mtd(mtd_num) {
            log::debug!("no stale UBI attachment on mtd{}: {}", mtd_num, err);
        }

        let dev_num = self.attach(mtd_num)?;
        let mut guard = UbiAttachGuard::new(self.ctrl, mtd_num, dev_num);

        let info = guard.device_info(dev_num).map_err(UbiError::hal(
            "cannot get information about newly created UBI device",
        ))?;
        log::info!(
            "ubi{}: mtd{} attached, {} bytes available",
            info.dev_num,
            info.mtd_num,
            info.avail_bytes
        );

        let req = MkVolRequest {
            vol_id: UBI_NUM_AUTO,
            alignment: 1,
            bytes: info.avail_bytes,
            vol_type,
            name: name.to_string(),
        };
        let vol_id = guard
            .make_volume(info.dev_num, &req)
            .map_err(UbiError::hal("cannot UBI create volume"))?;

        if let Err(err) = guard.finish() {
            log::warn!("detach of mtd{} after format failed: {}", mtd_num, err);
        }
        Ok(vol_id)
    }
}

/// Attach the MTD partition named `location`; returns the node of its first volume.
pub fn attach(hal: &dyn SystemHal, location: &str) -> Result<PathBuf, UbiError> {
    let mtd = resolve_mtd(hal, location)?;
    let mut session = UbiSession::open(hal)?;
    let dev_num = session.attach(mtd.index)?;
    Ok(ubi_volume_node(dev_num))
}

/// Remove the UBI device backing `device`; returns its device number.
pub fn detach(hal: &dyn SystemHal, device: &str) -> Result<u32, UbiError> {
    UbiSession::open(hal)?.detach_node(device)
}

/// Recreate a single dynamic volume named `location` on that MTD partition.
pub fn format(hal: &dyn SystemHal, location: &str) -> Result<u32, UbiError> {
    let mtd = resolve_mtd(hal, location)?;
    UbiSession::open(hal)?.format(mtd.index, location, UbiVolumeType::Dynamic)
}
