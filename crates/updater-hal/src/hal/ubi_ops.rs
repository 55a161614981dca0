//! UBI control operations (attach, detach, volume creation).

use crate::HalResult;
use std::path::Path;

/// Let the kernel pick the device or volume number.
pub const UBI_NUM_AUTO: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UbiVolumeType {
    Dynamic,
    Static,
}

impl UbiVolumeType {
    /// Kernel ABI value (`UBI_DYNAMIC_VOLUME` / `UBI_STATIC_VOLUME`).
    pub fn as_raw(self) -> i8 {
        match self {
            UbiVolumeType::Dynamic => 3,
            UbiVolumeType::Static => 4,
        }
    }
}

/// Global UBI information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UbiInfo {
    /// Major number of the control device; `None` when the kernel cannot attach/detach.
    pub ctrl_major: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachRequest {
    pub dev_num: i32,
    pub mtd_num: u32,
    pub vid_hdr_offset: i32,
}

impl AttachRequest {
    /// Auto-numbered device, default VID header offset.
    pub fn auto(mtd_num: u32) -> Self {
        Self {
            dev_num: UBI_NUM_AUTO,
            mtd_num,
            vid_hdr_offset: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MkVolRequest {
    pub vol_id: i32,
    pub alignment: i32,
    pub bytes: u64,
    pub vol_type: UbiVolumeType,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UbiDeviceInfo {
    pub dev_num: u32,
    pub mtd_num: u32,
    pub avail_bytes: u64,
}

/// What a `/dev/ubi*` node refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UbiNode {
    Device { dev_num: u32 },
    Volume { dev_num: u32, vol_id: u32 },
}

impl UbiNode {
    pub fn dev_num(self) -> u32 {
        match self {
            UbiNode::Device { dev_num } | UbiNode::Volume { dev_num, .. } => dev_num,
        }
    }
}

/// An open handle on the UBI control interface. Dropping it closes the handle.
pub trait UbiControl {
    fn info(&self) -> HalResult<UbiInfo>;

    /// Attach an MTD partition, returning the UBI device number.
    fn attach(&mut self, req: &AttachRequest) -> HalResult<u32>;

    /// Detach whatever UBI device is attached to `mtd_num`.
    fn detach_mtd(&mut self, mtd_num: u32) -> HalResult<()>;

    /// Remove UBI device `dev_num`.
    fn remove_device(&mut self, dev_num: u32) -> HalResult<()>;

    fn probe_node(&self, node: &Path) -> HalResult<UbiNode>;

    fn device_info(&self, dev_num: u32) -> HalResult<UbiDeviceInfo>;

    /// Create a volume on device `dev_num`, returning the volume id.
    fn make_volume(&mut self, dev_num: u32, req: &MkVolRequest) -> HalResult<u32>;
}

pub trait UbiOps {
    fn open_ubi_control<'a>(&'a self) -> HalResult<Box<dyn UbiControl + 'a>>;
}
