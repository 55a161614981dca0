//! HAL trait definitions and implementations.
//!
//! This module defines the core traits for device operations and provides
//! both real (LinuxHal) and fake (FakeHal) implementations.

pub mod fake_hal;
pub mod format_ops;
pub mod guards;
pub mod linux_hal;
mod linux_mtd;
mod linux_ubi;
pub mod mount_ops;
pub mod mtd_ops;
pub mod process_ops;
pub mod property_ops;
pub mod ubi_ops;

pub use crate::procfs::mountinfo::MountedVolume;
pub use crate::procfs::mtd::MtdPartition;
pub use fake_hal::{FailPoint, FakeHal, Operation};
pub use format_ops::{Ext4Size, FormatOps};
pub use guards::UbiAttachGuard;
pub use linux_hal::{DevicePaths, LinuxHal};
pub use mount_ops::{MountOps, MountOptions};
pub use mtd_ops::{MtdOps, MtdWriter};
pub use process_ops::ProcessOps;
pub use property_ops::PropertyOps;
pub use ubi_ops::{
    AttachRequest, MkVolRequest, UbiControl, UbiDeviceInfo, UbiInfo, UbiNode, UbiOps,
    UbiVolumeType, UBI_NUM_AUTO,
};

/// Complete HAL combining all device operation traits.
pub trait SystemHal:
    MountOps + FormatOps + MtdOps + UbiOps + ProcessOps + PropertyOps + Send + Sync
{
}

/// Automatically implement SystemHal for any type implementing all required traits.
impl<T> SystemHal for T where
    T: MountOps + FormatOps + MtdOps + UbiOps + ProcessOps + PropertyOps + Send + Sync
{
}
