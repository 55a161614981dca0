//! Mount operations trait.

use crate::procfs::mountinfo::MountedVolume;
use crate::HalResult;
use std::path::Path;

/// Trait for mounting and unmounting filesystems.
pub trait MountOps {
    /// Create `mount_point` (mode 0755) if it does not exist yet.
    fn ensure_mount_point(&self, mount_point: &Path) -> HalResult<()>;

    /// Mount a device to a target path.
    ///
    /// # Arguments
    /// * `device` - Device path (e.g., `/dev/block/mmcblk0p3`, `/dev/ubi0_0`)
    /// * `target` - Mount point path
    /// * `fstype` - Filesystem type (e.g., `"ext4"`, `"ubifs"`)
    /// * `options` - Mount flags
    fn mount_device(
        &self,
        device: &Path,
        target: &Path,
        fstype: &str,
        options: MountOptions,
    ) -> HalResult<()>;

    /// Unmount the filesystem mounted at `target`.
    fn unmount(&self, target: &Path) -> HalResult<()>;

    /// Read the current mounted-volume table. Never cached.
    fn mounted_volumes(&self) -> HalResult<Vec<MountedVolume>>;
}

/// Mount flags used by the updater.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MountOptions {
    pub read_only: bool,
    pub noatime: bool,
    pub nodev: bool,
    pub nodiratime: bool,
}

impl MountOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// `noatime,nodev,nodiratime`, read-write: the flags every updater mount uses.
    pub fn updater_default() -> Self {
        Self {
            read_only: false,
            noatime: true,
            nodev: true,
            nodiratime: true,
        }
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}
