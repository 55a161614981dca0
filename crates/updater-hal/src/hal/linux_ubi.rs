//! UBI control device access via `/dev/ubi_ctrl` ioctls and the UBI sysfs tree.

use super::linux_hal::{map_nix_err, DevicePaths};
use super::{AttachRequest, MkVolRequest, UbiControl, UbiDeviceInfo, UbiInfo, UbiNode};
use crate::{sysfs, HalError, HalResult};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// Longest volume name the kernel accepts.
pub const UBI_MAX_VOLUME_NAME: usize = 127;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct UbiAttachReq {
    pub ubi_num: i32,
    pub mtd_num: i32,
    pub vid_hdr_offset: i32,
    pub max_beb_per1024: i16,
    pub disable_fm: i8,
    pub need_resv_pool: i8,
    pub padding: [i8; 8],
}

#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct UbiMkVolReq {
    pub vol_id: i32,
    pub alignment: i32,
    pub bytes: i64,
    pub vol_type: i8,
    pub flags: u8,
    pub name_len: i16,
    pub padding2: [i8; 4],
    pub name: [u8; UBI_MAX_VOLUME_NAME + 1],
}

// Attach and mkvol are declared write-only but the kernel stores the allocated number back.
nix::ioctl_readwrite_bad!(
    ubi_attach,
    nix::request_code_write!(b'o', 64, std::mem::size_of::<UbiAttachReq>()),
    UbiAttachReq
);
nix::ioctl_write_ptr!(ubi_detach, b'o', 65, i32);
nix::ioctl_readwrite_bad!(
    ubi_mkvol,
    nix::request_code_write!(b'o', 0, std::mem::size_of::<UbiMkVolReq>()),
    UbiMkVolReq
);

pub(crate) struct LinuxUbiControl {
    ctrl: File,
    sysfs_root: PathBuf,
    ctrl_dev_attr: PathBuf,
    /// Device nodes (`/dev/ubiN`) are opened relative to this directory.
    dev_dir: PathBuf,
}

impl LinuxUbiControl {
    pub(crate) fn open(paths: &DevicePaths) -> HalResult<Self> {
        let ctrl = OpenOptions::new()
            .read(true)
            .open(&paths.ubi_ctrl_node)
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => {
                    HalError::NotFound(paths.ubi_ctrl_node.display().to_string())
                }
                _ => HalError::Io(err),
            })?;
        let dev_dir = paths
            .ubi_ctrl_node
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/dev"));
        Ok(Self {
            ctrl,
            sysfs_root: paths.ubi_sysfs.clone(),
            ctrl_dev_attr: paths.ubi_ctrl_dev_attr.clone(),
            dev_dir,
        })
    }
}

impl UbiControl for LinuxUbiControl {
    fn info(&self) -> HalResult<UbiInfo> {
        Ok(UbiInfo {
            ctrl_major: sysfs::ubi::ctrl_major(&self.ctrl_dev_attr),
        })
    }

    fn attach(&mut self, req: &AttachRequest) -> HalResult<u32> {
        let mut raw = UbiAttachReq {
            ubi_num: req.dev_num,
            mtd_num: req.mtd_num as i32,
            vid_hdr_offset: req.vid_hdr_offset,
            ..UbiAttachReq::default()
        };
        // SAFETY: `raw` is a valid `ubi_attach_req` the kernel may read and update.
        unsafe { ubi_attach(self.ctrl.as_raw_fd(), &mut raw) }.map_err(map_nix_err)?;
        u32::try_from(raw.ubi_num)
            .map_err(|_| HalError::Other(format!("kernel returned UBI device {}", raw.ubi_num)))
    }

    fn detach_mtd(&mut self, mtd_num: u32) -> HalResult<()> {
        match sysfs::ubi::device_for_mtd(&self.sysfs_root, mtd_num)? {
            Some(dev_num) => self.remove_device(dev_num),
            None => Err(HalError::NotFound(format!("UBI device for mtd{}", mtd_num))),
        }
    }

    fn remove_device(&mut self, dev_num: u32) -> HalResult<()> {
        let num = dev_num as i32;
        // SAFETY: the kernel only reads the device number through the pointer.
        unsafe { ubi_detach(self.ctrl.as_raw_fd(), &num) }.map_err(map_nix_err)?;
        Ok(())
    }

    fn probe_node(&self, node: &Path) -> HalResult<UbiNode> {
        let st = nix::sys::stat::stat(node).map_err(map_nix_err)?;
        let numbers = (
            nix::sys::stat::major(st.st_rdev),
            nix::sys::stat::minor(st.st_rdev),
        );
        sysfs::ubi::probe_dev_numbers(&self.sysfs_root, numbers)?
            .ok_or_else(|| HalError::NotFound(format!("{} is not a UBI node", node.display())))
    }

    fn device_info(&self, dev_num: u32) -> HalResult<UbiDeviceInfo> {
        sysfs::ubi::device_info(&self.sysfs_root, dev_num)
    }

    fn make_volume(&mut self, dev_num: u32, req: &MkVolRequest) -> HalResult<u32> {
        let name = req.name.as_bytes();
        if name.len() > UBI_MAX_VOLUME_NAME {
            return Err(HalError::Unsupported(format!(
                "UBI volume name longer than {} bytes",
                UBI_MAX_VOLUME_NAME
            )));
        }
        let mut raw = UbiMkVolReq {
            vol_id: req.vol_id,
            alignment: req.alignment,
            bytes: req.bytes as i64,
            vol_type: req.vol_type.as_raw(),
            flags: 0,
            name_len: name.len() as i16,
            padding2: [0; 4],
            name: [0; UBI_MAX_VOLUME_NAME + 1],
        };
        raw.name[..name.len()].copy_from_slice(name);

        // Volumes are created through the device node, not the control node.
        let node = self.dev_dir.join(format!("ubi{}", dev_num));
        let dev = OpenOptions::new().read(true).open(&node)?;
        // SAFETY: `raw` is a valid `ubi_mkvol_req` the kernel may read and update.
        unsafe { ubi_mkvol(dev.as_raw_fd(), &mut raw) }.map_err(map_nix_err)?;
        let vol_id = raw.vol_id;
        u32::try_from(vol_id)
            .map_err(|_| HalError::Other(format!("kernel returned UBI volume {}", vol_id)))
    }
}
