//! Device node naming for MTD and UBI.

use std::path::{Path, PathBuf};

/// Character device used to write MTD partition `index` (e.g. `/dev/mtd/mtd3`).
pub fn mtd_char_device(dir: &Path, index: u32) -> PathBuf {
    dir.join(format!("mtd{}", index))
}

/// Block device used to mount MTD partition `index` (e.g. `/dev/block/mtdblock3`).
pub fn mtd_block_device(dir: &Path, index: u32) -> PathBuf {
    dir.join(format!("mtdblock{}", index))
}

/// UBI device node (e.g. `/dev/ubi0`).
pub fn ubi_device_node(dev_num: u32) -> PathBuf {
    PathBuf::from(format!("/dev/ubi{}", dev_num))
}

/// Node of the first volume on a UBI device, the one `format` creates.
pub fn ubi_volume_node(dev_num: u32) -> PathBuf {
    PathBuf::from(format!("/dev/ubi{}_0", dev_num))
}

/// Turns a device name as reported by the mount table (`ubi0_0`) into an absolute path.
pub fn normalize_device_path(device: &str) -> PathBuf {
    if device.starts_with('/') {
        PathBuf::from(device)
    } else {
        Path::new("/dev").join(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ubi_nodes_use_kernel_naming() {
        assert_eq!(ubi_device_node(2), PathBuf::from("/dev/ubi2"));
        assert_eq!(ubi_volume_node(0), PathBuf::from("/dev/ubi0_0"));
    }

    #[test]
    fn normalize_device_path_prefixes_bare_names() {
        assert_eq!(normalize_device_path("ubi1_0"), PathBuf::from("/dev/ubi1_0"));
        assert_eq!(
            normalize_device_path("/dev/ubi1_0"),
            PathBuf::from("/dev/ubi1_0")
        );
    }

    #[test]
    fn mtd_nodes_join_configured_dirs() {
        assert_eq!(
            mtd_block_device(Path::new("/dev/block"), 4),
            PathBuf::from("/dev/block/mtdblock4")
        );
        assert_eq!(
            mtd_char_device(Path::new("/dev/mtd"), 4),
            PathBuf::from("/dev/mtd/mtd4")
        );
    }
}
