//! Filesystem creation trait.

use crate::HalResult;
use std::fmt;
use std::path::Path;

/// How much of a block device an ext4 filesystem should cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ext4Size {
    /// The whole device.
    Full,
    /// Exactly this many bytes.
    Exact(u64),
    /// The whole device minus this many bytes at the end.
    Reserve(u64),
}

impl Ext4Size {
    /// `0` = full device, `> 0` = exact size, `< 0` = reserve `|n|` bytes at the end.
    pub fn from_signed(fs_size: i64) -> Self {
        match fs_size {
            0 => Ext4Size::Full,
            n if n > 0 => Ext4Size::Exact(n as u64),
            n => Ext4Size::Reserve(n.unsigned_abs()),
        }
    }

    /// Bytes to format on a device of `device_size` bytes; `None` means "let mke2fs decide".
    pub fn resolve(self, device_size: u64) -> Option<u64> {
        match self {
            Ext4Size::Full => None,
            Ext4Size::Exact(n) => Some(n),
            Ext4Size::Reserve(n) => Some(device_size.saturating_sub(n)),
        }
    }
}

impl fmt::Display for Ext4Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ext4Size::Full => write!(f, "full"),
            Ext4Size::Exact(n) => write!(f, "{} bytes", n),
            Ext4Size::Reserve(n) => write!(f, "full minus {} bytes", n),
        }
    }
}

/// Trait for creating filesystems on block devices.
pub trait FormatOps {
    /// Build an ext4 filesystem on `device`.
    fn make_ext4fs(&self, device: &Path, size: Ext4Size) -> HalResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_signed_maps_sign_to_mode() {
        assert_eq!(Ext4Size::from_signed(0), Ext4Size::Full);
        assert_eq!(Ext4Size::from_signed(4096), Ext4Size::Exact(4096));
        assert_eq!(Ext4Size::from_signed(-16384), Ext4Size::Reserve(16384));
    }

    #[test]
    fn resolve_reserves_from_the_end() {
        assert_eq!(Ext4Size::Full.resolve(1 << 20), None);
        assert_eq!(Ext4Size::Exact(4096).resolve(1 << 20), Some(4096));
        assert_eq!(
            Ext4Size::Reserve(16384).resolve(1 << 20),
            Some((1 << 20) - 16384)
        );
        assert_eq!(Ext4Size::Reserve(u64::MAX).resolve(10), Some(0));
    }
}
