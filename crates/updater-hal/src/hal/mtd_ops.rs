//! Raw flash (MTD) operations trait.

use crate::procfs::mtd::MtdPartition;
use crate::HalResult;
use std::path::Path;

/// An open write session on one MTD partition.
///
/// Data is written from the start of the partition onwards. Dropping a writer without
/// calling [`MtdWriter::close`] releases the device but discards a pending partial block.
pub trait MtdWriter {
    /// Queue `data` for writing. Returns the number of bytes accepted; fewer than
    /// `data.len()` means the partition ran out of good blocks.
    fn write_data(&mut self, data: &[u8]) -> HalResult<usize>;

    /// Flush any partial block and erase every block after the written data.
    fn erase_remaining(&mut self) -> HalResult<()>;

    /// Flush any partial block and release the device.
    fn close(self: Box<Self>) -> HalResult<()>;
}

/// Trait for locating, writing and mounting MTD partitions.
pub trait MtdOps {
    /// Re-read the partition table from the kernel.
    fn scan_mtd_partitions(&self) -> HalResult<Vec<MtdPartition>>;

    /// Open a write session on `partition`.
    fn open_mtd_writer<'a>(&'a self, partition: &MtdPartition)
        -> HalResult<Box<dyn MtdWriter + 'a>>;

    /// Mount the block view of `partition` with the updater's default flags.
    fn mount_mtd_partition(
        &self,
        partition: &MtdPartition,
        target: &Path,
        fstype: &str,
        read_only: bool,
    ) -> HalResult<()>;
}
