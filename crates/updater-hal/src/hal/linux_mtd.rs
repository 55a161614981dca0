//! MTD character-device writer (erase, program, verify, skip bad blocks).

use super::linux_hal::map_nix_err;
use super::MtdWriter;
use crate::procfs::mtd::MtdPartition;
use crate::{HalError, HalResult};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct MtdInfoUser {
    pub mtd_type: u8,
    pub flags: u32,
    pub size: u32,
    pub erasesize: u32,
    pub writesize: u32,
    pub oobsize: u32,
    pub padding: u64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct EraseInfoUser {
    pub start: u32,
    pub length: u32,
}

nix::ioctl_read!(mem_get_info, b'M', 1, MtdInfoUser);
nix::ioctl_write_ptr!(mem_erase, b'M', 2, EraseInfoUser);
nix::ioctl_write_ptr!(mem_get_bad_block, b'M', 11, i64);

pub(crate) struct LinuxMtdWriter {
    file: File,
    name: String,
    size: u64,
    erase_size: usize,
    /// Offset of the next block to program.
    pos: u64,
    pending: Vec<u8>,
}

impl LinuxMtdWriter {
    pub(crate) fn open(node: &Path, partition: &MtdPartition) -> HalResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(node)?;

        let mut info = MtdInfoUser::default();
        // SAFETY: `info` is a valid, writable `mtd_info_user` for the duration of the call.
        let (size, erase_size) = match unsafe { mem_get_info(file.as_raw_fd(), &mut info) } {
            Ok(_) if info.erasesize > 0 => (info.size as u64, info.erasesize as usize),
            _ => (partition.size, partition.erase_size as usize),
        };
        if erase_size == 0 {
            return Err(HalError::Parse(format!(
                "mtd{} reports a zero erase size",
                partition.index
            )));
        }

        Ok(Self {
            file,
            name: partition.name.clone(),
            size,
            erase_size,
            pos: 0,
            pending: Vec::with_capacity(erase_size),
        })
    }

    fn is_bad_block(&self, offset: u64) -> bool {
        let offset = offset as i64;
        // SAFETY: the kernel only reads the offset through the pointer.
        match unsafe { mem_get_bad_block(self.file.as_raw_fd(), &offset) } {
            Ok(status) => status > 0,
            // Devices without bad-block tracking (NOR) reject the request.
            Err(_) => false,
        }
    }

    fn erase_block(&self, offset: u64) -> HalResult<()> {
        let erase = EraseInfoUser {
            start: offset as u32,
            length: self.erase_size as u32,
        };
        // SAFETY: `erase` outlives the call and is only read by the kernel.
        unsafe { mem_erase(self.file.as_raw_fd(), &erase) }.map_err(map_nix_err)?;
        Ok(())
    }

    fn program_block(&self, offset: u64, data: &[u8]) -> HalResult<()> {
        self.erase_block(offset)?;
        self.file.write_all_at(data, offset)?;
        let mut verify = vec![0u8; data.len()];
        self.file.read_exact_at(&mut verify, offset)?;
        if verify != data {
            return Err(HalError::Other(format!("verification error at 0x{:08x}", offset)));
        }
        Ok(())
    }

    /// Write one full block at the next good position. `false` means the partition is full.
    fn write_block(&mut self, data: &[u8]) -> bool {
        while self.pos + self.erase_size as u64 <= self.size {
            let offset = self.pos;
            self.pos += self.erase_size as u64;
            if self.is_bad_block(offset) {
                log::warn!("mtd: not writing bad block at 0x{:08x} ({})", offset, self.name);
                continue;
            }
            match self.program_block(offset, data) {
                Ok(()) => return true,
                Err(err) => {
                    log::warn!("mtd: {} at 0x{:08x} ({}), skipping", err, offset, self.name);
                    let _ = self.erase_block(offset);
                }
            }
        }
        log::error!("mtd: no space left on {}", self.name);
        false
    }

    fn flush_partial(&mut self) -> HalResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.pending.resize(self.erase_size, 0);
        let block = std::mem::take(&mut self.pending);
        if !self.write_block(&block) {
            return Err(HalError::NoSpace(self.name.clone()));
        }
        Ok(())
    }
}

impl MtdWriter for LinuxMtdWriter {
    fn write_data(&mut self, data: &[u8]) -> HalResult<usize> {
        let mut consumed = 0;
        while consumed < data.len() {
            let room = self.erase_size - self.pending.len();
            let take = room.min(data.len() - consumed);
            self.pending.extend_from_slice(&data[consumed..consumed + take]);
            consumed += take;

            if self.pending.len() == self.erase_size {
                let block = std::mem::take(&mut self.pending);
                if !self.write_block(&block) {
                    return Ok(consumed.saturating_sub(block.len()));
                }
                self.pending = Vec::with_capacity(self.erase_size);
            }
        }
        Ok(consumed)
    }

    fn erase_remaining(&mut self) -> HalResult<()> {
        self.flush_partial()?;
        while self.pos + self.erase_size as u64 <= self.size {
            let offset = self.pos;
            self.pos += self.erase_size as u64;
            if self.is_bad_block(offset) {
                continue;
            }
            if let Err(err) = self.erase_block(offset) {
                log::warn!("mtd: erase failure at 0x{:08x} ({}): {}", offset, self.name, err);
            }
        }
        Ok(())
    }

    fn close(mut self: Box<Self>) -> HalResult<()> {
        self.flush_partial()?;
        self.file.sync_all().or_else(|err| match err.raw_os_error() {
            Some(libc::EINVAL) => Ok(()),
            _ => Err(HalError::Io(err)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mtd_ioctl_structs_match_kernel_layout() {
        assert_eq!(std::mem::size_of::<MtdInfoUser>(), 32);
        assert_eq!(std::mem::size_of::<EraseInfoUser>(), 8);
    }
}
