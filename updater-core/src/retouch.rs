//! Relocation of prelinked binaries ("retouching").
//!
//! A retouchable file ends with a trailer:
//!
//! ```text
//! <u32le offset>*N <i32le current>  "RETOUCH " <u32le blob_len>
//! ```
//!
//! Every listed offset holds a u32le address word that was linked relative to
//! `current`. Retouching to `desired` adds `desired - current` to each word and
//! stores `desired` as the new `current`.

use crate::errors::RetouchError;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const RETOUCH_MAGIC: &[u8; 8] = b"RETOUCH ";
const TRAILER_LEN: usize = 12;

/// Offset shared across one batch of files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideSlot {
    /// Nothing chosen yet; the first file fixes it.
    Open,
    /// Every later file uses this offset.
    Set(i32),
    /// Always apply the job's own offset (undo).
    Disabled,
}

#[derive(Debug, Clone, Copy)]
pub struct RetouchJob<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub random_base: i32,
    pub override_slot: OverrideSlot,
}

pub trait Retoucher: Send + Sync {
    /// Relocate one file; returns the slot the next file in the batch uses.
    fn retouch(&self, job: &RetouchJob<'_>) -> Result<OverrideSlot, RetouchError>;
}

#[derive(Debug)]
struct Trailer {
    offsets: Vec<usize>,
    current: i32,
    /// Position of the `current` word.
    current_pos: usize,
}

fn read_u32(data: &[u8], pos: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&data[pos..pos + 4]);
    u32::from_le_bytes(buf)
}

fn parse_trailer(path: &Path, data: &[u8]) -> Result<Trailer, RetouchError> {
    let corrupt = |reason: String| RetouchError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    let len = data.len();
    if len < TRAILER_LEN || &data[len - TRAILER_LEN..len - 4] != RETOUCH_MAGIC {
        return Err(RetouchError::MissingTrailer(path.to_path_buf()));
    }
    let blob_len = read_u32(data, len - 4) as usize;
    if blob_len < 4 || blob_len % 4 != 0 {
        return Err(corrupt(format!("bad blob length {}", blob_len)));
    }
    let blob_start = (len - TRAILER_LEN)
        .checked_sub(blob_len)
        .ok_or_else(|| corrupt(format!("blob length {} exceeds file", blob_len)))?;

    let current_pos = blob_start + blob_len - 4;
    let mut offsets = Vec::with_capacity(blob_len / 4 - 1);
    for pos in (blob_start..current_pos).step_by(4) {
        let offset = read_u32(data, pos) as usize;
        if offset + 4 > blob_start {
            return Err(corrupt(format!("offset 0x{:x} outside image", offset)));
        }
        offsets.push(offset);
    }

    Ok(Trailer {
        offsets,
        current: read_u32(data, current_pos) as i32,
        current_pos,
    })
}

fn relocate(data: &mut [u8], trailer: &Trailer, desired: i32) {
    let delta = desired.wrapping_sub(trailer.current) as u32;
    for &offset in &trailer.offsets {
        let word = read_u32(data, offset).wrapping_add(delta);
        data[offset..offset + 4].copy_from_slice(&word.to_le_bytes());
    }
    data[trailer.current_pos..trailer.current_pos + 4].copy_from_slice(&desired.to_le_bytes());
}

fn staging_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".retouch");
    PathBuf::from(name)
}

/// Retouches files in place on the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileRetoucher;

impl Retoucher for FileRetoucher {
    fn retouch(&self, job: &RetouchJob<'_>) -> Result<OverrideSlot, RetouchError> {
        let mut data = fs::read(job.input)?;
        let trailer = parse_trailer(job.input, &data)?;

        let desired = match job.override_slot {
            OverrideSlot::Open if trailer.current != 0 => {
                log::info!(
                    "{} already retouched at {:#x}; keeping it",
                    job.input.display(),
                    trailer.current
                );
                trailer.current
            }
            OverrideSlot::Open | OverrideSlot::Disabled => job.random_base,
            OverrideSlot::Set(offset) => offset,
        };

        relocate(&mut data, &trailer, desired);

        let staging = staging_path(job.output);
        let mut file = File::create(&staging)?;
        file.write_all(&data)?;
        file.sync_all()?;
        fs::set_permissions(&staging, fs::metadata(job.input)?.permissions())?;
        fs::rename(&staging, job.output)?;

        log::debug!(
            "retouched {} -> {} at {:#x} ({} words)",
            job.input.display(),
            job.output.display(),
            desired,
            trailer.offsets.len()
        );

        Ok(match job.override_slot {
            OverrideSlot::Open if desired != 0 => OverrideSlot::Set(desired),
            slot => slot,
        })
    }
}
