//! Copy/insert chunk patches.
//!
//! ```text
//! "UPCHUNK1"
//! 'C' <u64le offset> <u64le len>    copy from the source
//! 'I' <u64le len> <len bytes>       insert literal bytes
//! ```

use crate::errors::PatchError;

pub const CHUNK_MAGIC: &[u8; 8] = b"UPCHUNK1";

/// Decodes one patch format. The engine picks the first algorithm that accepts
/// a blob.
pub trait PatchAlgorithm: Send + Sync {
    fn name(&self) -> &'static str;

    fn accepts(&self, patch: &[u8]) -> bool;

    fn apply(&self, source: &[u8], patch: &[u8]) -> Result<Vec<u8>, PatchError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ChunkPatch;

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], PatchError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| PatchError::Malformed(format!("truncated at byte {}", self.pos)))?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u64(&mut self) -> Result<u64, PatchError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn usize(&mut self) -> Result<usize, PatchError> {
        let value = self.u64()?;
        usize::try_from(value).map_err(|_| PatchError::Malformed(format!("length {} too large", value)))
    }
}

impl PatchAlgorithm for ChunkPatch {
    fn name(&self) -> &'static str {
        "chunk"
    }

    fn accepts(&self, patch: &[u8]) -> bool {
        patch.starts_with(CHUNK_MAGIC)
    }

    fn apply(&self, source: &[u8], patch: &[u8]) -> Result<Vec<u8>, PatchError> {
        if !self.accepts(patch) {
            return Err(PatchError::Malformed("missing chunk header".to_string()));
        }
        let mut reader = Reader {
            data: patch,
            pos: CHUNK_MAGIC.len(),
        };
        let mut out = Vec::new();
        while reader.pos < patch.len() {
            match reader.take(1)?[0] {
                b'C' => {
                    let offset = reader.usize()?;
                    let len = reader.usize()?;
                    let chunk = offset
                        .checked_add(len)
                        .and_then(|end| source.get(offset..end))
                        .ok_or_else(|| {
                            PatchError::Malformed(format!(
                                "copy {}+{} past end of {}-byte source",
                                offset,
                                len,
                                source.len()
                            ))
                        })?;
                    out.extend_from_slice(chunk);
                }
                b'I' => {
                    let len = reader.usize()?;
                    out.extend_from_slice(reader.take(len)?);
                }
                op => {
                    return Err(PatchError::Malformed(format!(
                        "unknown op 0x{:02x} at byte {}",
                        op,
                        reader.pos - 1
                    )))
                }
            }
        }
        Ok(out)
    }
}

/// Builds chunk patches; used by packaging tools and tests.
#[derive(Debug, Clone)]
pub struct ChunkPatchBuilder {
    out: Vec<u8>,
}

impl Default for ChunkPatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkPatchBuilder {
    pub fn new() -> Self {
        Self {
            out: CHUNK_MAGIC.to_vec(),
        }
    }

    pub fn copy(mut self, offset: u64, len: u64) -> Self {
        self.out.push(b'C');
        self.out.extend_from_slice(&offset.to_le_bytes());
        self.out.extend_from_slice(&len.to_le_bytes());
        self
    }

    pub fn insert(mut self, data: &[u8]) -> Self {
        self.out.push(b'I');
        self.out.extend_from_slice(&(data.len() as u64).to_le_bytes());
        self.out.extend_from_slice(data);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_and_inserts_in_order() {
        let patch = ChunkPatchBuilder::new()
            .copy(6, 5)
            .insert(b", ")
            .copy(0, 5)
            .finish();
        let out = ChunkPatch.apply(b"hello world", &patch).unwrap();
        assert_eq!(out, b"world, hello");
    }

    #[test]
    fn empty_patch_yields_empty_output() {
        let patch = ChunkPatchBuilder::new().finish();
        assert!(ChunkPatch.apply(b"anything", &patch).unwrap().is_empty());
    }

    #[test]
    fn copy_past_source_end_is_malformed() {
        let patch = ChunkPatchBuilder::new().copy(4, 10).finish();
        assert!(matches!(
            ChunkPatch.apply(b"short", &patch),
            Err(PatchError::Malformed(_))
        ));
    }

    #[test]
    fn truncated_insert_is_malformed() {
        let mut patch = ChunkPatchBuilder::new().insert(b"abcdef").finish();
        patch.truncate(patch.len() - 2);
        assert!(ChunkPatch.apply(b"", &patch).is_err());
    }

    #[test]
    fn rejects_foreign_blobs() {
        assert!(!ChunkPatch.accepts(b"BSDIFF40...."));
        assert!(ChunkPatch.apply(b"", b"BSDIFF40").is_err());
    }
}
