//! File patching with SHA-1 verification.
//!
//! [`FilePatchEngine`] picks the first candidate patch whose hash matches the
//! source, falling back to the copy saved in the cache directory by an
//! interrupted in-place patch. Output is verified before it replaces the target.

pub mod chunk;
pub mod digest;

use crate::errors::PatchError;
use chunk::{ChunkPatch, PatchAlgorithm};
use digest::{parse_sha1, sha1, sha1_hex, Sha1Digest};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Name of the source copy kept in the cache directory during in-place patching.
pub const CACHE_COPY_NAME: &str = "saved.file";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRequest {
    pub source: PathBuf,
    pub target: PathBuf,
    pub target_sha1: String,
    pub target_size: u64,
    /// `(source sha-1, patch blob)` in script order.
    pub patches: Vec<(String, Vec<u8>)>,
}

pub trait PatchEngine: Send + Sync {
    fn apply(&self, req: &PatchRequest) -> Result<(), PatchError>;

    /// True if `file` (or the cache copy) matches one of `sha1s`, or loads at
    /// all when `sha1s` is empty.
    fn check(&self, file: &Path, sha1s: &[String]) -> bool;

    fn has_cache_space(&self, bytes: u64) -> bool;
}

pub struct FilePatchEngine {
    cache_dir: PathBuf,
    algorithms: Vec<Box<dyn PatchAlgorithm>>,
}

impl FilePatchEngine {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            algorithms: vec![Box::new(ChunkPatch)],
        }
    }

    /// Register another patch format; tried after the ones already present.
    pub fn with_algorithm(mut self, algorithm: Box<dyn PatchAlgorithm>) -> Self {
        self.algorithms.push(algorithm);
        self
    }

    pub fn cache_copy(&self) -> PathBuf {
        self.cache_dir.join(CACHE_COPY_NAME)
    }

    fn free_cache_bytes(&self) -> Result<u64, PatchError> {
        let stat = nix::sys::statvfs::statvfs(&self.cache_dir)?;
        Ok((stat.blocks_available() as u64).saturating_mul(stat.fragment_size() as u64))
    }

    fn save_cache_copy(&self, data: &[u8]) -> Result<(), PatchError> {
        fs::create_dir_all(&self.cache_dir)?;
        let needed = data.len() as u64;
        if !self.has_cache_space(needed) {
            return Err(PatchError::NoCacheSpace(needed));
        }
        write_synced(&self.cache_copy(), data)?;
        Ok(())
    }

    fn patch_with(&self, source: &[u8], patch: &[u8]) -> Result<Vec<u8>, PatchError> {
        let algorithm = self
            .algorithms
            .iter()
            .find(|a| a.accepts(patch))
            .ok_or_else(|| PatchError::Malformed("unknown patch format".to_string()))?;
        log::debug!("applying {} patch ({} bytes)", algorithm.name(), patch.len());
        algorithm.apply(source, patch)
    }
}

fn pick<'p>(data: &[u8], candidates: &[(Option<Sha1Digest>, &'p [u8])]) -> Option<&'p [u8]> {
    let digest = sha1(data);
    candidates
        .iter()
        .find(|(want, _)| *want == Some(digest))
        .map(|(_, patch)| *patch)
}

fn write_synced(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

impl PatchEngine for FilePatchEngine {
    fn apply(&self, req: &PatchRequest) -> Result<(), PatchError> {
        let target_digest = parse_sha1(&req.target_sha1)?;

        if let Ok(current) = fs::read(&req.target) {
            if sha1(&current) == target_digest {
                log::info!("\"{}\" is already target; no patch needed", req.target.display());
                return Ok(());
            }
        }

        let candidates: Vec<(Option<Sha1Digest>, &[u8])> = req
            .patches
            .iter()
            .map(|(hash, patch)| {
                let digest = parse_sha1(hash)
                    .map_err(|e| log::warn!("ignoring candidate: {}", e))
                    .ok();
                (digest, patch.as_slice())
            })
            .collect();

        let live = fs::read(&req.source)
            .map_err(|e| log::warn!("failed to read source {}: {}", req.source.display(), e))
            .ok()
            .and_then(|data| pick(&data, &candidates).map(|patch| (data, patch)));

        let (source_data, patch, from_cache) = match live {
            Some((data, patch)) => (data, patch, false),
            None => {
                let cache = self.cache_copy();
                log::warn!(
                    "source file is bad; trying copy {}",
                    cache.display()
                );
                let data = fs::read(&cache).map_err(|source| PatchError::Load {
                    path: cache.clone(),
                    source,
                })?;
                let patch = pick(&data, &candidates).ok_or(PatchError::NoMatchingSource)?;
                (data, patch, true)
            }
        };

        if !from_cache && req.source == req.target {
            self.save_cache_copy(&source_data)?;
        }

        let patched = self.patch_with(&source_data, patch)?;
        if patched.len() as u64 != req.target_size {
            return Err(PatchError::SizeMismatch {
                expected: req.target_size,
                actual: patched.len() as u64,
            });
        }
        if sha1(&patched) != target_digest {
            return Err(PatchError::DigestMismatch {
                expected: req.target_sha1.to_lowercase(),
                actual: sha1_hex(&patched),
            });
        }

        let staging = sibling(&req.target, ".patch");
        write_synced(&staging, &patched)?;
        if let Ok(meta) = fs::metadata(&req.source) {
            fs::set_permissions(&staging, meta.permissions())?;
        }
        fs::rename(&staging, &req.target)?;
        log::info!(
            "patched {} -> {} ({} bytes)",
            req.source.display(),
            req.target.display(),
            patched.len()
        );

        match fs::remove_file(self.cache_copy()) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                log::warn!("failed to remove cache copy: {}", e)
            }
            _ => {}
        }
        Ok(())
    }

    fn check(&self, file: &Path, sha1s: &[String]) -> bool {
        let wanted: Vec<Sha1Digest> = sha1s
            .iter()
            .filter_map(|s| parse_sha1(s).ok())
            .collect();
        let matches = |path: &Path| match fs::read(path) {
            Ok(data) => sha1s.is_empty() || wanted.contains(&sha1(&data)),
            Err(_) => false,
        };
        if matches(file) {
            return true;
        }
        log::info!("{} does not match; trying cache copy", file.display());
        matches(&self.cache_copy())
    }

    fn has_cache_space(&self, bytes: u64) -> bool {
        match self.free_cache_bytes() {
            Ok(free) => free >= bytes,
            Err(e) => {
                log::error!("failed to stat {}: {}", self.cache_dir.display(), e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::chunk::ChunkPatchBuilder;
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        root: PathBuf,
        engine: FilePatchEngine,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let engine = FilePatchEngine::new(root.join("cache"));
        Fixture {
            _dir: dir,
            root,
            engine,
        }
    }

    fn request(source: &Path, target: &Path, old: &[u8], new: &[u8]) -> PatchRequest {
        let patch = ChunkPatchBuilder::new().insert(new).finish();
        PatchRequest {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
            target_sha1: sha1_hex(new),
            target_size: new.len() as u64,
            patches: vec![("0".repeat(40), Vec::new()), (sha1_hex(old), patch)],
        }
    }

    #[test]
    fn patches_into_new_target() {
        let f = fixture();
        let source = f.root.join("app");
        let target = f.root.join("app.new");
        fs::write(&source, b"old").unwrap();

        f.engine.apply(&request(&source, &target, b"old", b"new contents")).unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"new contents");
        assert_eq!(fs::read(&source).unwrap(), b"old");
        assert!(!sibling(&target, ".patch").exists());
    }

    #[test]
    fn already_patched_target_is_left_alone() {
        let f = fixture();
        let target = f.root.join("app");
        fs::write(&target, b"new").unwrap();

        let mut req = request(&f.root.join("missing"), &target, b"old", b"new");
        req.patches.clear();
        f.engine.apply(&req).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"new");
    }

    #[test]
    fn in_place_patch_removes_cache_copy() {
        let f = fixture();
        let file = f.root.join("app");
        fs::write(&file, b"old").unwrap();

        f.engine.apply(&request(&file, &file, b"old", b"new")).unwrap();

        assert_eq!(fs::read(&file).unwrap(), b"new");
        assert!(!f.engine.cache_copy().exists());
    }

    #[test]
    fn falls_back_to_cache_copy_after_interrupted_run() {
        let f = fixture();
        let file = f.root.join("app");
        fs::write(&file, b"half-written garbage").unwrap();
        fs::create_dir_all(f.root.join("cache")).unwrap();
        fs::write(f.engine.cache_copy(), b"old").unwrap();

        f.engine.apply(&request(&file, &file, b"old", b"new")).unwrap();
        assert_eq!(fs::read(&file).unwrap(), b"new");
    }

    #[test]
    fn no_matching_candidate_fails() {
        let f = fixture();
        let source = f.root.join("app");
        fs::write(&source, b"something else").unwrap();
        fs::create_dir_all(f.root.join("cache")).unwrap();
        fs::write(f.engine.cache_copy(), b"also wrong").unwrap();

        let err = f
            .engine
            .apply(&request(&source, &f.root.join("out"), b"old", b"new"))
            .unwrap_err();
        assert!(matches!(err, PatchError::NoMatchingSource));
    }

    #[test]
    fn wrong_output_is_not_committed() {
        let f = fixture();
        let source = f.root.join("app");
        let target = f.root.join("out");
        fs::write(&source, b"old").unwrap();

        let mut req = request(&source, &target, b"old", b"new");
        req.target_sha1 = sha1_hex(b"different");
        let err = f.engine.apply(&req).unwrap_err();
        assert!(matches!(err, PatchError::DigestMismatch { .. }));
        assert!(!target.exists());

        let mut req = request(&source, &target, b"old", b"new");
        req.target_size = 99;
        assert!(matches!(
            f.engine.apply(&req),
            Err(PatchError::SizeMismatch { expected: 99, actual: 3 })
        ));
    }

    #[test]
    fn check_matches_any_listed_hash() {
        let f = fixture();
        let file = f.root.join("app");
        fs::write(&file, b"abc").unwrap();

        assert!(f.engine.check(&file, &[]));
        assert!(f.engine.check(&file, &["zz".to_string(), sha1_hex(b"abc")]));
        assert!(!f.engine.check(&file, &[sha1_hex(b"abd")]));
        assert!(!f.engine.check(&f.root.join("missing"), &[]));
    }

    #[test]
    fn check_accepts_cache_copy() {
        let f = fixture();
        fs::create_dir_all(f.root.join("cache")).unwrap();
        fs::write(f.engine.cache_copy(), b"abc").unwrap();
        assert!(f.engine.check(&f.root.join("missing"), &[sha1_hex(b"abc")]));
    }

    #[test]
    fn cache_space_reflects_filesystem() {
        let f = fixture();
        fs::create_dir_all(f.root.join("cache")).unwrap();
        assert!(f.engine.has_cache_space(0));
        assert!(!f.engine.has_cache_space(u64::MAX));
        let missing = FilePatchEngine::new(f.root.join("nope"));
        assert!(!missing.has_cache_space(0));
    }
}
