//! Read access to the update package (a zip archive).

use crate::errors::PackageError;
use std::fs::{self, File, FileTimes};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use zip::result::ZipError;
use zip::ZipArchive;

/// 2008-08-01T00:00:00Z. Extracted files always carry this mtime so repeated
/// extractions produce identical trees.
pub const FIXED_MTIME_SECS: u64 = 1_217_592_000;

pub fn fixed_mtime() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(FIXED_MTIME_SECS)
}

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

pub struct PackageArchive {
    path: PathBuf,
    archive: ZipArchive<File>,
}

fn entry_error(name: &str) -> impl FnOnce(ZipError) -> PackageError + '_ {
    move |err| match err {
        ZipError::FileNotFound => PackageError::MissingEntry(name.to_string()),
        other => PackageError::Zip(other),
    }
}

impl PackageArchive {
    pub fn open(path: &Path) -> Result<Self, PackageError> {
        let open_err = |source| PackageError::Open {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(|e| open_err(ZipError::Io(e)))?;
        let archive = ZipArchive::new(file).map_err(open_err)?;
        Ok(Self {
            path: path.to_path_buf(),
            archive,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    /// Whole uncompressed contents of entry `name` (case-sensitive).
    pub fn read_entry(&mut self, name: &str) -> Result<Vec<u8>, PackageError> {
        let mut entry = self.archive.by_name(name).map_err(entry_error(name))?;
        let mut data = Vec::new();
        data.try_reserve_exact(entry.size() as usize)
            .map_err(|_| io::Error::new(io::ErrorKind::OutOfMemory, "entry too large"))?;
        entry.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Stream entry `name` into a newly created `dest`. `dest` is only created once
    /// the entry is known to exist.
    pub fn extract_entry_to(&mut self, name: &str, dest: &Path) -> Result<u64, PackageError> {
        let mut entry = self.archive.by_name(name).map_err(entry_error(name))?;
        let mut out = File::create(dest)?;
        let written = io::copy(&mut entry, &mut out)?;
        out.sync_all()?;
        Ok(written)
    }

    /// Extract every file under `prefix` into `dest`, creating parent directories as
    /// needed. Directory entries are skipped; every extracted file gets `mtime`.
    /// Returns the number of entries written.
    pub fn extract_recursive(
        &mut self,
        prefix: &str,
        dest: &Path,
        mtime: SystemTime,
    ) -> Result<usize, PackageError> {
        let prefix = prefix.trim_end_matches('/');
        let mut extracted = 0;

        for i in 0..self.archive.len() {
            let mut entry = self.archive.by_index(i)?;
            let name = entry.name().to_string();
            let relative = if prefix.is_empty() {
                name.as_str()
            } else {
                match name.strip_prefix(prefix).and_then(|r| r.strip_prefix('/')) {
                    Some(rest) => rest,
                    None => continue,
                }
            };
            if entry.is_dir() || relative.is_empty() {
                continue;
            }
            let relative = match entry.enclosed_name() {
                Some(_) => Path::new(relative).to_path_buf(),
                None => return Err(PackageError::UnsafeEntry(name)),
            };

            let outpath = dest.join(&relative);
            if let Some(parent) = outpath.parent() {
                fs::create_dir_all(parent)?;
            }
            match fs::symlink_metadata(&outpath) {
                Ok(meta) if meta.is_dir() => {
                    log::warn!("{} is a directory, skipping {}", outpath.display(), name);
                    continue;
                }
                Ok(_) => fs::remove_file(&outpath)?,
                Err(_) => {}
            }

            let is_symlink = entry.unix_mode().is_some_and(|m| m & S_IFMT == S_IFLNK);
            if is_symlink {
                let mut target = String::new();
                entry.read_to_string(&mut target)?;
                std::os::unix::fs::symlink(&target, &outpath)?;
            } else {
                let mut out = File::create(&outpath)?;
                io::copy(&mut entry, &mut out)?;
                out.set_times(FileTimes::new().set_accessed(mtime).set_modified(mtime))?;
            }
            log::debug!("extracted {} -> {}", name, outpath.display());
            extracted += 1;
        }
        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::FileOptions;

    fn build_package(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, FileOptions::default()).unwrap();
            } else {
                zip.start_file(*name, FileOptions::default()).unwrap();
                zip.write_all(data).unwrap();
            }
        }
        zip.finish().unwrap();
    }

    #[test]
    fn read_entry_missing_is_reported() {
        let tmp = tempdir().unwrap();
        let pkg = tmp.path().join("update.zip");
        build_package(&pkg, &[("boot.img", b"kernel")]);

        let mut archive = PackageArchive::open(&pkg).unwrap();
        assert_eq!(archive.read_entry("boot.img").unwrap(), b"kernel");
        assert!(matches!(
            archive.read_entry("Boot.img"),
            Err(PackageError::MissingEntry(_))
        ));
    }

    #[test]
    fn extract_entry_to_does_not_create_dest_for_missing_entry() {
        let tmp = tempdir().unwrap();
        let pkg = tmp.path().join("update.zip");
        build_package(&pkg, &[("boot.img", b"kernel")]);

        let mut archive = PackageArchive::open(&pkg).unwrap();
        let dest = tmp.path().join("out.img");
        assert!(archive.extract_entry_to("nope", &dest).is_err());
        assert!(!dest.exists());
        assert_eq!(archive.extract_entry_to("boot.img", &dest).unwrap(), 6);
        assert_eq!(fs::read(&dest).unwrap(), b"kernel");
    }

    #[test]
    fn extract_recursive_strips_prefix_and_skips_siblings() {
        let tmp = tempdir().unwrap();
        let pkg = tmp.path().join("update.zip");
        build_package(
            &pkg,
            &[
                ("system/", b""),
                ("system/bin/sh", b"#!"),
                ("system/build.prop", b"ro.x=1\n"),
                ("systemextra/file", b"no"),
                ("boot.img", b"kernel"),
            ],
        );

        let dest = tmp.path().join("out");
        let mut archive = PackageArchive::open(&pkg).unwrap();
        let n = archive
            .extract_recursive("system/", &dest, fixed_mtime())
            .unwrap();

        assert_eq!(n, 2);
        assert_eq!(fs::read(dest.join("bin/sh")).unwrap(), b"#!");
        assert!(dest.join("build.prop").exists());
        assert!(!dest.join("file").exists());
        let mtime = fs::metadata(dest.join("bin/sh")).unwrap().modified().unwrap();
        assert_eq!(mtime, fixed_mtime());
    }
}
