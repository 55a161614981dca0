//! Parsing helpers for `/proc/self/mountinfo`.

use std::path::{Path, PathBuf};

/// One row of the mounted-volume table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedVolume {
    /// Mount source as the kernel reports it (`/dev/block/mmcblk0p3`, `ubi0_0`, ...).
    pub device: String,
    pub mount_point: PathBuf,
    pub filesystem: String,
}

pub fn parse_mountinfo(content: &str) -> Vec<MountedVolume> {
    content
        .lines()
        .filter_map(|line| {
            // mountinfo format:
            //   <id> <parent> <major:minor> <root> <mount point> <opts...> - <fstype> <source> <superopts>
            let (pre, post) = line.split_once(" - ")?;
            let pre_fields: Vec<&str> = pre.split_whitespace().collect();
            if pre_fields.len() < 5 {
                return None;
            }
            let mut post_fields = post.split_whitespace();
            let filesystem = post_fields.next()?.to_string();
            let device = unescape_mount_path(post_fields.next()?);
            Some(MountedVolume {
                device,
                mount_point: PathBuf::from(unescape_mount_path(pre_fields[4])),
                filesystem,
            })
        })
        .collect()
}

/// Finds the most recent mount on `path` (later rows shadow earlier ones).
pub fn find_by_mount_point<'a>(
    path: &Path,
    entries: &'a [MountedVolume],
) -> Option<&'a MountedVolume> {
    let target = normalize_path(path);
    entries
        .iter()
        .rev()
        .find(|entry| normalize_path(&entry.mount_point) == target)
}

pub fn unescape_mount_path(raw: &str) -> String {
    raw.replace("\\040", " ")
        .replace("\\011", "\t")
        .replace("\\012", "\n")
        .replace("\\134", "\\")
}

fn normalize_path(path: &Path) -> String {
    let s = path.to_string_lossy();
    if s.len() > 1 && s.ends_with('/') {
        s.trim_end_matches('/').to_string()
    } else {
        s.to_string()
    }
}
