//! Updater configuration (`updater.toml`).
//!
//! Every key is optional; missing keys take the recovery-image defaults.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use updater_hal::DevicePaths;

pub const DEFAULT_SCRIPT_ENTRY: &str = "META-INF/com/google/android/updater-script";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdaterConfig {
    /// Scratch area used by the patch engine.
    pub cache_dir: PathBuf,
    pub log_file: PathBuf,
    pub ubi_ctrl_device: PathBuf,
    pub ubi_ctrl_dev_attr: PathBuf,
    pub sysfs_ubi_dir: PathBuf,
    pub sys_class_block: PathBuf,
    pub proc_mtd: PathBuf,
    pub mountinfo: PathBuf,
    pub mtd_char_dir: PathBuf,
    pub mtd_block_dir: PathBuf,
    pub prop_files: Vec<PathBuf>,
    /// Program used by `set_bootloader_env`.
    pub fw_setenv: String,
    pub command_timeout_secs: u64,
    /// Read size when streaming an image file to flash.
    pub write_chunk_size: usize,
    pub script_entry: String,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        let paths = DevicePaths::default();
        Self {
            cache_dir: PathBuf::from("/cache"),
            log_file: PathBuf::from("/tmp/updater.log"),
            ubi_ctrl_device: paths.ubi_ctrl_node,
            ubi_ctrl_dev_attr: paths.ubi_ctrl_dev_attr,
            sysfs_ubi_dir: paths.ubi_sysfs,
            sys_class_block: paths.sys_class_block,
            proc_mtd: paths.proc_mtd,
            mountinfo: paths.mountinfo,
            mtd_char_dir: paths.mtd_char_dir,
            mtd_block_dir: paths.mtd_block_dir,
            prop_files: paths.prop_files,
            fw_setenv: "fw_setenv".to_string(),
            command_timeout_secs: 600,
            write_chunk_size: 8192,
            script_entry: DEFAULT_SCRIPT_ENTRY.to_string(),
        }
    }
}

impl UpdaterConfig {
    pub fn from_toml_str(text: &str) -> crate::errors::Result<Self> {
        let config: Self = toml::from_str(text).context("failed to parse updater config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> crate::errors::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    fn validate(&self) -> crate::errors::Result<()> {
        if self.write_chunk_size == 0 {
            anyhow::bail!("write_chunk_size must be greater than zero");
        }
        if self.script_entry.is_empty() {
            anyhow::bail!("script_entry must not be empty");
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Kernel interface locations for [`updater_hal::LinuxHal`].
    pub fn device_paths(&self) -> DevicePaths {
        DevicePaths {
            proc_mtd: self.proc_mtd.clone(),
            mountinfo: self.mountinfo.clone(),
            mtd_char_dir: self.mtd_char_dir.clone(),
            mtd_block_dir: self.mtd_block_dir.clone(),
            ubi_ctrl_node: self.ubi_ctrl_device.clone(),
            ubi_ctrl_dev_attr: self.ubi_ctrl_dev_attr.clone(),
            ubi_sysfs: self.sysfs_ubi_dir.clone(),
            sys_class_block: self.sys_class_block.clone(),
            prop_files: self.prop_files.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = UpdaterConfig::from_toml_str("").unwrap();
        assert_eq!(config, UpdaterConfig::default());
        assert_eq!(config.cache_dir, PathBuf::from("/cache"));
        assert_eq!(config.script_entry, DEFAULT_SCRIPT_ENTRY);
    }

    #[test]
    fn overrides_are_applied() {
        let config = UpdaterConfig::from_toml_str(
            r#"
cache_dir = "/tmp/cache"
write_chunk_size = 4096
prop_files = ["/tmp/build.prop"]
"#,
        )
        .unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/cache"));
        assert_eq!(config.write_chunk_size, 4096);
        assert_eq!(config.device_paths().prop_files, vec![PathBuf::from("/tmp/build.prop")]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(UpdaterConfig::from_toml_str("cache_directory = \"/cache\"").is_err());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        assert!(UpdaterConfig::from_toml_str("write_chunk_size = 0").is_err());
    }
}
