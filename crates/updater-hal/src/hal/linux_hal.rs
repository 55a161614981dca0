//! Linux HAL implementation using real system calls.

use super::linux_mtd::LinuxMtdWriter;
use super::linux_ubi::LinuxUbiControl;
use super::{
    Ext4Size, FormatOps, MountOps, MountOptions, MtdOps, MtdWriter, ProcessOps, PropertyOps,
    UbiControl, UbiOps,
};
use crate::procfs::mountinfo::{parse_mountinfo, MountedVolume};
use crate::procfs::mtd::{parse_proc_mtd, MtdPartition};
use crate::{HalError, HalResult};
use std::fs;
use std::io::Read;
use std::os::unix::fs::DirBuilderExt;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Kernel interfaces the updater reads and writes.
#[derive(Debug, Clone)]
pub struct DevicePaths {
    pub proc_mtd: PathBuf,
    pub mountinfo: PathBuf,
    pub mtd_char_dir: PathBuf,
    pub mtd_block_dir: PathBuf,
    pub ubi_ctrl_node: PathBuf,
    pub ubi_ctrl_dev_attr: PathBuf,
    pub ubi_sysfs: PathBuf,
    pub sys_class_block: PathBuf,
    /// Property files, searched in order.
    pub prop_files: Vec<PathBuf>,
}

impl Default for DevicePaths {
    fn default() -> Self {
        Self {
            proc_mtd: PathBuf::from("/proc/mtd"),
            mountinfo: PathBuf::from("/proc/self/mountinfo"),
            mtd_char_dir: PathBuf::from("/dev/mtd"),
            mtd_block_dir: PathBuf::from("/dev/block"),
            ubi_ctrl_node: PathBuf::from("/dev/ubi_ctrl"),
            ubi_ctrl_dev_attr: PathBuf::from("/sys/class/misc/ubi_ctrl/dev"),
            ubi_sysfs: PathBuf::from("/sys/class/ubi"),
            sys_class_block: PathBuf::from("/sys/class/block"),
            prop_files: vec![
                PathBuf::from("/default.prop"),
                PathBuf::from("/system/build.prop"),
            ],
        }
    }
}

/// Real HAL implementation for Linux systems.
#[derive(Debug, Clone, Default)]
pub struct LinuxHal {
    paths: DevicePaths,
}

impl LinuxHal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_paths(paths: DevicePaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &DevicePaths {
        &self.paths
    }
}

const FORMAT_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const MKE2FS: &str = "mke2fs";

fn map_command_err(program: &str, err: std::io::Error) -> HalError {
    if err.kind() == std::io::ErrorKind::NotFound {
        return HalError::CommandNotFound(program.to_string());
    }
    HalError::Io(err)
}

fn output_failed(program: &str, output: &Output) -> HalError {
    HalError::CommandFailed {
        program: program.to_string(),
        code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

fn output_with_timeout(program: &str, cmd: &mut Command, timeout: Duration) -> HalResult<Output> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = cmd.spawn().map_err(|e| map_command_err(program, e))?;

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();

    // Drain pipes concurrently to avoid deadlocks on large output.
    let stdout_handle = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout.take() {
            let _ = out.read_to_end(&mut buf);
        }
        buf
    });
    let stderr_handle = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr.take() {
            let _ = err.read_to_end(&mut buf);
        }
        buf
    });

    let status = match child.wait_timeout(timeout).map_err(HalError::Io)? {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            let _ = stdout_handle.join();
            let _ = stderr_handle.join();
            return Err(HalError::CommandTimeout {
                program: program.to_string(),
                timeout_secs: timeout.as_secs(),
            });
        }
    };

    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();
    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

pub(crate) fn map_nix_err(err: nix::errno::Errno) -> HalError {
    use nix::errno::Errno;
    match err {
        Errno::EBUSY => HalError::DeviceBusy,
        Errno::EACCES | Errno::EPERM => HalError::PermissionDenied,
        Errno::ENOENT => HalError::NotFound(err.desc().to_string()),
        other => HalError::Nix(other),
    }
}

fn ms_flags(options: MountOptions) -> nix::mount::MsFlags {
    use nix::mount::MsFlags;
    let mut flags = MsFlags::empty();
    if options.read_only {
        flags |= MsFlags::MS_RDONLY;
    }
    if options.noatime {
        flags |= MsFlags::MS_NOATIME;
    }
    if options.nodev {
        flags |= MsFlags::MS_NODEV;
    }
    if options.nodiratime {
        flags |= MsFlags::MS_NODIRATIME;
    }
    flags
}

impl MountOps for LinuxHal {
    fn ensure_mount_point(&self, mount_point: &Path) -> HalResult<()> {
        match fs::DirBuilder::new().mode(0o755).create(mount_point) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            Err(err) => Err(HalError::Io(err)),
        }
    }

    fn mount_device(
        &self,
        device: &Path,
        target: &Path,
        fstype: &str,
        options: MountOptions,
    ) -> HalResult<()> {
        log::debug!(
            "mount {} -> {} ({}, {:?})",
            device.display(),
            target.display(),
            fstype,
            options
        );
        nix::mount::mount(
            Some(device),
            target,
            Some(fstype),
            ms_flags(options),
            None::<&str>,
        )
        .map_err(map_nix_err)
    }

    fn unmount(&self, target: &Path) -> HalResult<()> {
        nix::mount::umount2(target, nix::mount::MntFlags::empty()).map_err(map_nix_err)
    }

    fn mounted_volumes(&self) -> HalResult<Vec<MountedVolume>> {
        let content = fs::read_to_string(&self.paths.mountinfo)?;
        Ok(parse_mountinfo(&content))
    }
}

impl FormatOps for LinuxHal {
    fn make_ext4fs(&self, device: &Path, size: Ext4Size) -> HalResult<()> {
        let bytes = match size {
            Ext4Size::Full => None,
            Ext4Size::Exact(n) => Some(n),
            Ext4Size::Reserve(_) => size.resolve(crate::sysfs::block::device_size_bytes(
                &self.paths.sys_class_block,
                device,
            )?),
        };

        let mut args: Vec<String> = vec!["-t".into(), "ext4".into(), "-F".into()];
        args.push(device.display().to_string());
        if let Some(bytes) = bytes {
            if bytes < 1024 {
                return Err(HalError::NoSpace(device.display().to_string()));
            }
            args.push(format!("{}k", bytes / 1024));
        }

        log::info!("mke2fs {} ({})", device.display(), size);
        let mut cmd = Command::new(MKE2FS);
        cmd.args(&args);
        let output = output_with_timeout(MKE2FS, &mut cmd, FORMAT_TIMEOUT)?;
        if !output.status.success() {
            return Err(output_failed(MKE2FS, &output));
        }
        Ok(())
    }
}

impl MtdOps for LinuxHal {
    fn scan_mtd_partitions(&self) -> HalResult<Vec<MtdPartition>> {
        let content = fs::read_to_string(&self.paths.proc_mtd)?;
        Ok(parse_proc_mtd(&content))
    }

    fn open_mtd_writer<'a>(
        &'a self,
        partition: &MtdPartition,
    ) -> HalResult<Box<dyn MtdWriter + 'a>> {
        let node = crate::path::mtd_char_device(&self.paths.mtd_char_dir, partition.index);
        Ok(Box::new(LinuxMtdWriter::open(&node, partition)?))
    }

    fn mount_mtd_partition(
        &self,
        partition: &MtdPartition,
        target: &Path,
        fstype: &str,
        read_only: bool,
    ) -> HalResult<()> {
        let block = crate::path::mtd_block_device(&self.paths.mtd_block_dir, partition.index);
        self.mount_device(
            &block,
            target,
            fstype,
            MountOptions::updater_default().read_only(read_only),
        )
    }
}

impl UbiOps for LinuxHal {
    fn open_ubi_control<'a>(&'a self) -> HalResult<Box<dyn UbiControl + 'a>> {
        Ok(Box::new(LinuxUbiControl::open(&self.paths)?))
    }
}

impl ProcessOps for LinuxHal {
    fn run_program(&self, argv: &[String]) -> HalResult<i32> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| HalError::Other("empty argv".to_string()))?;
        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|e| map_command_err(program, e))?;
        Ok(status.into_raw())
    }

    fn command_output(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> HalResult<Output> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        output_with_timeout(program, &mut cmd, timeout)
    }

    fn command_status(&self, program: &str, args: &[&str], timeout: Duration) -> HalResult<()> {
        let output = self.command_output(program, args, timeout)?;
        if !output.status.success() {
            return Err(output_failed(program, &output));
        }
        Ok(())
    }
}

impl PropertyOps for LinuxHal {
    fn property(&self, key: &str) -> HalResult<Option<String>> {
        for file in &self.paths.prop_files {
            let content = match fs::read_to_string(file) {
                Ok(content) => content,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(HalError::Io(err)),
            };
            match crate::propfile::find_property(&content, key) {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => {}
                Err(bad) => log::warn!("{}: skipping malformed line {:?}", file.display(), bad.0),
            }
        }
        Ok(None)
    }
}
