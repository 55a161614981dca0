//! Fake HAL implementation for testing.
//!
//! This implementation records all operations without executing them,
//! allowing for CI-safe testing without root privileges or flash hardware.
//! Individual operations can be made to fail with [`FakeHal::fail_on`].

use super::{
    AttachRequest, Ext4Size, FormatOps, MkVolRequest, MountOps, MountOptions, MtdOps, MtdWriter,
    ProcessOps, PropertyOps, UbiControl, UbiDeviceInfo, UbiInfo, UbiNode, UbiOps, UBI_NUM_AUTO,
};
use crate::procfs::mountinfo::{find_by_mount_point, MountedVolume};
use crate::procfs::mtd::MtdPartition;
use crate::{HalError, HalResult};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Operation records for testing and verification.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    EnsureMountPoint {
        path: PathBuf,
    },
    Mount {
        device: PathBuf,
        target: PathBuf,
        fstype: String,
        options: MountOptions,
    },
    Unmount {
        target: PathBuf,
    },
    MakeExt4 {
        device: PathBuf,
        size: Ext4Size,
    },
    MtdScan,
    MtdOpen {
        name: String,
    },
    MtdWrite {
        name: String,
        len: usize,
        accepted: usize,
    },
    MtdEraseRemaining {
        name: String,
    },
    MtdClose {
        name: String,
    },
    MountMtd {
        name: String,
        target: PathBuf,
        fstype: String,
        read_only: bool,
    },
    UbiOpen,
    UbiClose,
    UbiAttach {
        mtd_num: u32,
        dev_num: u32,
    },
    UbiDetach {
        mtd_num: u32,
    },
    UbiRemove {
        dev_num: u32,
    },
    UbiProbe {
        node: PathBuf,
    },
    UbiDeviceInfo {
        dev_num: u32,
    },
    UbiMkVol {
        dev_num: u32,
        name: String,
        bytes: u64,
    },
    RunProgram {
        argv: Vec<String>,
    },
    Command {
        program: String,
        args: Vec<String>,
        timeout_secs: u64,
    },
}

/// Operations that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    EnsureMountPoint,
    Mount,
    Unmount,
    MakeExt4,
    MtdScan,
    MtdOpen,
    MtdEraseRemaining,
    MtdClose,
    UbiOpen,
    UbiAttach,
    UbiDetach,
    UbiDeviceInfo,
    UbiMkVol,
    Spawn,
    Command,
}

/// Shared state for FakeHal operations.
#[derive(Debug, Default)]
struct FakeHalState {
    /// All operations that were recorded
    operations: Vec<Operation>,
    fail_points: HashSet<FailPoint>,
    /// Mount table, oldest first
    mounted: Vec<MountedVolume>,
    mtd_partitions: Vec<MtdPartition>,
    /// Bytes written to each MTD partition since it was last opened
    mtd_contents: HashMap<String, Vec<u8>>,
    /// Total bytes a writer accepts before reporting a short write
    short_write_limit: Option<usize>,
    ubi_ctrl_major: Option<u64>,
    /// UBI device number -> attached MTD number
    ubi_attached: BTreeMap<u32, u32>,
    ubi_volumes: Vec<(u32, MkVolRequest)>,
    ubi_nodes: HashMap<PathBuf, UbiNode>,
    properties: HashMap<String, String>,
    program_status: i32,
}

/// Fake HAL implementation that records operations without executing them.
///
/// This is designed for testing and CI environments where real system
/// operations would fail or be dangerous.
#[derive(Debug, Clone)]
pub struct FakeHal {
    state: Arc<Mutex<FakeHalState>>,
}

impl Default for FakeHal {
    fn default() -> Self {
        Self::new()
    }
}

fn injected(point: FailPoint) -> HalError {
    HalError::Other(format!("injected failure: {:?}", point))
}

impl FakeHal {
    pub fn new() -> Self {
        let state = FakeHalState {
            ubi_ctrl_major: Some(10),
            ..FakeHalState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeHalState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<Operation> {
        self.state().operations.clone()
    }

    /// Get the number of operations recorded.
    pub fn operation_count(&self) -> usize {
        self.state().operations.len()
    }

    /// Check if a specific operation was recorded.
    pub fn has_operation(&self, check: impl Fn(&Operation) -> bool) -> bool {
        self.state().operations.iter().any(check)
    }

    /// Clear recorded operations; simulated device state is kept.
    pub fn clear(&self) {
        self.state().operations.clear();
    }

    /// Make every later call of `point` fail.
    pub fn fail_on(&self, point: FailPoint) -> &Self {
        self.state().fail_points.insert(point);
        self
    }

    pub fn with_mtd_partition(&self, index: u32, name: &str, size: u64, erase_size: u32) -> &Self {
        self.state().mtd_partitions.push(MtdPartition {
            index,
            size,
            erase_size,
            name: name.to_string(),
        });
        self
    }

    /// Pre-populate the mount table.
    pub fn with_mounted(&self, device: &str, mount_point: &Path, filesystem: &str) -> &Self {
        self.state().mounted.push(MountedVolume {
            device: device.to_string(),
            mount_point: mount_point.to_path_buf(),
            filesystem: filesystem.to_string(),
        });
        self
    }

    pub fn with_property(&self, key: &str, value: &str) -> &Self {
        self.state()
            .properties
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Make `node` resolve to a UBI device or volume in `probe_node`.
    pub fn with_ubi_node(&self, node: &Path, kind: UbiNode) -> &Self {
        self.state().ubi_nodes.insert(node.to_path_buf(), kind);
        self
    }

    /// Pretend UBI device `dev_num` is already attached to `mtd_num`.
    pub fn with_ubi_attached(&self, dev_num: u32, mtd_num: u32) -> &Self {
        self.state().ubi_attached.insert(dev_num, mtd_num);
        self
    }

    pub fn set_ubi_ctrl_major(&self, major: Option<u64>) -> &Self {
        self.state().ubi_ctrl_major = major;
        self
    }

    /// Writers accept at most `limit` bytes in total.
    pub fn set_short_write_limit(&self, limit: usize) -> &Self {
        self.state().short_write_limit = Some(limit);
        self
    }

    /// Raw wait status returned by `run_program`.
    pub fn set_program_status(&self, status: i32) -> &Self {
        self.state().program_status = status;
        self
    }

    pub fn mtd_contents(&self, name: &str) -> Option<Vec<u8>> {
        self.state().mtd_contents.get(name).cloned()
    }

    /// `(dev_num, mtd_num)` for every attached UBI device.
    pub fn ubi_attached_devices(&self) -> Vec<(u32, u32)> {
        self.state()
            .ubi_attached
            .iter()
            .map(|(dev, mtd)| (*dev, *mtd))
            .collect()
    }

    pub fn ubi_volumes(&self) -> Vec<(u32, MkVolRequest)> {
        self.state().ubi_volumes.clone()
    }

    pub fn is_mounted(&self, target: &Path) -> bool {
        let state = self.state();
        find_by_mount_point(target, &state.mounted).is_some()
    }

    fn record_operation(&self, op: Operation) {
        self.state().operations.push(op);
    }

    fn check(&self, point: FailPoint) -> HalResult<()> {
        if self.state().fail_points.contains(&point) {
            return Err(injected(point));
        }
        Ok(())
    }
}

impl MountOps for FakeHal {
    fn ensure_mount_point(&self, mount_point: &Path) -> HalResult<()> {
        self.record_operation(Operation::EnsureMountPoint {
            path: mount_point.to_path_buf(),
        });
        self.check(FailPoint::EnsureMountPoint)
    }

    fn mount_device(
        &self,
        device: &Path,
        target: &Path,
        fstype: &str,
        options: MountOptions,
    ) -> HalResult<()> {
        self.record_operation(Operation::Mount {
            device: device.to_path_buf(),
            target: target.to_path_buf(),
            fstype: fstype.to_string(),
            options,
        });
        self.check(FailPoint::Mount)?;
        self.with_mounted(&device.display().to_string(), target, fstype);
        Ok(())
    }

    fn unmount(&self, target: &Path) -> HalResult<()> {
        self.record_operation(Operation::Unmount {
            target: target.to_path_buf(),
        });
        self.check(FailPoint::Unmount)?;
        let mut state = self.state();
        match state.mounted.iter().rposition(|v| v.mount_point == target) {
            Some(idx) => {
                state.mounted.remove(idx);
                Ok(())
            }
            None => Err(HalError::Nix(nix::errno::Errno::EINVAL)),
        }
    }

    fn mounted_volumes(&self) -> HalResult<Vec<MountedVolume>> {
        Ok(self.state().mounted.clone())
    }
}

impl FormatOps for FakeHal {
    fn make_ext4fs(&self, device: &Path, size: Ext4Size) -> HalResult<()> {
        self.record_operation(Operation::MakeExt4 {
            device: device.to_path_buf(),
            size,
        });
        self.check(FailPoint::MakeExt4)
    }
}

struct FakeMtdWriter {
    hal: FakeHal,
    name: String,
    capacity: usize,
    written: usize,
}

impl MtdWriter for FakeMtdWriter {
    fn write_data(&mut self, data: &[u8]) -> HalResult<usize> {
        let mut state = self.hal.state();
        let limit = state
            .short_write_limit
            .map_or(self.capacity, |l| l.min(self.capacity));
        let accepted = data.len().min(limit.saturating_sub(self.written));
        state
            .mtd_contents
            .entry(self.name.clone())
            .or_default()
            .extend_from_slice(&data[..accepted]);
        state.operations.push(Operation::MtdWrite {
            name: self.name.clone(),
            len: data.len(),
            accepted,
        });
        self.written += accepted;
        Ok(accepted)
    }

    fn erase_remaining(&mut self) -> HalResult<()> {
        self.hal.record_operation(Operation::MtdEraseRemaining {
            name: self.name.clone(),
        });
        self.hal.check(FailPoint::MtdEraseRemaining)
    }

    fn close(self: Box<Self>) -> HalResult<()> {
        self.hal.record_operation(Operation::MtdClose {
            name: self.name.clone(),
        });
        self.hal.check(FailPoint::MtdClose)
    }
}

impl MtdOps for FakeHal {
    fn scan_mtd_partitions(&self) -> HalResult<Vec<MtdPartition>> {
        self.record_operation(Operation::MtdScan);
        self.check(FailPoint::MtdScan)?;
        Ok(self.state().mtd_partitions.clone())
    }

    fn open_mtd_writer<'a>(
        &'a self,
        partition: &MtdPartition,
    ) -> HalResult<Box<dyn MtdWriter + 'a>> {
        self.record_operation(Operation::MtdOpen {
            name: partition.name.clone(),
        });
        self.check(FailPoint::MtdOpen)?;
        self.state()
            .mtd_contents
            .insert(partition.name.clone(), Vec::new());
        Ok(Box::new(FakeMtdWriter {
            hal: self.clone(),
            name: partition.name.clone(),
            capacity: partition.size as usize,
            written: 0,
        }))
    }

    fn mount_mtd_partition(
        &self,
        partition: &MtdPartition,
        target: &Path,
        fstype: &str,
        read_only: bool,
    ) -> HalResult<()> {
        self.record_operation(Operation::MountMtd {
            name: partition.name.clone(),
            target: target.to_path_buf(),
            fstype: fstype.to_string(),
            read_only,
        });
        self.check(FailPoint::Mount)?;
        let device = crate::path::mtd_block_device(Path::new("/dev/block"), partition.index);
        self.with_mounted(&device.display().to_string(), target, fstype);
        Ok(())
    }
}

struct FakeUbiControl {
    hal: FakeHal,
}

impl Drop for FakeUbiControl {
    fn drop(&mut self) {
        self.hal.record_operation(Operation::UbiClose);
    }
}

impl UbiControl for FakeUbiControl {
    fn info(&self) -> HalResult<UbiInfo> {
        Ok(UbiInfo {
            ctrl_major: self.hal.state().ubi_ctrl_major,
        })
    }

    fn attach(&mut self, req: &AttachRequest) -> HalResult<u32> {
        self.hal.check(FailPoint::UbiAttach)?;
        let mut state = self.hal.state();
        if state.ubi_attached.values().any(|mtd| *mtd == req.mtd_num) {
            return Err(HalError::Nix(nix::errno::Errno::EEXIST));
        }
        let dev_num = if req.dev_num == UBI_NUM_AUTO {
            (0..).find(|n| !state.ubi_attached.contains_key(n)).unwrap_or(0)
        } else {
            req.dev_num as u32
        };
        state.ubi_attached.insert(dev_num, req.mtd_num);
        state
            .ubi_nodes
            .insert(crate::path::ubi_device_node(dev_num), UbiNode::Device { dev_num });
        state.operations.push(Operation::UbiAttach {
            mtd_num: req.mtd_num,
            dev_num,
        });
        Ok(dev_num)
    }

    fn detach_mtd(&mut self, mtd_num: u32) -> HalResult<()> {
        self.hal.record_operation(Operation::UbiDetach { mtd_num });
        self.hal.check(FailPoint::UbiDetach)?;
        let mut state = self.hal.state();
        let dev_num = state
            .ubi_attached
            .iter()
            .find(|(_, mtd)| **mtd == mtd_num)
            .map(|(dev, _)| *dev)
            .ok_or_else(|| HalError::NotFound(format!("UBI device for mtd{}", mtd_num)))?;
        state.ubi_attached.remove(&dev_num);
        Ok(())
    }

    fn remove_device(&mut self, dev_num: u32) -> HalResult<()> {
        self.hal.record_operation(Operation::UbiRemove { dev_num });
        self.hal.check(FailPoint::UbiDetach)?;
        match self.hal.state().ubi_attached.remove(&dev_num) {
            Some(_) => Ok(()),
            None => Err(HalError::NotFound(format!("UBI device {}", dev_num))),
        }
    }

    fn probe_node(&self, node: &Path) -> HalResult<UbiNode> {
        self.hal.record_operation(Operation::UbiProbe {
            node: node.to_path_buf(),
        });
        self.hal
            .state()
            .ubi_nodes
            .get(node)
            .copied()
            .ok_or_else(|| HalError::NotFound(format!("{} is not a UBI node", node.display())))
    }

    fn device_info(&self, dev_num: u32) -> HalResult<UbiDeviceInfo> {
        self.hal.record_operation(Operation::UbiDeviceInfo { dev_num });
        self.hal.check(FailPoint::UbiDeviceInfo)?;
        let state = self.hal.state();
        let mtd_num = *state
            .ubi_attached
            .get(&dev_num)
            .ok_or_else(|| HalError::NotFound(format!("UBI device {}", dev_num)))?;
        let avail_bytes = state
            .mtd_partitions
            .iter()
            .find(|p| p.index == mtd_num)
            .map_or(0, |p| p.size);
        Ok(UbiDeviceInfo {
            dev_num,
            mtd_num,
            avail_bytes,
        })
    }

    fn make_volume(&mut self, dev_num: u32, req: &MkVolRequest) -> HalResult<u32> {
        self.hal.record_operation(Operation::UbiMkVol {
            dev_num,
            name: req.name.clone(),
            bytes: req.bytes,
        });
        self.hal.check(FailPoint::UbiMkVol)?;
        let mut state = self.hal.state();
        let vol_id = state
            .ubi_volumes
            .iter()
            .filter(|(dev, _)| *dev == dev_num)
            .count() as u32;
        state.ubi_volumes.push((dev_num, req.clone()));
        state.ubi_nodes.insert(
            PathBuf::from(format!("/dev/ubi{}_{}", dev_num, vol_id)),
            UbiNode::Volume { dev_num, vol_id },
        );
        Ok(vol_id)
    }
}

impl UbiOps for FakeHal {
    fn open_ubi_control<'a>(&'a self) -> HalResult<Box<dyn UbiControl + 'a>> {
        self.check(FailPoint::UbiOpen)?;
        self.record_operation(Operation::UbiOpen);
        Ok(Box::new(FakeUbiControl { hal: self.clone() }))
    }
}

impl ProcessOps for FakeHal {
    fn run_program(&self, argv: &[String]) -> HalResult<i32> {
        self.record_operation(Operation::RunProgram {
            argv: argv.to_vec(),
        });
        if self.state().fail_points.contains(&FailPoint::Spawn) {
            let program = argv.first().cloned().unwrap_or_default();
            return Err(HalError::CommandNotFound(program));
        }
        Ok(self.state().program_status)
    }

    fn command_output(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> HalResult<Output> {
        self.record_operation(Operation::Command {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            timeout_secs: timeout.as_secs(),
        });
        let failed = self.state().fail_points.contains(&FailPoint::Command);
        Ok(Output {
            status: ExitStatus::from_raw(if failed { 1 << 8 } else { 0 }),
            stdout: Vec::new(),
            stderr: Vec::new(),
        })
    }

    fn command_status(&self, program: &str, args: &[&str], timeout: Duration) -> HalResult<()> {
        let output = self.command_output(program, args, timeout)?;
        if !output.status.success() {
            return Err(HalError::CommandFailed {
                program: program.to_string(),
                code: output.status.code(),
                stderr: String::new(),
            });
        }
        Ok(())
    }
}

impl PropertyOps for FakeHal {
    fn property(&self, key: &str) -> HalResult<Option<String>> {
        Ok(self.state().properties.get(key).cloned())
    }
}
