mod common;

use common::Harness;
use std::path::{Path, PathBuf};
use updater_core::Value;
use updater_hal::{FailPoint, MountOptions, Operation, UbiNode};

const LABELS: [&str; 4] = ["fs_type", "partition_type", "location", "mount_point"];

#[test]
fn mount_empty_argument_aborts_before_device_io() {
    for partition_type in ["MTD", "UBI", "EMMC"] {
        for (i, label) in LABELS.iter().enumerate() {
            let mut h = Harness::new();
            h.hal.with_mtd_partition(3, "system", 0x100_0000, 0x2_0000);
            let mut args = ["yaffs2", partition_type, "system", "/system"];
            args[i] = "";

            let message = h.abort_message("mount", &args);

            assert_eq!(
                message,
                format!("{} argument to mount() can't be empty", label)
            );
            assert_eq!(h.hal.operation_count(), 0, "{} / {}", partition_type, label);
        }
    }
}

#[test]
fn mount_wrong_arity_aborts() {
    let mut h = Harness::new();
    assert_eq!(
        h.abort_message("mount", &["ext4", "EMMC", "/dev/block/system"]),
        "mount() expects 4 args, got 3"
    );
}

#[test]
fn emmc_mount_of_missing_device_returns_empty() {
    let mut h = Harness::new();
    h.hal.fail_on(FailPoint::Mount);

    let result = h
        .call("mount", &["ext4", "EMMC", "/dev/block/system", "/system"])
        .expect("mount must not abort");
    assert_eq!(result, Value::empty());

    let mounted = h.call("is_mounted", &["/system"]).expect("is_mounted");
    assert_eq!(mounted, Value::empty());
}

#[test]
fn emmc_mount_uses_updater_flags() {
    let mut h = Harness::new();

    let result = h
        .call("mount", &["ext4", "EMMC", "/dev/block/system", "/system"])
        .expect("mount");

    assert_eq!(result, Value::string("/system"));
    assert_eq!(
        h.hal.operations(),
        vec![
            Operation::EnsureMountPoint {
                path: PathBuf::from("/system")
            },
            Operation::Mount {
                device: PathBuf::from("/dev/block/system"),
                target: PathBuf::from("/system"),
                fstype: "ext4".to_string(),
                options: MountOptions::updater_default(),
            },
        ]
    );
    assert_eq!(
        h.call("is_mounted", &["/system"]).expect("is_mounted"),
        Value::string("/system")
    );
}

#[test]
fn mtd_mount_resolves_partition_read_write() {
    let mut h = Harness::new();
    h.hal.with_mtd_partition(3, "system", 0x100_0000, 0x2_0000);

    let result = h
        .call("mount", &["yaffs2", "MTD", "system", "/system"])
        .expect("mount");

    assert_eq!(result, Value::string("/system"));
    assert!(h.hal.has_operation(|op| *op
        == Operation::MountMtd {
            name: "system".to_string(),
            target: PathBuf::from("/system"),
            fstype: "yaffs2".to_string(),
            read_only: false,
        }));
}

#[test]
fn mtd_mount_of_unknown_partition_returns_empty() {
    let mut h = Harness::new();
    h.hal.with_mtd_partition(3, "system", 0x100_0000, 0x2_0000);

    let result = h
        .call("mount", &["yaffs2", "MTD", "cache", "/cache"])
        .expect("mount");

    assert_eq!(result, Value::empty());
    assert!(!h.hal.has_operation(|op| matches!(op, Operation::MountMtd { .. })));
}

#[test]
fn ubi_mount_attaches_then_mounts_volume_node() {
    let mut h = Harness::new();
    h.hal.with_mtd_partition(5, "system", 0x100_0000, 0x2_0000);

    let result = h
        .call("mount", &["ubifs", "UBI", "system", "/system"])
        .expect("mount");

    assert_eq!(result, Value::string("/system"));
    assert_eq!(h.hal.ubi_attached_devices(), vec![(0, 5)]);
    assert!(h.hal.has_operation(|op| matches!(
        op,
        Operation::Mount { device, fstype, .. }
            if device == Path::new("/dev/ubi0_0") && fstype == "ubifs"
    )));
}

#[test]
fn ubi_mount_attach_failure_returns_empty() {
    let mut h = Harness::new();
    h.hal.with_mtd_partition(5, "system", 0x100_0000, 0x2_0000);
    h.hal.fail_on(FailPoint::UbiAttach);

    let result = h
        .call("mount", &["ubifs", "UBI", "system", "/system"])
        .expect("mount");

    assert_eq!(result, Value::empty());
    assert!(!h.hal.has_operation(|op| matches!(op, Operation::Mount { .. })));
}

#[test]
fn is_mounted_empty_argument_names_unmount() {
    let mut h = Harness::new();
    assert_eq!(
        h.abort_message("is_mounted", &[""]),
        "mount_point argument to unmount() can't be empty"
    );
    assert_eq!(
        h.abort_message("is_mounted", &["/a", "/b"]),
        "is_mounted() expects 1 arg, got 2"
    );
}

#[test]
fn unmount_of_ubifs_detaches_captured_device_after_unmount() {
    let mut h = Harness::new();
    h.hal
        .with_mounted("ubi0_0", Path::new("/system"), "ubifs")
        .with_ubi_attached(0, 5)
        .with_ubi_node(
            Path::new("/dev/ubi0_0"),
            UbiNode::Volume {
                dev_num: 0,
                vol_id: 0,
            },
        );

    let result = h.call("unmount", &["/system"]).expect("unmount");

    assert_eq!(result, Value::string("/system"));
    let ops = h.ops_matching(|op| {
        matches!(
            op,
            Operation::Unmount { .. } | Operation::UbiProbe { .. } | Operation::UbiRemove { .. }
        )
    });
    assert_eq!(
        ops,
        vec![
            Operation::Unmount {
                target: PathBuf::from("/system")
            },
            Operation::UbiProbe {
                node: PathBuf::from("/dev/ubi0_0")
            },
            Operation::UbiRemove { dev_num: 0 },
        ]
    );
    assert!(h.hal.ubi_attached_devices().is_empty());
    assert!(!h.hal.is_mounted(Path::new("/system")));
}

#[test]
fn unmount_reports_success_when_detach_fails() {
    let mut h = Harness::new();
    h.hal.with_mounted("ubi3_0", Path::new("/data"), "ubifs");

    let result = h.call("unmount", &["/data"]).expect("unmount");

    assert_eq!(result, Value::string("/data"));
    assert!(!h.hal.has_operation(|op| matches!(op, Operation::UbiRemove { .. })));
}

#[test]
fn unmount_failure_skips_detach() {
    let mut h = Harness::new();
    h.hal.with_mounted("ubi0_0", Path::new("/system"), "ubifs");
    h.hal.fail_on(FailPoint::Unmount);

    let result = h.call("unmount", &["/system"]).expect("unmount");

    assert_eq!(result, Value::empty());
    assert!(!h.hal.has_operation(|op| *op == Operation::UbiOpen));
}

#[test]
fn unmount_only_detaches_exact_ubifs() {
    let mut h = Harness::new();
    h.hal
        .with_mounted("/dev/block/mmcblk0p3", Path::new("/system"), "ext4")
        .with_mounted("ubi1_0", Path::new("/cache"), "UBIFS");

    assert_eq!(
        h.call("unmount", &["/system"]).expect("unmount"),
        Value::string("/system")
    );
    assert_eq!(
        h.call("unmount", &["/cache"]).expect("unmount"),
        Value::string("/cache")
    );
    assert!(!h.hal.has_operation(|op| *op == Operation::UbiOpen));
}

#[test]
fn unmount_of_unknown_mount_point_returns_empty() {
    let mut h = Harness::new();
    assert_eq!(
        h.call("unmount", &["/system"]).expect("unmount"),
        Value::empty()
    );
    assert!(!h.hal.has_operation(|op| matches!(op, Operation::Unmount { .. })));
}
