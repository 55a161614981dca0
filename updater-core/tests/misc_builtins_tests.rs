mod common;

use common::{lits, Harness};
use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use updater_core::{Expr, Value};
use updater_hal::{FailPoint, Operation};

#[test]
fn ui_print_concatenates_and_prints_each_line() {
    let mut h = Harness::new();
    let result = h
        .call("ui_print", &["Installing ", "system\nplease wait", "\n"])
        .expect("ui_print");

    assert_eq!(result, Value::string("Installing system\nplease wait\n"));
    assert_eq!(
        h.lines(),
        vec!["ui_print Installing system", "ui_print please wait", "ui_print"]
    );
}

#[test]
fn progress_builtins_write_commands() {
    let mut h = Harness::new();
    assert_eq!(
        h.call("show_progress", &["0.5", "10"]).expect("show_progress"),
        Value::string("0.5")
    );
    assert_eq!(
        h.call("set_progress", &["0.25"]).expect("set_progress"),
        Value::string("0.25")
    );
    h.call("show_progress", &["junk", "junk"])
        .expect("lenient numbers");

    assert_eq!(
        h.lines(),
        vec![
            "progress 0.500000 10",
            "set_progress 0.250000",
            "progress 0.000000 0",
        ]
    );
    assert_eq!(
        h.abort_message("show_progress", &["0.5"]),
        "show_progress() expects 2 args, got 1"
    );
}

#[test]
fn wipe_cache_takes_no_arguments() {
    let mut h = Harness::new();
    assert_eq!(h.call("wipe_cache", &[]).expect("wipe"), Value::bool(true));
    assert_eq!(h.lines(), vec!["wipe_cache"]);
    assert_eq!(
        h.abort_message("wipe_cache", &["now"]),
        "wipe_cache() expects no args, got 1"
    );
}

#[test]
fn delete_counts_removed_paths() {
    let mut h = Harness::new();
    let (a, b, missing) = (h.path_str("a"), h.path_str("b"), h.path_str("missing"));
    fs::write(&a, b"a").expect("write a");
    fs::write(&b, b"b").expect("write b");
    let dir = h.path_str("dir");
    fs::create_dir_all(h.path("dir/sub")).expect("mkdir");
    fs::write(h.path("dir/sub/file"), b"x").expect("write nested");

    assert_eq!(
        h.call("delete", &[a.as_str(), missing.as_str(), dir.as_str(), b.as_str()])
            .expect("delete"),
        Value::string("2")
    );
    assert!(h.path("dir/sub/file").exists());

    assert_eq!(
        h.call("delete_recursive", &[dir.as_str(), missing.as_str()])
            .expect("delete_recursive"),
        Value::string("1")
    );
    assert!(!h.path("dir").exists());
}

#[test]
fn symlink_replaces_existing_sources() {
    let mut h = Harness::new();
    let (sh, ls) = (h.path_str("sh"), h.path_str("ls"));
    fs::write(&sh, b"old file").expect("write existing");

    let result = h
        .call("symlink", &["toolbox", sh.as_str(), ls.as_str()])
        .expect("symlink");

    assert_eq!(result, Value::empty());
    for link in [&sh, &ls] {
        assert_eq!(
            fs::read_link(link).expect("read link").display().to_string(),
            "toolbox"
        );
    }
    assert_eq!(
        h.abort_message("symlink", &[]),
        "symlink() expects 1+ args, got 0"
    );
}

#[test]
fn set_perm_applies_mode_and_owner() {
    let mut h = Harness::new();
    let file = h.path_str("file");
    fs::write(&file, b"x").expect("write file");
    let meta = fs::metadata(&file).expect("stat");
    let (uid, gid) = (meta.uid().to_string(), meta.gid().to_string());

    h.call("set_perm", &[uid.as_str(), gid.as_str(), "0640", file.as_str()])
        .expect("set_perm");
    let mode = fs::metadata(&file).expect("stat").permissions().mode();
    assert_eq!(mode & 0o777, 0o640);

    h.call("set_perm", &[uid.as_str(), gid.as_str(), "0x1ed", file.as_str()])
        .expect("set_perm hex");
    let mode = fs::metadata(&file).expect("stat").permissions().mode();
    assert_eq!(mode & 0o777, 0o755);
}

#[test]
fn set_perm_recursive_separates_dirs_and_files() {
    let mut h = Harness::new();
    fs::create_dir_all(h.path("tree/sub")).expect("mkdir");
    fs::write(h.path("tree/sub/file"), b"x").expect("write file");
    fs::write(h.path("tree/top"), b"y").expect("write file");
    let meta = fs::metadata(h.path("tree")).expect("stat");
    let (uid, gid) = (meta.uid().to_string(), meta.gid().to_string());
    let root = h.path_str("tree");

    h.call(
        "set_perm_recursive",
        &[uid.as_str(), gid.as_str(), "0750", "0600", root.as_str()],
    )
    .expect("set_perm_recursive");

    let mode = |rel: &str| fs::metadata(h.path(rel)).expect("stat").permissions().mode() & 0o777;
    assert_eq!(mode("tree"), 0o750);
    assert_eq!(mode("tree/sub"), 0o750);
    assert_eq!(mode("tree/sub/file"), 0o600);
    assert_eq!(mode("tree/top"), 0o600);
}

#[test]
fn set_perm_rejects_bad_numbers_and_arity() {
    let mut h = Harness::new();
    assert_eq!(
        h.abort_message("set_perm", &["root", "0", "0644", "/x"]),
        "set_perm: \"root\" not a valid uid"
    );
    assert_eq!(
        h.abort_message("set_perm", &["0", "0", "rw", "/x"]),
        "set_perm: \"rw\" not a valid mode"
    );
    assert_eq!(
        h.abort_message("set_perm_recursive", &["0", "0", "0755", "0x", "/x"]),
        "set_perm_recursive: \"0x\" not a valid filemode"
    );
    assert_eq!(
        h.abort_message("set_perm", &["0", "0", "0644"]),
        "set_perm() expects 4+ args, got 3"
    );
    assert_eq!(
        h.abort_message("set_perm_recursive", &["0", "0", "0755", "0644"]),
        "set_perm_recursive() expects 5+ args, got 4"
    );
}

#[test]
fn file_getprop_reads_prop_files() {
    let mut h = Harness::new();
    let props = h.path_str("build.prop");
    fs::write(
        &props,
        "# generated\n\nro.product.device = tuna\nro.build.id=GRJ22\n",
    )
    .expect("write props");

    assert_eq!(
        h.call("file_getprop", &[props.as_str(), "ro.product.device"])
            .expect("getprop"),
        Value::string("tuna")
    );
    assert_eq!(
        h.call("file_getprop", &[props.as_str(), "ro.secure"])
            .expect("getprop"),
        Value::empty()
    );
}

#[test]
fn file_getprop_aborts_on_unusable_files() {
    let mut h = Harness::new();

    let missing = h.path_str("missing.prop");
    let message = h.abort_message("file_getprop", &[missing.as_str(), "k"]);
    assert!(
        message.starts_with(&format!("file_getprop: failed to stat \"{}\"", missing)),
        "{}",
        message
    );

    let big = h.path_str("big.prop");
    fs::write(&big, vec![b'#'; 65537]).expect("write big");
    assert_eq!(
        h.abort_message("file_getprop", &[big.as_str(), "k"]),
        format!("{} too large for file_getprop (max 65536)", big)
    );

    let bad = h.path_str("bad.prop");
    fs::write(&bad, "not a prop\nk=v\n").expect("write bad");
    assert_eq!(
        h.abort_message("file_getprop", &[bad.as_str(), "k"]),
        format!(
            "file_getprop: malformed line \"not a prop\": {} not a prop file?",
            bad
        )
    );
}

#[test]
fn getprop_reads_system_properties() {
    let mut h = Harness::new();
    h.hal.with_property("ro.bootloader", "I9000XXJPY");

    assert_eq!(
        h.call("getprop", &["ro.bootloader"]).expect("getprop"),
        Value::string("I9000XXJPY")
    );
    assert_eq!(
        h.call("getprop", &["ro.unset"]).expect("getprop"),
        Value::empty()
    );
}

#[test]
fn is_file_exist_returns_path_or_empty() {
    let mut h = Harness::new();
    let present = h.path_str("present");
    fs::write(&present, b"").expect("write file");
    let missing = h.path_str("missing");

    assert_eq!(
        h.call("is_file_exist", &[present.as_str()]).expect("exists"),
        Value::string(present)
    );
    assert_eq!(
        h.call("is_file_exist", &[missing.as_str()]).expect("exists"),
        Value::empty()
    );
}

#[test]
fn run_program_returns_wait_status() {
    let mut h = Harness::new();
    h.hal.set_program_status(3 << 8);

    assert_eq!(
        h.call("run_program", &["/sbin/busybox", "true"])
            .expect("run_program"),
        Value::string("768")
    );
    assert!(h.hal.has_operation(|op| matches!(
        op,
        Operation::RunProgram { argv } if argv == &["/sbin/busybox", "true"]
    )));

    h.hal.fail_on(FailPoint::Spawn);
    assert_eq!(
        h.call("run_program", &["/missing"]).expect("run_program"),
        Value::string("256")
    );
    assert_eq!(
        h.abort_message("run_program", &[]),
        "run_program() expects at least 1 arg"
    );
}

#[test]
fn set_bootloader_env_runs_fw_setenv() {
    let mut h = Harness::new();

    assert_eq!(
        h.call("set_bootloader_env", &["bootcmd", "run nandboot"])
            .expect("setenv"),
        Value::string("bootcmd")
    );
    assert_eq!(
        h.hal.operations(),
        vec![Operation::Command {
            program: "fw_setenv".to_string(),
            args: vec!["bootcmd".to_string(), "run nandboot".to_string()],
            timeout_secs: 600,
        }]
    );

    h.hal.fail_on(FailPoint::Command);
    assert_eq!(
        h.call("set_bootloader_env", &["bootcmd", "x"]).expect("setenv"),
        Value::empty()
    );
}

#[test]
fn set_bootloader_env_rejects_empty_arguments() {
    let mut h = Harness::new();
    assert_eq!(
        h.abort_message("set_bootloader_env", &["bootcmd", ""]),
        "env_val argument to set_bootloader_env() can't be empty"
    );
    assert_eq!(
        h.abort_message("set_bootloader_env", &["", "x"]),
        "env_name argument to set_bootloader_env() can't be empty"
    );
    assert_eq!(h.hal.operation_count(), 0);
}

#[test]
fn arguments_are_evaluated_before_use() {
    let mut h = Harness::new();
    let expr = Expr::call(
        "ui_print",
        vec![
            Expr::lit("device: "),
            Expr::call("getprop", lits(&["ro.product.device"])),
        ],
    );
    h.hal.with_property("ro.product.device", "crespo");
    assert_eq!(h.eval(&expr).expect("ui_print"), Value::string("device: crespo"));
}
