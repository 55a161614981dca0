#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use updater_core::{
    evaluate, Abort, CommandSink, ExecutionState, Expr, PackageArchive, SharedBuffer,
    UpdaterConfig, UpdaterEnv, UpdaterInfo, Value,
};
use updater_hal::{FakeHal, Operation};
use zip::write::FileOptions;
use zip::ZipWriter;

pub fn build_package(path: &Path, entries: &[(&str, &[u8])]) {
    let file = File::create(path).expect("create package");
    let mut zip = ZipWriter::new(file);
    for (name, data) in entries {
        zip.start_file(*name, FileOptions::default())
            .expect("start entry");
        zip.write_all(data).expect("write entry");
    }
    zip.finish().expect("finish package");
}

pub fn script_bytes(expr: &Expr) -> Vec<u8> {
    serde_json::to_vec(expr).expect("encode script")
}

pub fn lits(args: &[&str]) -> Vec<Expr> {
    args.iter().map(|a| Expr::lit(*a)).collect()
}

/// One package, one fake device layer and a captured command pipe.
pub struct Harness {
    pub dir: TempDir,
    pub hal: FakeHal,
    pub env: UpdaterEnv,
    pub package: PackageArchive,
    pub cmd: CommandSink,
    pub out: SharedBuffer,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_package(&[])
    }

    pub fn with_package(entries: &[(&str, &[u8])]) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let package_path = dir.path().join("update.zip");
        build_package(&package_path, entries);

        let hal = FakeHal::new();
        let config = UpdaterConfig {
            cache_dir: dir.path().join("cache"),
            ..UpdaterConfig::default()
        };
        let env = UpdaterEnv::new(Arc::new(hal.clone()), config);
        let package = PackageArchive::open(&package_path).expect("open package");
        let (cmd, out) = CommandSink::buffer();
        Self {
            dir,
            hal,
            env,
            package,
            cmd,
            out,
        }
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn path_str(&self, rel: &str) -> String {
        self.path(rel).display().to_string()
    }

    /// Evaluate `expr`; also returns the message left on the state.
    pub fn eval_with_errmsg(&mut self, expr: &Expr) -> (Result<Value, Abort>, Option<String>) {
        let mut state = ExecutionState::new(UpdaterInfo {
            package: &mut self.package,
            cmd: &mut self.cmd,
            env: &self.env,
        });
        let result = evaluate(&mut state, expr);
        (result, state.take_errmsg())
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Value, Abort> {
        self.eval_with_errmsg(expr).0
    }

    pub fn call(&mut self, name: &str, args: &[&str]) -> Result<Value, Abort> {
        self.eval(&Expr::call(name, lits(args)))
    }

    /// Abort message of a call that must abort.
    pub fn abort_message(&mut self, name: &str, args: &[&str]) -> String {
        match self.call(name, args) {
            Err(abort) => abort.message,
            Ok(value) => panic!("{}() returned {:?} instead of aborting", name, value),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.out.lines()
    }

    pub fn ops_matching(&self, keep: impl Fn(&Operation) -> bool) -> Vec<Operation> {
        self.hal.operations().into_iter().filter(|op| keep(op)).collect()
    }
}
