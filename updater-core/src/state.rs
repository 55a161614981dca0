//! Execution state shared by all builtins during one script run.

use crate::applypatch::{FilePatchEngine, PatchEngine};
use crate::config::UpdaterConfig;
use crate::errors::Abort;
use crate::package::PackageArchive;
use crate::registry::Registry;
use crate::retouch::{FileRetoucher, Retoucher};
use crate::script::{JsonScriptLoader, ScriptLoader};
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use updater_hal::SystemHal;

/// Line-oriented command channel read by the recovery UI.
pub struct CommandSink {
    out: Box<dyn Write + Send>,
}

impl CommandSink {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self { out: Box::new(out) }
    }

    /// A sink that discards everything.
    pub fn discard() -> Self {
        Self::new(io::sink())
    }

    /// A sink whose output can be inspected through the returned buffer.
    pub fn buffer() -> (Self, SharedBuffer) {
        let buf = SharedBuffer::default();
        (Self::new(buf.clone()), buf)
    }

    fn emit(&mut self, line: fmt::Arguments<'_>) {
        let res = self
            .out
            .write_fmt(line)
            .and_then(|_| self.out.write_all(b"\n"))
            .and_then(|_| self.out.flush());
        if let Err(err) = res {
            log::warn!("command pipe write failed: {}", err);
        }
    }

    pub fn progress(&mut self, frac: f64, secs: i64) {
        self.emit(format_args!("progress {:.6} {}", frac, secs));
    }

    pub fn set_progress(&mut self, frac: f64) {
        self.emit(format_args!("set_progress {:.6}", frac));
    }

    /// One `ui_print` line; an empty `text` prints a blank line.
    pub fn ui_print(&mut self, text: &str) {
        if text.is_empty() {
            self.emit(format_args!("ui_print"));
        } else {
            self.emit(format_args!("ui_print {}", text));
        }
    }

    /// `ui_print` for every non-empty line of `text`, then a blank line.
    pub fn print_lines(&mut self, text: &str) {
        for line in text.split('\n').filter(|l| !l.is_empty()) {
            self.ui_print(line);
        }
        self.ui_print("");
    }

    pub fn wipe_cache(&mut self) {
        self.emit(format_args!("wipe_cache"));
    }
}

/// Cloneable in-memory writer used to capture sink output.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(|p| p.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Collaborators that outlive a single script: the device layer, the patch and
/// retouch engines, the script loader and the builtin table.
pub struct UpdaterEnv {
    pub hal: Arc<dyn SystemHal>,
    pub patcher: Arc<dyn PatchEngine>,
    pub retoucher: Arc<dyn Retoucher>,
    pub loader: Arc<dyn ScriptLoader>,
    pub registry: Arc<Registry>,
    pub config: UpdaterConfig,
}

impl UpdaterEnv {
    /// Default collaborators for `config` on top of `hal`.
    pub fn new(hal: Arc<dyn SystemHal>, config: UpdaterConfig) -> Self {
        Self {
            hal,
            patcher: Arc::new(FilePatchEngine::new(config.cache_dir.clone())),
            retoucher: Arc::new(FileRetoucher),
            loader: Arc::new(JsonScriptLoader),
            registry: Arc::new(Registry::with_builtins()),
            config,
        }
    }

    pub fn with_patcher(mut self, patcher: Arc<dyn PatchEngine>) -> Self {
        self.patcher = patcher;
        self
    }

    pub fn with_retoucher(mut self, retoucher: Arc<dyn Retoucher>) -> Self {
        self.retoucher = retoucher;
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn ScriptLoader>) -> Self {
        self.loader = loader;
        self
    }
}

/// Per-script context: the open package and the command sink, borrowed for the
/// duration of the script.
pub struct UpdaterInfo<'a> {
    pub package: &'a mut PackageArchive,
    pub cmd: &'a mut CommandSink,
    pub env: &'a UpdaterEnv,
}

pub struct ExecutionState<'a> {
    pub info: UpdaterInfo<'a>,
    errmsg: Option<String>,
}

impl<'a> ExecutionState<'a> {
    pub fn new(info: UpdaterInfo<'a>) -> Self {
        Self { info, errmsg: None }
    }

    /// Record `message` and build the abort that carries it.
    pub fn error_abort(&mut self, message: impl Into<String>) -> Abort {
        let abort = Abort::new(message);
        self.errmsg = Some(abort.message.clone());
        abort
    }

    /// Record `message` without aborting.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errmsg = Some(message.into());
    }

    pub fn errmsg(&self) -> Option<&str> {
        self.errmsg.as_deref()
    }

    pub fn take_errmsg(&mut self) -> Option<String> {
        self.errmsg.take()
    }

    pub fn env(&self) -> &'a UpdaterEnv {
        self.info.env
    }

    pub fn hal(&self) -> &'a dyn SystemHal {
        self.info.env.hal.as_ref()
    }

    pub fn config(&self) -> &'a UpdaterConfig {
        &self.info.env.config
    }

    pub fn cmd(&mut self) -> &mut CommandSink {
        &mut *self.info.cmd
    }
}
