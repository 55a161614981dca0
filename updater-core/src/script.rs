//! Loading a package's script and running it to completion.

use crate::errors::{PackageError, ScriptError};
use crate::expr::{evaluate, Expr};
use crate::package::PackageArchive;
use crate::state::{CommandSink, ExecutionState, UpdaterEnv, UpdaterInfo};
use crate::value::Value;

/// Exit status reported when the script aborts.
pub const EXIT_SCRIPT_ABORTED: i32 = 7;

/// Turns the bytes of a package's script entry into an expression tree.
pub trait ScriptLoader: Send + Sync {
    fn load(&self, source: &[u8]) -> Result<Expr, ScriptError>;
}

/// Loads scripts compiled to the JSON form of [`Expr`].
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonScriptLoader;

impl ScriptLoader for JsonScriptLoader {
    fn load(&self, source: &[u8]) -> Result<Expr, ScriptError> {
        Ok(serde_json::from_slice(source)?)
    }
}

/// Read the configured script entry from `package` and parse it.
pub fn load_package_script(
    env: &UpdaterEnv,
    package: &mut PackageArchive,
) -> Result<Expr, ScriptError> {
    let entry = &env.config.script_entry;
    let source = package.read_entry(entry).map_err(|err| match err {
        PackageError::MissingEntry(_) => ScriptError::MissingScript {
            entry: entry.clone(),
            package: package.path().to_path_buf(),
        },
        other => other.into(),
    })?;
    env.loader.load(&source)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOutcome {
    Finished(Value),
    Aborted(String),
}

impl ScriptOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            ScriptOutcome::Finished(_) => 0,
            ScriptOutcome::Aborted(_) => EXIT_SCRIPT_ABORTED,
        }
    }
}

/// Evaluate `root` with a fresh execution state. An abort is logged and its
/// message printed to the command pipe.
pub fn run_script(
    env: &UpdaterEnv,
    package: &mut PackageArchive,
    cmd: &mut CommandSink,
    root: &Expr,
) -> ScriptOutcome {
    let mut state = ExecutionState::new(UpdaterInfo { package, cmd, env });
    match evaluate(&mut state, root) {
        Ok(value) => {
            log::info!("script result was [{}]", value);
            ScriptOutcome::Finished(value)
        }
        Err(abort) => {
            let message = state.take_errmsg().unwrap_or(abort.message);
            log::error!("script aborted: {}", message);
            state.cmd().print_lines(&message);
            ScriptOutcome::Aborted(message)
        }
    }
}
