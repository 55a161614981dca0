//! Builtin operation library for the recovery updater-script interpreter.
//!
//! A package script is an [`expr::Expr`] tree. Every call in it is looked up in
//! the [`registry::Registry`] and runs one of the [`builtins`] against an
//! [`state::ExecutionState`]. Device access goes through the
//! [`updater_hal::SystemHal`] traits, so everything here runs against
//! [`updater_hal::FakeHal`] in tests.

pub mod applypatch;
pub mod args;
pub mod builtins;
pub mod config;
pub mod errors;
pub mod expr;
pub mod logging;
pub mod package;
pub mod registry;
pub mod retouch;
pub mod script;
pub mod state;
pub mod ubi;
pub mod value;

pub use config::UpdaterConfig;
pub use errors::Abort;
pub use expr::{evaluate, Expr};
pub use package::PackageArchive;
pub use registry::Registry;
pub use script::{load_package_script, run_script, ScriptOutcome};
pub use state::{CommandSink, ExecutionState, SharedBuffer, UpdaterEnv, UpdaterInfo};
pub use value::{Value, ValueKind};
