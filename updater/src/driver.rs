//! Top-level flow: check the interface version, open the package, load its
//! script and run it.

use std::path::Path;
use std::sync::Arc;
use updater_core::errors::ScriptError;
use updater_core::{
    load_package_script, run_script, CommandSink, PackageArchive, UpdaterConfig, UpdaterEnv,
};
use updater_hal::SystemHal;

pub const EXIT_BAD_API_VERSION: i32 = 2;
pub const EXIT_BAD_PACKAGE: i32 = 3;
pub const EXIT_NO_SCRIPT: i32 = 4;
pub const EXIT_BAD_SCRIPT: i32 = 6;

const SUPPORTED_API_VERSIONS: std::ops::RangeInclusive<u32> = 1..=3;

/// `Some(version)` for an interface version this updater speaks.
pub fn parse_api_version(text: &str) -> Option<u32> {
    text.trim()
        .parse()
        .ok()
        .filter(|v| SUPPORTED_API_VERSIONS.contains(v))
}

/// Run the script of `package` and return the process exit status.
pub fn run_package(
    api_version: &str,
    package_path: &Path,
    config: UpdaterConfig,
    hal: Arc<dyn SystemHal>,
    cmd: &mut CommandSink,
) -> i32 {
    let Some(version) = parse_api_version(api_version) else {
        log::error!("unexpected API version \"{}\"", api_version);
        return EXIT_BAD_API_VERSION;
    };
    log::info!("updater API version {}", version);

    let mut package = match PackageArchive::open(package_path) {
        Ok(package) => package,
        Err(e) => {
            log::error!("{}", e);
            return EXIT_BAD_PACKAGE;
        }
    };

    let env = UpdaterEnv::new(hal, config);
    let root = match load_package_script(&env, &mut package) {
        Ok(root) => root,
        Err(e @ ScriptError::MissingScript { .. }) => {
            log::error!("{}", e);
            return EXIT_NO_SCRIPT;
        }
        Err(e) => {
            log::error!("{}", e);
            return EXIT_BAD_SCRIPT;
        }
    };

    run_script(&env, &mut package, cmd, &root).exit_code()
}
