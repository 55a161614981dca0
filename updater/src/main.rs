use clap::Parser;
use std::fs::File;
use std::os::fd::FromRawFd;
use std::sync::Arc;
use updater_core::{logging, CommandSink, UpdaterConfig};
use updater_hal::LinuxHal;

mod cli;
mod driver;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let config = match &cli.config {
        Some(path) => UpdaterConfig::load(path)?,
        None => UpdaterConfig::default(),
    };
    logging::init(Some(&config.log_file));

    anyhow::ensure!(cli.command_fd >= 0, "invalid command pipe fd {}", cli.command_fd);
    // SAFETY: the recovery passes an open pipe descriptor that this process
    // owns from here on.
    let pipe = unsafe { File::from_raw_fd(cli.command_fd) };
    let mut cmd = CommandSink::new(pipe);

    let hal = Arc::new(LinuxHal::with_paths(config.device_paths()));
    let status = driver::run_package(&cli.api_version, &cli.package, config, hal, &mut cmd);
    log::info!("updater exiting with status {}", status);
    drop(cmd);
    std::process::exit(status)
}
