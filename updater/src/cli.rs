use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Recovery updater-script runner")]
pub struct Cli {
    /// Updater config (TOML); built-in defaults when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Interface version expected by the recovery (1 to 3)
    pub api_version: String,

    /// Descriptor of the command pipe to the recovery UI
    pub command_fd: i32,

    /// Update package
    pub package: PathBuf,
}
