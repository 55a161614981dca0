use std::path::Path;

/// Initialise `env_logger`, writing to `log_file` when it can be opened and to
/// stderr otherwise. `RUST_LOG` overrides the default `info` level.
pub fn init(log_file: Option<&Path>) {
    use env_logger::Target;
    use std::fs;
    use std::io;

    let target = log_file
        .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        .and_then(|path| {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
            Ok(Target::Pipe(Box::new(file)))
        })
        .unwrap_or(Target::Stderr);

    // A second init in the same process is a no-op.
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .target(target)
        .try_init();
}
