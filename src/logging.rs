use crate::config::LoggingConfig;
use crate::error::{Result, SearchError};
use env_logger::{Builder, Env, Target};
use std::fs;

/// Installs the process-wide logger. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let mut builder = build_logger(config)?;
    builder
        .try_init()
        .map_err(|e| SearchError::Other(e.to_string()))?;
    Ok(())
}

fn build_logger(config: &LoggingConfig) -> Result<Builder> {
    let mut builder = Builder::from_env(Env::default().default_filter_or(config.level.as_str()));

    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(
            buf,
            "{} [{}] [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.module_path().unwrap_or("unknown"),
            record.args()
        )
    });

    if let Some(log_path) = &config.file {
        if let Some(parent_dir) = log_path.parent() {
            if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
                fs::create_dir_all(parent_dir)?;
            }
        }
        let log_file = fs::File::create(log_path)?;
        builder.target(Target::Pipe(Box::new(log_file)));
    } else {
        builder.target(Target::Stderr);
    }

    Ok(builder)
}
