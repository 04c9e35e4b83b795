use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Our own events down to `debug`, dependencies at `info`.
const DEFAULT_FILTER: &str = "info,catalog_scraper=debug";

/// Send all tracing output to `<log_dir>/<name>_<YYYY_MM_DD__HH_MM>.log`.
/// Returns the path of the log file for this run.
pub fn init(log_dir: &Path, name: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log dir {}", log_dir.display()))?;

    let path = log_dir.join(log_file_name(name, chrono::Local::now()));
    let file = File::create(&path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .init();

    Ok(path)
}

fn log_file_name<Tz: chrono::TimeZone>(name: &str, at: chrono::DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}_{}.log", name, at.format("%Y_%m_%d__%H_%M"))
}
