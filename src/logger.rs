use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

const LOG_ENV: &str = "BOARDLINK_LOG";

/// Installs the global subscriber. Logs go to the configured file; when it
/// cannot be opened they go to stderr instead.
pub fn init(cfg: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .with_context(|| format!("invalid log level '{}'", cfg.level))?;

    let file = cfg
        .path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|()| OpenOptions::new().create(true).append(true).open(&cfg.path));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match file {
        Ok(file) => builder
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init(),
        Err(err) => {
            eprintln!("cannot open log file {}: {err}", cfg.path.display());
            builder.with_writer(std::io::stderr).try_init()
        }
    };
    installed.map_err(|err| anyhow!("failed to install logger: {err}"))
}
