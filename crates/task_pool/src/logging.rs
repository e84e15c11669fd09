//! Tracing subscriber setup for binaries, demos and tests.
//!
//! The pool itself only emits events through the `tracing` macros; nothing
//! in the library installs a subscriber implicitly. Binaries call [`init`]
//! (or [`init_with`] for file output) once at startup.

use anyhow::{anyhow, Result};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::fileio::prepare_dir;

/// Installs a console subscriber. `RUST_LOG` overrides the default `info`
/// filter. Fails if a global subscriber is already installed.
pub fn init() -> Result<()> {
    init_with(None, true)
}

/// Installs a subscriber writing to an optional log file and, if `display`
/// is set, the console. The log file's parent directory is created if
/// needed.
pub fn init_with(file: Option<&Path>, display: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match file {
        Some(path) => {
            prepare_dir(path)?;
            let file = File::create(path)
                .map_err(|e| anyhow!("failed to create log file {}: {}", path.display(), e))?;
            Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        }
        None => None,
    };
    let console_layer = if display { Some(fmt::layer()) } else { None };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))
}
