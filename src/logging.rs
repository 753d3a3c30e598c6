//! Tracing setup. The terminal belongs to the UI, so logs go to a file.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::domain::DirError;

/// Install the global subscriber.
///
/// Reads `RUST_LOG`, defaults to `info`. Appends to `log_file`.
///
/// ```bash
/// RUST_LOG=cdir=trace cdir companies.csv
/// ```
pub fn init(log_file: &Path) -> Result<(), DirError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .try_init()?;
    Ok(())
}
