use std::fs::{self, File};
use std::path::Path;
use std::sync::Mutex;

use eyre::{Result, WrapErr};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

pub const DEBUG_LOG: &str = "utrex_debug.log";

/// Console output at INFO (overridable through `RUST_LOG`) and a DEBUG log file in `log_dir`.
/// Records emitted through the `log` facade by the library crates are forwarded as well.
pub fn init(log_dir: &Path) -> Result<()> {
    fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let path = log_dir.join(DEBUG_LOG);
    let file = File::create(&path).wrap_err_with(|| format!("Failed to create {}", path.display()))?;

    let console = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stdout)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));
    let debug = fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .with_filter(LevelFilter::DEBUG);

    tracing_log::LogTracer::init().wrap_err("Failed to forward log records")?;
    tracing::subscriber::set_global_default(tracing_subscriber::registry().with(console).with(debug))
        .wrap_err("Failed to install the logger")?;
    Ok(())
}
