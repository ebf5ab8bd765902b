//! Tracing setup.
//!
//! The terminal belongs to the UI, so logs only ever go to a file. With
//! no file configured nothing is installed and the `tracing` macros in
//! the core are no-ops.
//!
//! `RUST_LOG` wins over the filter passed in, e.g.
//! `RUST_LOG=grid_editor::find=debug`.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the file subscriber. Keep the returned guard alive for the
/// whole run; dropping it flushes and stops the writer thread.
pub fn init(log_file: Option<&Path>, default_filter: &str) -> Option<WorkerGuard> {
    let path = log_file?;
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    let file_name = path.file_name()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .with_filter(filter);

    // a second init (tests, embedding) keeps the first subscriber
    if tracing_subscriber::registry().with(file_layer).try_init().is_err() {
        return None;
    }
    Some(guard)
}
