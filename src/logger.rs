//! File logging setup. UCI owns stdout, so diagnostics go to a log
//! file via a non-blocking writer.

use std::path::Path;
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt};

static GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
static INIT: OnceLock<()> = OnceLock::new();

/// Initializes logging once for the whole process.
///
/// `filter` is a tracing directive like "stretto=debug"; the RUST_LOG
/// environment variable takes precedence when set.
pub fn init_logging<P: AsRef<Path>>(path: P, filter: &str) {
    INIT.get_or_init(|| {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }

        let file = match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => file,
            Err(_) => return, // run without a log file
        };

        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        // The guard must live for the program lifetime.
        let _ = GUARD.set(guard);

        let env_filter = if std::env::var_os("RUST_LOG").is_some() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"))
        };

        let subscriber = fmt()
            .with_env_filter(env_filter)
            .with_ansi(false)
            .with_target(true)
            .with_writer(non_blocking)
            .finish();

        // Idempotent if a subscriber was already installed.
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
