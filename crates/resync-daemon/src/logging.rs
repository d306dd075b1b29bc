use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Context;
use resync_core::ResyncConfig;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Daemon log inside `log_path`, next to the per-sync directories.
pub const LOG_FILE: &str = "resync.log";

/// Install the global subscriber. `RUST_LOG` wins over `log_level`.
///
/// Called once per process; a config reload does not change logging.
pub fn init(config: &ResyncConfig, debug: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));

    let installed = if debug {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
    } else {
        std::fs::create_dir_all(&config.log_path)
            .with_context(|| format!("creating {}", config.log_path.display()))?;
        let path = config.log_path.join(LOG_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init()
    };

    installed.map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))
}

/// Route panics through tracing with a backtrace, so they land in resync.log.
///
/// Job panics are still caught by the runner; this only records them.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::force_capture();
        let thread = std::thread::current();
        error!(
            thread = thread.name().unwrap_or("<unnamed>"),
            panic = %info,
            %backtrace,
            "panic"
        );
    }));
}
