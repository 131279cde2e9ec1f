//! tracing subscriber setup for binaries, demos and tests
use tracing_subscriber::{EnvFilter, fmt};

/// Installs a stdout subscriber. `RUST_LOG` wins over `level`, which
/// defaults to `info`. Calling it again is a no-op.
pub fn init_tracing(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let base = level.unwrap_or("info");
        EnvFilter::new(format!("freight_match={base},sled=warn"))
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
