//! Log output for serialterm binaries.

use tracing_subscriber::EnvFilter;

/// Environment variable checked before `RUST_LOG`.
pub const LOG_ENV: &str = "SERIALTERM_LOG";

/// Session and port events at info, everything else only when it warns.
pub const DEFAULT_FILTER: &str = "warn,serialterm_core=info,serialterm_io=info";

/// Pick the filter directives: `SERIALTERM_LOG`, then `RUST_LOG`, then
/// [`DEFAULT_FILTER`]. Blank values are skipped.
pub fn filter_directives(serialterm_log: Option<String>, rust_log: Option<String>) -> String {
    [serialterm_log, rust_log]
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Install the stderr subscriber. Stdout belongs to device output.
pub fn init_tracing() {
    let directives = filter_directives(
        std::env::var(LOG_ENV).ok(),
        std::env::var("RUST_LOG").ok(),
    );
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|e| {
        eprintln!("[serialterm] bad log filter {directives:?} ({e}), using defaults");
        EnvFilter::new(DEFAULT_FILTER)
    });

    // The session worker is a named thread; show names rather than ids.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(true)
        .compact()
        .try_init();
}

/// Log panics through tracing, tagged with the panicking thread.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("<non-string panic payload>");

        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "<unknown>".to_string());

        let current = std::thread::current();
        let thread = current.name().unwrap_or("<unnamed>");

        tracing::error!(%thread, %location, %payload, "panic");
    }));
}
