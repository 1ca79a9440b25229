use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "posepipe=info";

/// Install the global fmt subscriber with uptime timestamps.
///
/// Returns an error when a global subscriber is already installed.
pub fn init_tracing() -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_subscriber::util::SubscriberInitExt;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_thread_names(true)
        .finish()
        .try_init()
}

/// Frame interval for a capture rate; zero fps means no pacing.
pub fn frame_interval(fps: u32) -> Option<std::time::Duration> {
    (fps > 0).then(|| std::time::Duration::from_secs_f64(1.0 / fps as f64))
}
