/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG` from the environment (default level is `info`). Safe to
/// call more than once; later calls are ignored.
pub fn init() {
    let env = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(env))
        .with_target(false)
        .try_init();
}
