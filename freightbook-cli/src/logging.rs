use tracing_subscriber::EnvFilter;

pub const ENV_LOG: &str = "FREIGHTBOOK_LOG";

pub fn init() {
    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::debug!("logging initialized");
}
