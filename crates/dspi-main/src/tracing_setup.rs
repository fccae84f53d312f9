use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// The options available for configuring logging.
#[derive(clap::Args, Debug)]
pub struct TracingOptions {
    /// Log filter configuration.
    ///
    /// Defaults to `dspi_=info,warn` which logs `info` from the DSPI crates
    /// (`dspi_scheduler`, `dspi_main`, etc.) and `warn` from other crates.
    #[arg(long, default_value = "dspi_=info,warn", env = "DSPI_LOG_FILTER")]
    pub log_filters: String,
    /// Whether logs should be written as JSON.
    #[arg(long, env = "DSPI_LOG_JSON")]
    pub log_json: bool,
}

/// Setup logging to the console.
///
/// # Panics
/// If any of the setup fails. This is called early on and is required to work
/// in order for logging / debugging / etc.
pub fn setup_tracing(config: &TracingOptions) {
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_filters).unwrap())
        .with(tracing_error::ErrorLayer::default());

    // The format layer type differs between JSON and text output, so each
    // branch installs its own subscriber.
    if config.log_json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr);
        registry.with(fmt_layer).try_init().unwrap();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr);
        registry.with(fmt_layer).try_init().unwrap();
    }
}
