mod error;
mod fixtures;
mod temp_config_dir;
mod testdata;

pub use error::*;
pub use fixtures::*;
pub use temp_config_dir::*;
pub use testdata::*;
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static INIT_TEST_LOGGING: std::sync::Once = std::sync::Once::new();

/// Filters applied to test logs unless `DSPI_TEST_LOG` overrides them.
const DEFAULT_TEST_LOG_FILTER: &str = "dspi_=trace,info";

/// Makes sure logging is initialized for test.
///
/// This needs to be called on each test. Scheduler transitions and register
/// writes are traced, so set `DSPI_TEST_LOG=dspi_=info` to quiet them.
pub fn init_test_logging() {
    INIT_TEST_LOGGING.call_once(|| {
        let fmt_layer = tracing_subscriber::fmt::layer().with_test_writer();
        let filter = EnvFilter::try_from_env("DSPI_TEST_LOG")
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_LOG_FILTER));

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .with(tracing_error::ErrorLayer::default())
            .try_init()
            .unwrap();
    });
}
