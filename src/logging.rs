use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

static TRACING_INIT: Once = Once::new();

/// Installs the global fmt subscriber once. `RUST_LOG` takes precedence over
/// `filter`; later calls are ignored.
pub fn init_tracing(filter: &str) {
    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(filter))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        // Another subscriber may already be installed by the host.
        let _ = fmt().with_env_filter(filter).try_init();
        tracing::info!("club dues tracing initialized");
    });
}
