//! Structured logging setup.
//!
//! Log levels are driven by `RUST_LOG`; the default keeps our crates at
//! info and quiets the HTTP stack. `log` macro output from the library
//! crate is bridged into tracing by the subscriber.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,tower_http=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("logging initialized");
}
