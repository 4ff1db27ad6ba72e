//! Logging setup
//!
//! `RUST_LOG` wins when set; otherwise `farmnet=<LOG_LEVEL>,info`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Args, LogFormat};

/// Install the global tracing subscriber
pub fn init(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("farmnet={},info", args.log_level).into());

    let registry = tracing_subscriber::registry().with(filter);

    match args.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}
