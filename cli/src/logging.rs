//! Logging setup, copied idiom-for-idiom from the teacher's
//! `setup_logging` (`secuaas-NetSentinel/{capture,aggregator}/src/main.rs`).

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use multicast_proxy_core::config::LoggingConfig;

pub fn setup_logging(cfg: &LoggingConfig, debug: bool) {
    let default_level = if debug { "debug" } else { cfg.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cfg.format.eq_ignore_ascii_case("json") {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().pretty()).init();
    }
}
