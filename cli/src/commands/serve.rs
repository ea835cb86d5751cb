//! `serve` — runs the reflector engine (C8) using the loaded config.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use multicast_proxy_core::config::Config;
use multicast_proxy_core::engine;

pub fn serve(cfg: &Config, running: Arc<AtomicBool>) -> Result<()> {
    engine::run(cfg, running).context("reflector engine exited with an error")
}
