//! spxserve - build spx games to WebAssembly on demand and serve them.

mod cache;
mod cli;
mod config;
mod core;
mod embed;
mod error;
mod logger;
mod reload;
mod serve;
mod toolchain;
mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};

use cache::BuildCache;
use cli::Cli;
use config::ServeConfig;
use serve::Router;
use toolchain::GoToolchain;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = Arc::new(ServeConfig::from_cli(&cli)?);
    let cache = Arc::new(init_cache(&config)?);
    let router = Arc::new(Router::new(Arc::clone(&config), Arc::clone(&cache)));

    let result = serve::bind_server(router).and_then(|server| server.run());
    serve::drain_builds(&cache);
    result
}

/// Locate the Go toolchain and open the artifact cache.
fn init_cache(config: &ServeConfig) -> Result<BuildCache> {
    let go = match &config.go {
        Some(go) => which::which(go).with_context(|| format!("Go toolchain `{}` not found", go.display()))?,
        None => GoToolchain::find_go()?,
    };

    std::fs::create_dir_all(&config.cache_dir)
        .with_context(|| format!("failed to create cache dir {}", config.cache_dir.display()))?;

    // `go mod download` must run outside any module; the cache root qualifies
    let workdir = config.cache_dir.clone();
    let gop = config
        .gop
        .as_ref()
        .map(|gop| which::which(gop).with_context(|| format!("Go+ toolchain `{}` not found", gop.display())))
        .transpose()?;
    let toolchain = GoToolchain::new(go, config.tags.clone(), workdir).with_gop(gop);

    debug!("build"; "cache root {}", config.cache_dir.display());
    Ok(BuildCache::new(&config.cache_dir, Arc::new(toolchain)).with_build_timeout(config.build_timeout))
}
