// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! docdeskd: the document-assistant daemon.
//!
//! Couples the LLM chat front-end to the document corpus: session and
//! presence management, the live document index, the tool-calling chat
//! loop, downloads, uploads, and the viewer/editor bridges.

mod auth;
mod kernel;
mod routes;
mod state;

use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "docdeskd", about = "Document assistant backend daemon", version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "docdesk.toml", env = "DOCDESK_CONFIG")]
    config: PathBuf,

    /// Log to this directory (daily rotation) instead of stderr
    #[arg(long, env = "DOCDESK_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // keep the appender guard alive for the process lifetime
    let _log_guard = init_logging(cli.log_dir.as_deref())?;

    let config = dd_core::Config::load(&cli.config)?;
    info!(config = %cli.config.display(), "configuration loaded");

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async move {
        let kernel = kernel::AppKernel::start(config).await?;
        kernel.serve().await?;
        Ok(())
    })
}

fn init_logging(
    log_dir: Option<&std::path::Path>,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "docdeskd.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}
