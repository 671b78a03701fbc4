// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application lifecycle: wiring, scheduled sweeps, serve, shutdown.

use crate::routes::build_router;
use crate::state::AppState;
use dd_chat::LlmClient;
use dd_core::Config;
use dd_files::FileService;
use dd_index::IndexService;
use dd_session::SessionManager;
use dd_tools::{register_builtin_tools, EmbeddingClient, KbClient, ToolEnv, ToolHost};
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("file service init failed: {0}")]
    Files(#[from] dd_files::FileServiceError),

    #[error("index init failed: {0}")]
    Index(#[from] dd_index::IndexError),

    #[error("http client init failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("bind failed on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The composed application, ready to serve.
pub struct AppKernel {
    state: AppState,
    scheduler: CancellationToken,
}

impl AppKernel {
    /// Build every service in dependency order and start the background
    /// machinery (index watchers, sweeps, daily rescan).
    pub async fn start(mut config: Config) -> Result<Self, KernelError> {
        if config.server.session_secret.is_empty() {
            // ephemeral secret: cookies die with the process, which is the
            // honest behavior when the operator configured none
            config.server.session_secret = dd_core::new_session_id();
            warn!("no session_secret configured, generated an ephemeral one");
        }
        let config = Arc::new(config);
        let roots = config.document_roots();

        // 1. shared HTTP client pool
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .build()?;

        // 2. embeddings health check gates the similarity features
        let embeddings = Arc::new(EmbeddingClient::new(http.clone(), config.embedding.clone()));
        embeddings.health_check().await;

        // 3. sessions
        let sessions = Arc::new(SessionManager::new(
            roots.clone(),
            config.session.inactivity_timeout_secs,
            config.session.download_link_validity_secs,
        ));

        // 4. index: full scan, then live watch
        let index = Arc::new(IndexService::new(
            roots.clone(),
            &config.index.store_path,
            config.index.watcher_cooldown_secs,
            config.index.allowed_file_types.clone(),
        )?);
        index.start().await?;

        // 5. rooted file services
        let projects_fs = Arc::new(FileService::new(config.roots.projects_root.clone())?);
        let specs_fs = Arc::new(FileService::new(config.roots.spec_root.clone())?);
        let management_fs = Arc::new(FileService::new(config.roots.management_root.clone())?);

        // 6. tools
        let kb = Arc::new(KbClient::new(http.clone(), config.kb.clone()));
        let mut tool_host = ToolHost::new(ToolEnv {
            sessions: Arc::clone(&sessions),
            index: Arc::clone(&index),
            projects_fs: Arc::clone(&projects_fs),
            embeddings: Arc::clone(&embeddings),
            kb,
            config: Arc::clone(&config),
        });
        register_builtin_tools(&mut tool_host);

        let llm = Arc::new(LlmClient::new(http.clone(), config.llm.clone()));

        let state = AppState {
            config: Arc::clone(&config),
            sessions,
            index,
            projects_fs,
            specs_fs,
            management_fs,
            tools: Arc::new(tool_host),
            llm,
            http,
        };

        // 7. scheduled sweeps
        let scheduler = CancellationToken::new();
        spawn_sweepers(&state, &scheduler);

        Ok(Self { state, scheduler })
    }

    /// Bind and serve until ctrl-c, then shut the services down.
    pub async fn serve(self) -> Result<(), KernelError> {
        let addr = self.bind_addr();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| KernelError::Bind { addr, source })?;
        info!(%addr, "serving");

        let router = build_router(self.state.clone());
        let serve = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        });
        let result = serve.await;

        self.shutdown().await;
        result?;
        Ok(())
    }

    /// Stop the scheduler and the index machinery.
    pub async fn shutdown(&self) {
        self.scheduler.cancel();
        self.state.index.shutdown().await;
        info!("kernel stopped");
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    fn bind_addr(&self) -> SocketAddr {
        let host = self
            .state
            .config
            .server
            .host
            .as_deref()
            .and_then(|h| h.parse::<IpAddr>().ok())
            // dual-stack default: v6 unspecified accepts v4-mapped peers
            .unwrap_or(IpAddr::V6(Ipv6Addr::UNSPECIFIED));
        SocketAddr::new(host, self.state.config.server.port)
    }
}

/// Idle-session sweep, expired-token sweep at half the cadence, and the
/// daily full rescan.
fn spawn_sweepers(state: &AppState, scheduler: &CancellationToken) {
    let interval = Duration::from_secs(state.config.session.cleanup_interval_secs.max(1));

    {
        let sessions = Arc::clone(&state.sessions);
        let cancel = scheduler.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = cancel.cancelled() => break,
                }
                let evicted = sessions.process_inactive_sessions();
                if !evicted.is_empty() {
                    info!(count = evicted.len(), "idle sessions evicted");
                }
            }
        });
    }

    {
        let sessions = Arc::clone(&state.sessions);
        let cancel = scheduler.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval * 2);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = cancel.cancelled() => break,
                }
                sessions.cleanup_expired_opened_files();
            }
        });
    }

    {
        let index = Arc::clone(&state.index);
        let cancel = scheduler.clone();
        let hour = state.config.index.scan_cron_hour;
        let minute = state.config.index.scan_cron_minute;
        tokio::spawn(async move {
            loop {
                let wait = until_next(hour, minute);
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = cancel.cancelled() => break,
                }
                info!("daily full rescan");
                if let Err(e) = index.full_scan().await {
                    warn!(error = %e, "scheduled rescan failed");
                }
            }
        });
    }
}

/// Duration until the next local occurrence of `hour:minute`.
fn until_next(hour: u32, minute: u32) -> Duration {
    use chrono::{Local, NaiveTime, TimeZone};
    let now = Local::now();
    let target_time = NaiveTime::from_hms_opt(hour.min(23), minute.min(59), 0)
        .unwrap_or(NaiveTime::MIN);
    let mut target_date = now.date_naive();
    if now.time() >= target_time {
        target_date = target_date.succ_opt().unwrap_or(target_date);
    }
    let target = Local
        .from_local_datetime(&target_date.and_time(target_time))
        .earliest();
    match target {
        Some(target) => (target - now).to_std().unwrap_or(Duration::from_secs(60)),
        None => Duration::from_secs(3600),
    }
}

#[cfg(test)]
#[path = "kernel_tests.rs"]
mod tests;
