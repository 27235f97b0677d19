use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use file_renamer::{
    access::AccessControl,
    api,
    bot::{Bot, SessionRouter},
    config::{Config, UpdateMode},
    gateway::{Gateway, TelegramGateway},
    pending::PendingRenameRegistry,
    pipeline::RenamePipeline,
    settings,
    transcoder::FfmpegTranscoder,
    AppState,
};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const POLL_RETRY_DELAY: Duration = Duration::from_secs(3);
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "file-renamer starting");

    // Load configuration
    let config = Config::load()?;
    info!(owner = %config.bot.owner_id, "Loaded configuration");

    // Open settings and refuse to start on an unreadable document
    let settings = settings::open(&config.settings, config.bot.owner_id)?;
    let current = settings.load()?;
    info!(
        approved_users = current.approved_users.len(),
        convert_mkv = current.convert_mkv,
        "Settings loaded"
    );

    let telegram = Arc::new(TelegramGateway::new(&config.bot.api_url, &config.bot.token)?);
    let gateway: Arc<dyn Gateway> = telegram.clone();
    let transcoder = Arc::new(FfmpegTranscoder::new(config.rename.ffmpeg_path.clone()));
    let pending = Arc::new(PendingRenameRegistry::new(config.rename.pending_ttl_seconds));
    let access = AccessControl::new(config.bot.owner_id, Arc::clone(&settings));

    let pipeline = Arc::new(RenamePipeline::new(
        access.clone(),
        Arc::clone(&gateway),
        Arc::clone(&pending),
        Arc::clone(&settings),
        transcoder,
        config.rename.work_dir.clone(),
    ));
    let bot = Arc::new(Bot::new(
        access,
        Arc::clone(&gateway),
        Arc::clone(&pending),
        pipeline,
        settings,
    ));

    let shutdown = CancellationToken::new();
    let router = SessionRouter::new(
        bot,
        Duration::from_secs(config.rename.session_idle_seconds.max(1)),
        shutdown.clone(),
    );

    let mut background = Vec::new();
    background.push(tokio::spawn(sweep_pending(
        Arc::clone(&pending),
        shutdown.clone(),
    )));

    match config.bot.update_mode {
        UpdateMode::Webhook => {
            let url = config
                .bot
                .webhook_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("WEBHOOK_URL is required in webhook mode"))?;
            telegram
                .set_webhook(url, config.bot.webhook_secret.as_deref())
                .await?;
            info!("Receiving updates via webhook");
        }
        UpdateMode::Polling => {
            telegram.delete_webhook().await?;
            background.push(tokio::spawn(poll_updates(
                Arc::clone(&telegram),
                router.clone(),
                config.bot.poll_timeout_seconds,
                shutdown.clone(),
            )));
            info!("Receiving updates via long polling");
        }
    }

    // Create shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        pending,
        router,
    });

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.http.bind_address).await?;
    info!("Listening on: {}", config.http.bind_address);

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let server_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_token.cancelled().await })
        .await?;

    // Cleanup: abort background tasks
    info!("Shutting down background tasks");
    for handle in background {
        handle.abort();
    }

    info!("Waiting for in-flight renames");
    if !state.router.drain(DRAIN_TIMEOUT).await {
        tracing::warn!(
            active_sessions = state.router.active_sessions(),
            "Session workers still running at drain deadline"
        );
    }

    if state.router.has_failed() {
        anyhow::bail!("stopped after a fatal settings store error");
    }

    info!("Shutdown complete");
    Ok(())
}

async fn poll_updates(
    telegram: Arc<TelegramGateway>,
    router: SessionRouter,
    timeout_seconds: u64,
    shutdown: CancellationToken,
) {
    let mut offset: Option<i64> = None;

    loop {
        let updates = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = telegram.get_updates(offset, timeout_seconds) => result,
        };

        match updates {
            Ok(updates) => {
                for update in updates {
                    offset = Some(update.update_id + 1);
                    if let Some(event) = update.into_event() {
                        router.dispatch(event);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch updates, retrying");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(POLL_RETRY_DELAY) => {}
                }
            }
        }
    }
}

async fn sweep_pending(pending: Arc<PendingRenameRegistry>, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                let removed = pending.sweep_expired();
                if removed > 0 {
                    info!(removed, "Expired pending renames");
                }
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
