use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;

mod tennis_logic;
use tennis_logic::{config, downstream, logger, state, upstream};

const SESSION_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config();
    logger::setup_logging(&config.log_dir(), &config.log_level())?;

    let poll_shutdown = CancellationToken::new();
    let server_shutdown = CancellationToken::new();
    let plugin = upstream::build_plugin(&config)?;
    let app_state = state::AppState::from_plugin(&plugin);

    let upstream_handle = tokio::spawn(upstream::run(Arc::clone(&plugin), poll_shutdown.clone()));

    let downstream_handle = tokio::spawn(downstream::run(
        config.clone(),
        app_state.clone(),
        server_shutdown.clone(),
    ));

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = terminate() => {
            log::info!("SIGTERM received, initiating shutdown.");
        }
    }

    // The poll loop stops between cycles; the last published set is then
    // flushed, WebSocket sessions get to write it out, and only then does the
    // HTTP server stop.
    poll_shutdown.cancel();
    if let Err(e) = upstream_handle.await {
        log::error!("Upstream task failed: {}", e);
    }
    app_state.close_sessions(SESSION_DRAIN_TIMEOUT).await;
    server_shutdown.cancel();

    match downstream_handle.await {
        Ok(Err(e)) => log::error!("Downstream server error: {}", e),
        Err(e) => log::error!("Downstream task failed: {}", e),
        Ok(Ok(())) => {}
    }

    log::info!("Shutdown complete.");
    Ok(())
}

async fn terminate() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term_signal) => {
                term_signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        // On non-unix platforms, just wait forever.
        std::future::pending::<()>().await;
    }
}
