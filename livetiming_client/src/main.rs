use anyhow::Result;
use std::time::Duration;
use tokio::signal;

use lib_livetiming::{ConnectionStatus, LiveTimingService};

mod client_logic;
use client_logic::{config, logger, summary};

#[tokio::main]
async fn main() -> Result<()> {
    // Optional .env next to the binary; missing is fine
    let _ = dotenvy::dotenv();

    let config = config::load_config();
    logger::setup_logging(&config.log_dir(), config.log_level())?;

    let options = config.to_service_options();
    log::info!("Streaming from {}", options.url);
    let service = LiveTimingService::with_sse(options)?;

    let _status = service.on_status_change(|change| {
        if change.to == ConnectionStatus::Failed {
            log::error!("Live timing stream failed; restart or reconnect required.");
        }
    });
    let _initial = service.subscribe(|state| match state {
        Some(state) if state.is_empty() => log::warn!("Received an empty state tree"),
        Some(_) => {}
        None => log::info!("State cleared"),
    });

    service.start();

    let interval_secs = config.summary_interval_seconds.unwrap_or(30).max(1);
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    ticker.tick().await;

    let shutdown = async {
        tokio::select! {
            _ = signal::ctrl_c() => {
                log::info!("Ctrl-C received, initiating shutdown.");
            }
            _ = async {
                #[cfg(unix)]
                {
                    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                        Ok(mut term_signal) => {
                            term_signal.recv().await;
                            log::info!("SIGTERM received, initiating shutdown.");
                        }
                        Err(e) => {
                            log::warn!("SIGTERM handler unavailable: {}", e);
                            std::future::pending::<()>().await;
                        }
                    }
                }
                #[cfg(not(unix))]
                {
                    // On non-unix platforms, just wait forever.
                    std::future::pending::<()>().await;
                }
            } => {}
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                match service.get_state() {
                    Some(state) => log::info!("{}", summary::summarize(&state)),
                    None => log::info!("Waiting for initial state (connection {})", service.get_connection_status()),
                }
                if let Ok(stats) = serde_json::to_string(&service.get_stats()) {
                    log::debug!("Stats: {}", stats);
                }
            }
        }
    }

    service.destroy();
    log::info!("Shutdown complete.");
    Ok(())
}
