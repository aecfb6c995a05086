use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{info, warn};

use sp_upload_limiter::{
    api, telemetry, ApiState, InMemoryLedger, LedgerBackend, LedgerDatabase, LedgerStore,
    UploadLimiterConfig, UsageTracker,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = UploadLimiterConfig::from_env()?;
    telemetry::init_tracing(&config.log_level)?;

    info!(
        addr = %config.listen_addr(),
        backend = ?config.ledger_backend,
        clock = ?config.hour_clock,
        "starting upload limiter service"
    );

    let store: Arc<dyn LedgerStore> = match config.ledger_backend {
        LedgerBackend::Sqlite => Arc::new(LedgerDatabase::new(config.data_dir.clone())?),
        LedgerBackend::Memory => Arc::new(InMemoryLedger::new()),
    };
    let tracker = Arc::new(UsageTracker::new(store, config.hour_clock.build()));

    if config.warm_cache {
        match tracker.warm_cache() {
            Ok(loaded) => info!(loaded_providers = loaded, "warmed provider cache"),
            Err(err) => warn!(error = %err, "failed to warm provider cache from ledger"),
        }
    }

    let addr: SocketAddr = config.listen_addr().parse()?;
    let state = Arc::new(ApiState::new(Arc::clone(&tracker), config));
    let router = api::create_router(state);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("upload limiter service shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
