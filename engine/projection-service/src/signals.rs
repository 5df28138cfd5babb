//! Signal handling for graceful shutdown

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Resolve when Ctrl+C (SIGINT) or, on Unix, SIGTERM is received
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl+C signal received"),
            Err(e) => {
                error!("Failed to listen for Ctrl+C signal: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    let terminate = async {
        if cfg!(unix) {
            let flag = Arc::new(AtomicBool::new(false));
            if let Err(e) = signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&flag)) {
                error!("Failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }

            while !flag.load(Ordering::Relaxed) {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            info!("SIGTERM signal received");
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
