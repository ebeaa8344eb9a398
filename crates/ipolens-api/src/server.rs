use crate::{create_router, AppState};
use ipolens_core::Result;
use std::net::SocketAddr;
use tokio::signal;
use tracing::info;

pub struct Server {
    state: AppState,
    addr: SocketAddr,
}

impl Server {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self { state, addr }
    }

    pub async fn run(self) -> Result<()> {
        let router = create_router(self.state);

        info!("Starting IPO Lens API server on {}", self.addr);

        // Bind with tuned socket options for better keep-alive behavior
        let listener = {
            let socket = if self.addr.is_ipv6() {
                tokio::net::TcpSocket::new_v6()
            } else {
                tokio::net::TcpSocket::new_v4()
            }?;

            // Reuse addr/port to improve rebind under restarts
            let _ = socket.set_reuseaddr(true);
            #[cfg(unix)]
            let _ = socket.set_reuseport(true);

            // Enable OS-level TCP keepalive (interval platform dependent)
            let _ = socket.set_keepalive(true);

            socket.bind(self.addr)?;
            socket.listen(1024)?
        };

        info!("Server listening on http://{}", self.addr);
        info!("API surface:");
        info!("  GET  /api/health - Health check");
        info!("  POST /api/auth/register - Create account");
        info!("  POST /api/auth/login - Sign in");
        info!("  GET  /api/auth/me - Current account");
        info!("  POST /api/auth/upgrade - Upgrade to premium");
        info!("  POST /api/ipo/analyze - Synthesize research report");
        info!("  GET  /api/ipo/history - Recent reports for the caller");
        info!("  POST /api/ipo/assistant - Follow-up Q&A");
        info!("  GET/POST/DELETE /api/logs - Audit trail");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
