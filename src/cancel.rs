//! # Cancellation Gate
//!
//! Segnale di cancellazione unico per tutto il processo.
//!
//! ## Semantica:
//! - Si arma una sola volta e non si disarma più (terminale per il run)
//! - Una volta scattato nessun job può uscire da `Pending`
//! - I job in `Probing`/`Encoding` terminano l'encoder e passano a `Cancelled`
//!
//! Il gate viene passato esplicitamente all'executor e al batch: i test
//! possono farlo scattare senza segnali reali. `watch_signals` collega
//! SIGINT/SIGTERM al gate per l'uso da riga di comando.

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Process-wide, set-once cancellation signal
#[derive(Debug, Clone, Default)]
pub struct CancellationGate {
    token: CancellationToken,
}

impl CancellationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the gate; later calls are no-ops
    pub fn trip(&self) {
        if !self.token.is_cancelled() {
            info!("Cancellation requested");
        }
        self.token.cancel();
    }

    pub fn is_tripped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the gate has been tripped
    pub async fn tripped(&self) {
        self.token.cancelled().await
    }

    /// Trip the gate on SIGINT (Ctrl+C) or SIGTERM
    pub fn watch_signals(&self) -> tokio::task::JoinHandle<()> {
        let gate = self.clone();

        tokio::spawn(async move {
            let ctrl_c = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to install Ctrl+C handler: {}", e);
                    std::future::pending::<()>().await;
                }
            };

            #[cfg(unix)]
            let terminate = async {
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(mut signal) => {
                        signal.recv().await;
                    }
                    Err(e) => {
                        error!("Failed to install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => {}
                _ = terminate => {}
                _ = gate.tripped() => return,
            }

            gate.trip();
        })
    }
}
