//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `RelayServer` bindet einen TCP-Socket und startet fuer jede
//! eingehende Verbindung einen eigenen tokio-Task mit einer `ClientConnection`.
//!
//! ## Concurrency-Modell
//! Alle Verbindungs-Tasks liegen in einem `JoinSet`. Die Accept-Loop wartet
//! nie auf einen einzelnen Worker; beim Shutdown nimmt sie keine neuen
//! Verbindungen mehr an, signalisiert alle Worker und wartet auf sie.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::connection::ClientConnection;
use crate::server_state::RelayState;

/// TCP-Relay-Server
pub struct RelayServer {
    state: Arc<RelayState>,
    listener: TcpListener,
}

impl RelayServer {
    /// Bindet den TCP-Listener
    pub async fn binden(state: Arc<RelayState>, bind_addr: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self { state, listener })
    }

    /// Gibt die tatsaechlich gebundene Adresse zurueck
    pub fn lokale_adresse(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Startet die Accept-Loop
    ///
    /// Laeuft bis `shutdown_rx` ein `true`-Signal empfaengt und alle
    /// Verbindungs-Tasks beendet sind.
    pub async fn starten(self, mut shutdown_rx: watch::Receiver<bool>) -> std::io::Result<()> {
        let lokale_addr = self.listener.local_addr()?;
        let max_clients = self.state.config.max_clients;
        let mut worker: JoinSet<()> = JoinSet::new();

        tracing::info!(
            adresse = %lokale_addr,
            max_clients,
            rsa_bits = self.state.config.rsa_bits,
            "TCP Relay-Server gestartet"
        );

        loop {
            tokio::select! {
                // Neue eingehende Verbindung
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            // Client-Limit pruefen (laufende Handshakes zaehlen mit)
                            if worker.len() >= max_clients {
                                tracing::warn!(
                                    peer = %peer_addr,
                                    max = max_clients,
                                    "Server voll – Verbindung abgelehnt"
                                );
                                drop(stream);
                                continue;
                            }

                            if let Err(e) = stream.set_nodelay(true) {
                                tracing::debug!(peer = %peer_addr, fehler = %e, "TCP_NODELAY nicht gesetzt");
                            }

                            tracing::debug!(peer = %peer_addr, "Verbindung akzeptiert");

                            let verbindung = ClientConnection::neu(Arc::clone(&self.state), peer_addr);
                            let shutdown_rx_clone = shutdown_rx.clone();
                            worker.spawn(async move {
                                verbindung.verarbeiten(stream, shutdown_rx_clone).await;
                            });
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        }
                    }
                }

                // Beendete Worker einsammeln
                Some(ergebnis) = worker.join_next(), if !worker.is_empty() => {
                    if let Err(e) = ergebnis {
                        tracing::error!(fehler = %e, "Verbindungs-Task abgebrochen");
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Relay-Server: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        drop(self.listener);

        let offen = worker.len();
        if offen > 0 {
            tracing::info!(verbindungen = offen, "Warte auf Verbindungs-Tasks");
        }
        while let Some(ergebnis) = worker.join_next().await {
            if let Err(e) = ergebnis {
                tracing::error!(fehler = %e, "Verbindungs-Task abgebrochen");
            }
        }

        tracing::info!(
            uptime_sek = self.state.uptime_sek(),
            "TCP Relay-Server gestoppt"
        );
        Ok(())
    }
}
