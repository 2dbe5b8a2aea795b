//! beacon-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;

use anyhow::{Context, Result};
use beacon_relay::{RelayServer, RelayState, UdpDatagramSender};
use config::ServerConfig;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

/// Aufruf-Hilfe fuer die Kommandozeile
pub const AUFRUF: &str = "Aufruf: beacon-server [port]\n  \
    port  TCP-Port; ohne Angabe gilt netzwerk.tcp_port aus BEACON_CONFIG (Standard 9987)";

/// Liest den optionalen TCP-Port aus den Argumenten (ohne Programmname)
pub fn port_aus_argumenten<I>(mut argumente: I) -> Result<Option<u16>>
where
    I: Iterator<Item = String>,
{
    let Some(port) = argumente.next() else {
        return Ok(None);
    };
    if argumente.next().is_some() {
        anyhow::bail!("Zu viele Argumente\n{AUFRUF}");
    }
    let port: u16 = port
        .trim()
        .parse()
        .with_context(|| format!("Ungueltiger Port '{port}'\n{AUFRUF}"))?;
    Ok(Some(port))
}

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Bindet UDP-Sender und TCP-Listener
    ///
    /// Reihenfolge:
    /// 1. Konfiguration pruefen
    /// 2. UDP-Sender binden (IPv4, optional IPv6)
    /// 3. TCP-Listener binden
    pub async fn binden(self) -> Result<GebundenerServer> {
        let relay_config = self.config.relay_config()?;
        let tcp_adresse = self.config.tcp_bind_adresse()?;

        let sender =
            UdpDatagramSender::binden(self.config.udp_bind_v4()?, self.config.udp_bind_v6()?)
                .await
                .context("UDP-Sender konnte nicht gebunden werden")?;

        let state = RelayState::neu(relay_config, Arc::new(sender));
        let relay = RelayServer::binden(Arc::clone(&state), tcp_adresse)
            .await
            .with_context(|| format!("TCP-Listener auf {tcp_adresse} nicht gebunden"))?;

        tracing::info!(
            server_name = %self.config.server.name,
            tcp = %relay.lokale_adresse()?,
            "Server gebunden"
        );

        Ok(GebundenerServer { relay, state })
    }

    /// Startet den Server und laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        let gebunden = self.binden().await?;

        gebunden
            .laufen(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => tracing::info!("Shutdown-Signal empfangen, Server wird beendet"),
                    Err(e) => tracing::error!(fehler = %e, "Ctrl-C-Handler fehlgeschlagen"),
                }
            })
            .await
    }
}

/// Server mit gebundenen Sockets, bereit zum Laufen
pub struct GebundenerServer {
    relay: RelayServer,
    state: Arc<RelayState>,
}

impl GebundenerServer {
    /// Tatsaechliche TCP-Adresse (relevant bei Port 0)
    pub fn tcp_adresse(&self) -> Result<SocketAddr> {
        Ok(self.relay.lokale_adresse()?)
    }

    /// Anzahl registrierter Clients
    pub fn client_anzahl(&self) -> usize {
        self.state.registry.anzahl()
    }

    /// Laeuft bis `shutdown` fertig ist, trennt dann alle Verbindungen
    pub async fn laufen<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut relay_task = tokio::spawn(self.relay.starten(shutdown_rx));

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");

        tokio::select! {
            ergebnis = &mut relay_task => {
                // Accept-Loop endete ohne Shutdown
                return ergebnis.context("Relay-Task abgebrochen")?.map_err(Into::into);
            }
            _ = shutdown => {}
        }

        let _ = shutdown_tx.send(true);
        relay_task.await.context("Relay-Task abgebrochen")??;

        tracing::info!(
            verbleibend = self.state.registry.anzahl(),
            "Server beendet"
        );
        Ok(())
    }
}
