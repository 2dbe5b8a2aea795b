//! Client-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task.
//!
//! ## Ablauf
//! ```text
//! Handshake (Timeout, Shutdown) -> ClientId -> Registry + Vorstellung
//!     |
//!     v
//! Frame lesen -> entschluesseln -> Zustand verteilen   (Schleife)
//!     |
//!     v
//! EOF / Fehler / Shutdown -> Registry entfernen -> DISCONNECTED verteilen
//! ```
//!
//! Das Aufraeumen uebernimmt ein Drop-Guard (`Abmeldung`), damit auch ein
//! abgebrochener oder panischer Task seinen Eintrag entfernt.

use beacon_core::ClientId;
use beacon_crypto::{entschluesseln, server_handshake, ServerHandshake, ServerKeyPair, SessionKeys};
use beacon_protocol::FrameCodec;
use futures_util::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::codec::FramedRead;

use crate::broadcast::RelayBroadcaster;
use crate::error::{RelayError, RelayResult};
use crate::registry::ClientRecord;
use crate::server_state::RelayState;

// ---------------------------------------------------------------------------
// ClientConnection
// ---------------------------------------------------------------------------

/// Verarbeitet eine einzelne TCP-Verbindung
pub struct ClientConnection {
    state: Arc<RelayState>,
    peer_addr: SocketAddr,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection
    pub fn neu(state: Arc<RelayState>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Startet die Verbindungs-Verarbeitung
    ///
    /// Laeuft bis die Verbindung endet, ein Fehler auftritt oder ein
    /// Shutdown-Signal eingeht.
    pub async fn verarbeiten(self, mut stream: TcpStream, mut shutdown_rx: watch::Receiver<bool>) {
        let peer_addr = self.peer_addr;
        tracing::info!(peer = %peer_addr, "Neue Verbindung");

        let handshake = tokio::select! {
            ergebnis = self.handshake_durchfuehren(&mut stream) => ergebnis,
            _ = shutdown_abwarten(&mut shutdown_rx) => {
                tracing::info!(peer = %peer_addr, "Shutdown waehrend des Handshakes");
                return;
            }
        };

        let ServerHandshake {
            schluessel,
            udp_port,
        } = match handshake {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(peer = %peer_addr, fehler = %e, "Handshake fehlgeschlagen");
                return;
            }
        };

        let client_id = ClientId::new();
        let udp_adresse = SocketAddr::new(peer_addr.ip(), udp_port);
        let record = ClientRecord::neu(client_id, udp_adresse, schluessel.clone());

        let abmeldung = Abmeldung::neu(self.state.broadcaster.clone(), client_id);
        let bericht = self.state.broadcaster.vorstellen(record).await;

        tracing::info!(
            peer = %peer_addr,
            client_id = %client_id,
            udp = %udp_adresse,
            peers = bericht.versucht / 2,
            "Client verbunden"
        );

        self.nachrichten_schleife(stream, client_id, &schluessel, &mut shutdown_rx)
            .await;

        abmeldung.abmelden().await;
        tracing::info!(peer = %peer_addr, client_id = %client_id, "Verbindungs-Task beendet");
    }

    /// Schluessel erzeugen und Handshake mit Zeitlimit durchfuehren
    async fn handshake_durchfuehren(&self, stream: &mut TcpStream) -> RelayResult<ServerHandshake> {
        let config = &self.state.config;
        let timeout = config.handshake_timeout;

        let ablauf = async {
            let bits = config.rsa_bits;
            let schluesselpaar = tokio::task::spawn_blocking(move || ServerKeyPair::generieren(bits))
                .await
                .map_err(|e| RelayError::intern(format!("Schluessel-Task: {e}")))??;

            let handshake = server_handshake(
                stream,
                &schluesselpaar,
                &config.willkommen,
                config.max_frame_groesse,
            )
            .await?;
            Ok::<_, RelayError>(handshake)
        };

        tokio::time::timeout(timeout, ablauf)
            .await
            .map_err(|_| RelayError::HandshakeTimeout(timeout))?
    }

    /// Liest Frames bis EOF, Fehler oder Shutdown und verteilt jeden Zustand
    async fn nachrichten_schleife(
        &self,
        stream: TcpStream,
        client_id: ClientId,
        schluessel: &SessionKeys,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) {
        let peer_addr = self.peer_addr;
        let mut frames = FramedRead::new(
            stream,
            FrameCodec::with_max_size(self.state.config.max_frame_groesse),
        );

        loop {
            tokio::select! {
                frame = frames.next() => {
                    match frame {
                        Some(Ok(daten)) => {
                            let zustand = match entschluesseln(&daten, schluessel) {
                                Ok(text) => text,
                                Err(e) => {
                                    tracing::warn!(
                                        peer = %peer_addr,
                                        client_id = %client_id,
                                        fehler = %e,
                                        "Nachricht nicht entschluesselbar"
                                    );
                                    break;
                                }
                            };

                            tracing::debug!(client_id = %client_id, zustand = %zustand, "Zustand empfangen");

                            match self.state.broadcaster.aktualisieren(client_id, zustand).await {
                                Ok(bericht) if bericht.fehlgeschlagen > 0 => {
                                    tracing::debug!(
                                        client_id = %client_id,
                                        fehlgeschlagen = bericht.fehlgeschlagen,
                                        "Zustand nicht an alle zugestellt"
                                    );
                                }
                                Ok(_) => {}
                                Err(e) => {
                                    tracing::warn!(client_id = %client_id, fehler = %e, "Aktualisierung fehlgeschlagen");
                                    break;
                                }
                            }
                        }
                        Some(Err(e)) if e.ist_geschlossen() => {
                            tracing::info!(peer = %peer_addr, client_id = %client_id, "Verbindung mitten im Frame geschlossen");
                            break;
                        }
                        Some(Err(e)) => {
                            tracing::warn!(
                                peer = %peer_addr,
                                client_id = %client_id,
                                fehler = %e,
                                "Frame-Lesefehler"
                            );
                            break;
                        }
                        None => {
                            tracing::info!(peer = %peer_addr, client_id = %client_id, "Verbindung vom Client getrennt");
                            break;
                        }
                    }
                }

                _ = shutdown_abwarten(shutdown_rx) => {
                    tracing::info!(peer = %peer_addr, "Shutdown-Signal – Verbindung wird getrennt");
                    break;
                }
            }
        }
    }
}

/// Wartet bis das Shutdown-Signal `true` ist
///
/// Wird der Sender gedroppt, kommt kein Shutdown mehr.
async fn shutdown_abwarten(shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Abmeldung (Drop-Guard)
// ---------------------------------------------------------------------------

/// Entfernt einen Client beim Verbindungsende aus der Registry
///
/// Regulaer ueber `abmelden()`. Wird der Guard ohne Aufruf gedroppt
/// (Task abgebrochen oder Panic), wird der Eintrag sofort entfernt und die
/// Trennung in einem eigenen Task verteilt.
struct Abmeldung {
    broadcaster: RelayBroadcaster,
    client_id: ClientId,
    erledigt: bool,
}

impl Abmeldung {
    fn neu(broadcaster: RelayBroadcaster, client_id: ClientId) -> Self {
        Self {
            broadcaster,
            client_id,
            erledigt: false,
        }
    }

    async fn abmelden(mut self) {
        self.erledigt = true;
        match self.broadcaster.trennen(self.client_id).await {
            Ok(bericht) => {
                tracing::debug!(
                    client_id = %self.client_id,
                    benachrichtigt = bericht.zugestellt,
                    "Trennung verteilt"
                );
            }
            Err(e) => {
                tracing::debug!(client_id = %self.client_id, fehler = %e, "Bereits abgemeldet");
            }
        }
    }
}

impl Drop for Abmeldung {
    fn drop(&mut self) {
        if self.erledigt {
            return;
        }

        let Ok(verbleibend) = self.broadcaster.registry().entfernen(&self.client_id) else {
            return;
        };
        tracing::warn!(client_id = %self.client_id, "Verbindungs-Task abgebrochen – Client entfernt");

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let broadcaster = self.broadcaster.clone();
            let client_id = self.client_id;
            handle.spawn(async move {
                broadcaster.getrennt_verteilen(client_id, &verbleibend).await;
            });
        }
    }
}
