//! Client-seitige Verbindung zum Beacon-Relay
//!
//! Nach dem Handshake laeuft die TCP-Verbindung nur noch in eine Richtung:
//! der Client schickt verschluesselte Frames mit seinem Zustand. Die Zustaende
//! der anderen Clients kommen als Datagramme auf dem eigenen UDP-Socket an.

use beacon_crypto::{client_handshake, entschluesseln, verschluesseln, HandshakeError, SessionKeys};
use beacon_protocol::wire::DEFAULT_MAX_FRAME_SIZE;
use beacon_protocol::{FrameCodec, RelayMessage, TransportError};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

/// Groesse der Empfangs-Queue fuer Relay-Nachrichten
const EMPFANGS_QUEUE_GROESSE: usize = 256;

/// Maximale Datagrammgroesse
const UDP_PUFFER_GROESSE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Fehler-Typ
// ---------------------------------------------------------------------------

/// Fehler die bei der Server-Verbindung auftreten koennen
#[derive(Debug, Error)]
pub enum ClientError {
    /// TCP- oder UDP-Fehler
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Handshake fehlgeschlagen
    #[error("Handshake fehlgeschlagen: {0}")]
    Handshake(#[from] HandshakeError),

    /// Frame konnte nicht gesendet werden
    #[error("Transportfehler: {0}")]
    Transport(#[from] TransportError),
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Parameter, die der Client vorab kennen muss
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// RSA-Modulusgroesse des Servers in Bit
    pub rsa_bits: usize,
    /// Maximale Frame-Groesse
    pub max_frame_groesse: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rsa_bits: 2048,
            max_frame_groesse: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// RelayClient
// ---------------------------------------------------------------------------

/// Verbindung zum Relay-Server
pub struct RelayClient {
    framed: Framed<TcpStream, FrameCodec>,
    schluessel: Arc<SessionKeys>,
    willkommen: String,
    udp_adresse: SocketAddr,
    empfangs_task: JoinHandle<()>,
}

impl RelayClient {
    /// Verbindet sich mit dem Server und fuehrt den Handshake durch
    ///
    /// `udp_port = 0` laesst das Betriebssystem einen Port waehlen. Der
    /// UDP-Socket wird in der Adressfamilie der TCP-Verbindung gebunden.
    ///
    /// Gibt den Client und die Queue der empfangenen Relay-Nachrichten zurueck.
    pub async fn verbinden(
        host: &str,
        port: u16,
        udp_port: u16,
        config: &ClientConfig,
    ) -> Result<(Self, mpsc::Receiver<RelayMessage>), ClientError> {
        tracing::info!(host = %host, port, "Verbinde mit Server");
        let mut stream = TcpStream::connect((host, port)).await?;
        let server_addr = stream.peer_addr()?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(fehler = %e, "TCP_NODELAY nicht gesetzt");
        }

        let lokale_ip = match server_addr {
            SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        let udp = UdpSocket::bind(SocketAddr::new(lokale_ip, udp_port)).await?;
        let udp_adresse = udp.local_addr()?;

        let handshake = client_handshake(
            &mut stream,
            config.rsa_bits,
            udp_adresse.port(),
            config.max_frame_groesse,
        )
        .await?;

        tracing::info!(
            server = %server_addr,
            udp = %udp_adresse,
            "Handshake abgeschlossen"
        );

        let schluessel = Arc::new(handshake.schluessel);
        let (empfang_tx, empfang_rx) = mpsc::channel(EMPFANGS_QUEUE_GROESSE);
        let empfangs_task = tokio::spawn(empfangs_schleife(
            udp,
            Arc::clone(&schluessel),
            empfang_tx,
        ));

        let client = Self {
            framed: Framed::new(stream, FrameCodec::with_max_size(config.max_frame_groesse)),
            schluessel,
            willkommen: handshake.willkommen,
            udp_adresse,
            empfangs_task,
        };
        Ok((client, empfang_rx))
    }

    /// Willkommenstext des Servers
    pub fn willkommen(&self) -> &str {
        &self.willkommen
    }

    /// Lokale Adresse des UDP-Sockets
    pub fn udp_adresse(&self) -> SocketAddr {
        self.udp_adresse
    }

    /// Sendet einen neuen Zustand an den Server
    pub async fn senden(&mut self, zustand: &str) -> Result<(), ClientError> {
        let chiffre = verschluesseln(zustand, &self.schluessel);
        self.framed.send(Bytes::from(chiffre)).await?;
        Ok(())
    }

    /// Wartet bis der Server die Verbindung schliesst
    ///
    /// Der Server sendet nach dem Handshake keine Frames mehr; alles was
    /// trotzdem ankommt wird verworfen.
    pub async fn server_geschlossen(&mut self) {
        loop {
            match self.framed.next().await {
                Some(Ok(_)) => {
                    tracing::debug!("Unerwarteter Frame vom Server verworfen");
                }
                Some(Err(e)) => {
                    tracing::debug!(fehler = %e, "Verbindung zum Server unterbrochen");
                    return;
                }
                None => return,
            }
        }
    }

    /// Schliesst die Verbindung sauber
    pub async fn trennen(mut self) -> Result<(), ClientError> {
        self.framed.close().await?;
        self.empfangs_task.abort();
        Ok(())
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        self.empfangs_task.abort();
    }
}

/// Empfaengt Datagramme, entschluesselt sie und reicht sie weiter
///
/// Unlesbare Datagramme werden geloggt und verworfen.
async fn empfangs_schleife(
    udp: UdpSocket,
    schluessel: Arc<SessionKeys>,
    empfang_tx: mpsc::Sender<RelayMessage>,
) {
    let mut puffer = vec![0u8; UDP_PUFFER_GROESSE];

    loop {
        let (n, absender) = match udp.recv_from(&mut puffer).await {
            Ok(ergebnis) => ergebnis,
            Err(e) => {
                tracing::warn!(fehler = %e, "UDP-Empfangsfehler");
                continue;
            }
        };

        let nachricht = entschluesseln(&puffer[..n], &schluessel)
            .map_err(|e| e.to_string())
            .and_then(|text| RelayMessage::dekodieren(&text).map_err(|e| e.to_string()));

        match nachricht {
            Ok(nachricht) => {
                if empfang_tx.send(nachricht).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(absender = %absender, fehler = %e, "Datagramm verworfen");
            }
        }
    }

    tracing::debug!("Empfangs-Task beendet");
}
