//! UDP-Seitenkanal – Versand der verschluesselten Relay-Datagramme
//!
//! Der Server haelt einen IPv4- und optional einen IPv6-Socket. Das Ziel
//! bestimmt den Socket: IPv4-gemappte IPv6-Adressen (Peers eines
//! Dual-Stack-Listeners) gehen ueber den IPv4-Socket.
//!
//! Die Zustellung ist best-effort: kein Ack, kein Retry, keine Reihenfolge.

use async_trait::async_trait;
use std::io;
use std::net::{SocketAddr, SocketAddrV4};
use tokio::net::UdpSocket;

/// Versendet einzelne Datagramme
///
/// Abstraktion ueber den UDP-Socket, damit die Broadcast-Logik ohne echtes
/// Netzwerk getestet werden kann.
#[async_trait]
pub trait DatagramSender: Send + Sync {
    /// Sendet `daten` an `ziel` und gibt die Anzahl gesendeter Bytes zurueck
    async fn datagramm_senden(&self, daten: &[u8], ziel: SocketAddr) -> io::Result<usize>;
}

// ---------------------------------------------------------------------------
// UdpDatagramSender
// ---------------------------------------------------------------------------

/// Datagramm-Sender ueber echte UDP-Sockets
pub struct UdpDatagramSender {
    v4: UdpSocket,
    v6: Option<UdpSocket>,
}

impl UdpDatagramSender {
    /// Bindet den IPv4-Socket und, falls angegeben, den IPv6-Socket
    ///
    /// Schlaegt nur das Binden des IPv6-Sockets fehl (z.B. IPv6 im System
    /// deaktiviert), laeuft der Sender ohne ihn weiter.
    pub async fn binden(v4_addr: SocketAddr, v6_addr: Option<SocketAddr>) -> io::Result<Self> {
        let v4 = UdpSocket::bind(v4_addr).await?;
        tracing::info!(addr = %v4.local_addr()?, "UDP-Sender (IPv4) gebunden");

        let v6 = match v6_addr {
            Some(addr) => match UdpSocket::bind(addr).await {
                Ok(socket) => {
                    tracing::info!(addr = %socket.local_addr()?, "UDP-Sender (IPv6) gebunden");
                    Some(socket)
                }
                Err(e) => {
                    tracing::warn!(
                        addr = %addr,
                        fehler = %e,
                        "IPv6-UDP-Socket nicht verfuegbar, nur IPv4"
                    );
                    None
                }
            },
            None => None,
        };

        Ok(Self { v4, v6 })
    }
}

/// Uebersetzt IPv4-gemappte IPv6-Ziele in reine IPv4-Adressen
pub fn ziel_normalisieren(ziel: SocketAddr) -> SocketAddr {
    match ziel {
        SocketAddr::V6(v6) => match v6.ip().to_ipv4_mapped() {
            Some(v4) => SocketAddr::V4(SocketAddrV4::new(v4, v6.port())),
            None => ziel,
        },
        SocketAddr::V4(_) => ziel,
    }
}

#[async_trait]
impl DatagramSender for UdpDatagramSender {
    async fn datagramm_senden(&self, daten: &[u8], ziel: SocketAddr) -> io::Result<usize> {
        match ziel_normalisieren(ziel) {
            ziel @ SocketAddr::V4(_) => self.v4.send_to(daten, ziel).await,
            ziel @ SocketAddr::V6(_) => match &self.v6 {
                Some(socket) => socket.send_to(daten, ziel).await,
                None => Err(io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    "kein IPv6-UDP-Socket gebunden",
                )),
            },
        }
    }
}
