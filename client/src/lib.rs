//! beacon-client – Client-Seite des Beacon-Protokolls
//!
//! Handshake, Senden des eigenen Zustands und Empfang der Relay-Nachrichten
//! anderer Clients. Das Binary `beacon-client` ist eine einfache Konsole
//! darauf.

pub mod connection;

pub use connection::{ClientConfig, ClientError, RelayClient};

use anyhow::{Context, Result};

/// Aufruf-Hilfe fuer die Kommandozeile
pub const AUFRUF: &str = "Aufruf: beacon-client <host> <port> [udp_port]";

/// Kommandozeilen-Argumente des Clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aufruf {
    pub host: String,
    pub port: u16,
    /// 0 = vom Betriebssystem gewaehlt
    pub udp_port: u16,
}

impl Aufruf {
    /// Parst die Argumente (ohne Programmname)
    pub fn aus_argumenten<I>(argumente: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let argumente: Vec<String> = argumente.into_iter().collect();
        let (host, port, udp_port) = match argumente.as_slice() {
            [host, port] => (host, port, None),
            [host, port, udp_port] => (host, port, Some(udp_port)),
            _ => anyhow::bail!("Falsche Anzahl Argumente\n{AUFRUF}"),
        };

        let port = port
            .parse()
            .with_context(|| format!("Ungueltiger Port '{port}'\n{AUFRUF}"))?;
        let udp_port = match udp_port {
            Some(p) => p
                .parse()
                .with_context(|| format!("Ungueltiger UDP-Port '{p}'\n{AUFRUF}"))?,
            None => 0,
        };

        Ok(Self {
            host: host.clone(),
            port,
            udp_port,
        })
    }
}
