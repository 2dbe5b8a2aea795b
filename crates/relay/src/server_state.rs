//! Gemeinsamer Server-Zustand fuer den Relay-Service
//!
//! Haelt Konfiguration, Registry und Broadcaster als Arc-Referenzen, die
//! sicher zwischen tokio-Tasks geteilt werden koennen.

use beacon_crypto::MIN_RSA_BITS;
use beacon_protocol::wire::DEFAULT_MAX_FRAME_SIZE;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::broadcast::RelayBroadcaster;
use crate::registry::ClientRegistry;
use crate::udp::DatagramSender;

/// Konfiguration fuer den Relay-Service
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Willkommenstext, der nach dem Schluesselaustausch gesendet wird
    pub willkommen: String,
    /// Maximale gleichzeitige Verbindungen (inkl. laufender Handshakes)
    pub max_clients: usize,
    /// Groesse des RSA-Modulus pro Verbindung in Bit
    pub rsa_bits: usize,
    /// Zeitlimit fuer den gesamten Handshake
    pub handshake_timeout: Duration,
    /// Maximale Frame-Groesse auf der Steuerverbindung
    pub max_frame_groesse: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            willkommen: standard_willkommen(),
            max_clients: 512,
            rsa_bits: 2048,
            handshake_timeout: Duration::from_secs(30),
            max_frame_groesse: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl RelayConfig {
    /// Konfiguration fuer Tests (kleiner Schluessel, kurzes Timeout)
    pub fn fuer_tests() -> Self {
        Self {
            rsa_bits: MIN_RSA_BITS,
            handshake_timeout: Duration::from_secs(10),
            ..Self::default()
        }
    }
}

/// Standard-Willkommenstext inkl. Version
pub fn standard_willkommen() -> String {
    format!("Welcome to the Beacon relay v{}", env!("CARGO_PKG_VERSION"))
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct RelayState {
    /// Relay-Konfiguration
    pub config: Arc<RelayConfig>,
    /// Registry aller verbundenen Clients
    pub registry: ClientRegistry,
    /// Broadcaster (teilt die Registry)
    pub broadcaster: RelayBroadcaster,
    /// Startzeitpunkt des Servers
    pub start_time: Instant,
}

impl RelayState {
    /// Erstellt einen neuen RelayState
    pub fn neu(config: RelayConfig, sender: Arc<dyn DatagramSender>) -> Arc<Self> {
        let registry = ClientRegistry::neu();
        let broadcaster = RelayBroadcaster::neu(registry.clone(), sender);
        Arc::new(Self {
            config: Arc::new(config),
            registry,
            broadcaster,
            start_time: Instant::now(),
        })
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
