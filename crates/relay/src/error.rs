//! Fehlertypen fuer den Relay-Service

use beacon_core::ClientId;
use beacon_crypto::{CipherError, HandshakeError};
use beacon_protocol::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Fehler beim Zugriff auf die Client-Registry
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Kein Eintrag fuer diese ID (z.B. bereits entfernt)
    #[error("Client nicht gefunden: {0}")]
    NichtGefunden(ClientId),
}

/// Fehlertyp fuer den Relay-Service
#[derive(Debug, Error)]
pub enum RelayError {
    /// IO-Fehler (TCP, UDP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Handshake fehlgeschlagen
    #[error("Handshake fehlgeschlagen: {0}")]
    Handshake(#[from] HandshakeError),

    /// Handshake hat das Zeitlimit ueberschritten
    #[error("Handshake-Timeout nach {0:?}")]
    HandshakeTimeout(Duration),

    /// Frame-Fehler auf der Steuerverbindung
    #[error("Transportfehler: {0}")]
    Transport(#[from] TransportError),

    /// Nachricht konnte nicht entschluesselt werden
    #[error("Chiffre-Fehler: {0}")]
    Chiffre(#[from] CipherError),

    /// Registry-Fehler
    #[error("Registry-Fehler: {0}")]
    Registry(#[from] RegistryError),

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl RelayError {
    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}

/// Result-Typ fuer den Relay-Service
pub type RelayResult<T> = Result<T, RelayError>;
