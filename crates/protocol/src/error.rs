//! Fehlertypen fuer Transport und Relay-Nachrichten

use std::io;
use thiserror::Error;

/// Fehler auf der TCP-Steuerverbindung
#[derive(Debug, Error)]
pub enum TransportError {
    /// Gegenstelle hat die Verbindung vor Abschluss eines Frames geschlossen
    #[error("Verbindung geschlossen")]
    VerbindungGeschlossen,

    /// Schreiben wurde nur teilweise ausgefuehrt (Socket nimmt keine Bytes mehr an)
    #[error("Teilweise Uebertragung")]
    TeilweiseUebertragung,

    /// Frame ueberschreitet die maximale Groesse
    #[error("Frame zu gross: {laenge} Bytes (Maximum: {maximum} Bytes)")]
    FrameZuGross { laenge: usize, maximum: usize },

    /// Sonstiger IO-Fehler
    #[error("IO-Fehler: {0}")]
    Io(io::Error),
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::VerbindungGeschlossen,
            io::ErrorKind::WriteZero => Self::TeilweiseUebertragung,
            _ => Self::Io(e),
        }
    }
}

impl TransportError {
    /// Gibt `true` zurueck wenn die Gegenstelle die Verbindung beendet hat
    pub fn ist_geschlossen(&self) -> bool {
        matches!(self, Self::VerbindungGeschlossen)
    }
}

/// Result-Typ fuer Transport-Operationen
pub type TransportResult<T> = Result<T, TransportError>;

/// Fehler beim Parsen einer Relay-Nachricht (`<id>|<zustand>`)
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayMessageError {
    #[error("Trennzeichen '|' fehlt")]
    TrennzeichenFehlt,

    #[error("Ungueltige Client-ID: {0}")]
    UngueltigeId(String),
}
