//! Identifikationstypen fuer Beacon
//!
//! IDs verwenden das Newtype-Pattern um Verwechslungen mit anderen
//! UUIDs zur Compilezeit auszuschliessen.

use uuid::Uuid;

/// Eindeutige ID einer Client-Verbindung
///
/// Wird nach erfolgreichem Handshake erzeugt und waehrend der Laufzeit des
/// Prozesses nie wiederverwendet (UUID v4). Auf dem Draht erscheint sie als
/// UUID mit Bindestrichen in Kleinbuchstaben.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Erstellt eine neue zufaellige ClientId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl std::str::FromStr for ClientId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}
