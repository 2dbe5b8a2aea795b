//! Relay-Nachrichten fuer den UDP-Seitenkanal
//!
//! Jede Zustandsaenderung eines Clients wird als Klartext `<id>|<zustand>`
//! kodiert, pro Empfaenger verschluesselt und als einzelnes Datagramm
//! verschickt. Der Zustand darf selbst `|` enthalten; getrennt wird am
//! ersten Vorkommen.

use beacon_core::ClientId;

use crate::error::RelayMessageError;

/// Anfangszustand eines frisch verbundenen Clients
pub const ZUSTAND_VERBUNDEN: &str = "CONNECTED";

/// Zustand der beim Trennen eines Clients verteilt wird
pub const ZUSTAND_GETRENNT: &str = "DISCONNECTED";

/// Trennzeichen zwischen ID und Zustand
const TRENNZEICHEN: char = '|';

/// Eine Relay-Nachricht: Zustand eines Clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMessage {
    pub client_id: ClientId,
    pub zustand: String,
}

impl RelayMessage {
    pub fn neu(client_id: ClientId, zustand: impl Into<String>) -> Self {
        Self {
            client_id,
            zustand: zustand.into(),
        }
    }

    /// Nachricht fuer einen getrennten Client
    pub fn getrennt(client_id: ClientId) -> Self {
        Self::neu(client_id, ZUSTAND_GETRENNT)
    }

    /// Kodiert die Nachricht als Klartext `<id>|<zustand>`
    pub fn kodieren(&self) -> String {
        format!("{}{}{}", self.client_id, TRENNZEICHEN, self.zustand)
    }

    /// Dekodiert einen Klartext `<id>|<zustand>`
    pub fn dekodieren(text: &str) -> Result<Self, RelayMessageError> {
        let (id, zustand) = text
            .split_once(TRENNZEICHEN)
            .ok_or(RelayMessageError::TrennzeichenFehlt)?;

        let client_id = id
            .parse::<ClientId>()
            .map_err(|_| RelayMessageError::UngueltigeId(id.to_string()))?;

        Ok(Self::neu(client_id, zustand))
    }
}

impl std::fmt::Display for RelayMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.client_id, TRENNZEICHEN, self.zustand)
    }
}
