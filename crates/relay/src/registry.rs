//! Client-Registry – Wer ist verbunden, wohin gehen die Datagramme?
//!
//! Die Registry haelt genau einen Eintrag pro aktiver Verbindung. Alle
//! Zugriffe laufen ueber einen einzigen Mutex; er wird nie ueber I/O
//! gehalten. Leser bekommen Kopien (`ClientSnapshot`), nie Referenzen.

use beacon_core::ClientId;
use beacon_crypto::SessionKeys;
use beacon_protocol::ZUSTAND_VERBUNDEN;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::RegistryError;

// ---------------------------------------------------------------------------
// ClientRecord
// ---------------------------------------------------------------------------

/// Registry-Eintrag eines verbundenen Clients
///
/// Schluessel und Adresse sind nach dem Anlegen unveraenderlich, nur
/// `letzter_zustand` wird ueber `ClientRegistry::aktualisieren` geaendert.
#[derive(Debug)]
pub struct ClientRecord {
    id: ClientId,
    udp_adresse: SocketAddr,
    schluessel: SessionKeys,
    letzter_zustand: String,
}

impl ClientRecord {
    /// Neuer Eintrag im Anfangszustand `CONNECTED`
    pub fn neu(id: ClientId, udp_adresse: SocketAddr, schluessel: SessionKeys) -> Self {
        Self {
            id,
            udp_adresse,
            schluessel,
            letzter_zustand: ZUSTAND_VERBUNDEN.to_string(),
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot {
            id: self.id,
            udp_adresse: self.udp_adresse,
            schluessel: self.schluessel.clone(),
            letzter_zustand: self.letzter_zustand.clone(),
        }
    }
}

/// Kopie eines Registry-Eintrags zu einem Zeitpunkt
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    pub id: ClientId,
    pub udp_adresse: SocketAddr,
    pub schluessel: SessionKeys,
    pub letzter_zustand: String,
}

// ---------------------------------------------------------------------------
// ClientRegistry
// ---------------------------------------------------------------------------

/// Thread-safe Registry aller verbundenen Clients
///
/// Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<Mutex<HashMap<ClientId, ClientRecord>>>,
}

impl ClientRegistry {
    /// Erstellt eine leere Registry
    pub fn neu() -> Self {
        Self::default()
    }

    /// Fuegt einen Eintrag hinzu
    ///
    /// Gibt die IDs zurueck, die unmittelbar vor dem Einfuegen registriert
    /// waren (ohne den neuen Client).
    pub fn hinzufuegen(&self, record: ClientRecord) -> Vec<ClientId> {
        let id = record.id;
        let mut clients = self.clients.lock();
        let vorhanden: Vec<ClientId> = clients.keys().copied().collect();
        clients.insert(id, record);
        drop(clients);

        tracing::debug!(client_id = %id, peers = vorhanden.len(), "Client registriert");
        vorhanden
    }

    /// Speichert einen neuen Zustand
    ///
    /// Gibt die IDs aller anderen Clients aus demselben kritischen Abschnitt
    /// zurueck.
    pub fn aktualisieren(
        &self,
        id: &ClientId,
        zustand: impl Into<String>,
    ) -> Result<Vec<ClientId>, RegistryError> {
        let mut clients = self.clients.lock();
        let record = clients
            .get_mut(id)
            .ok_or(RegistryError::NichtGefunden(*id))?;
        record.letzter_zustand = zustand.into();

        Ok(clients.keys().filter(|k| *k != id).copied().collect())
    }

    /// Entfernt einen Eintrag
    ///
    /// Gibt die verbleibenden IDs zurueck. `NichtGefunden` ist kein harter
    /// Fehler, sondern bedeutet: bereits entfernt.
    pub fn entfernen(&self, id: &ClientId) -> Result<Vec<ClientId>, RegistryError> {
        let mut clients = self.clients.lock();
        if clients.remove(id).is_none() {
            return Err(RegistryError::NichtGefunden(*id));
        }
        let verbleibend: Vec<ClientId> = clients.keys().copied().collect();
        drop(clients);

        tracing::debug!(client_id = %id, verbleibend = verbleibend.len(), "Client entfernt");
        Ok(verbleibend)
    }

    /// Gibt eine Kopie des Eintrags zurueck
    pub fn abrufen(&self, id: &ClientId) -> Option<ClientSnapshot> {
        self.clients.lock().get(id).map(ClientRecord::snapshot)
    }

    /// Kopien mehrerer Eintraege unter einem einzigen Lock
    ///
    /// Nicht mehr vorhandene IDs werden uebersprungen.
    pub fn abrufen_mehrere(&self, ids: &[ClientId]) -> Vec<ClientSnapshot> {
        let clients = self.clients.lock();
        ids.iter()
            .filter_map(|id| clients.get(id).map(ClientRecord::snapshot))
            .collect()
    }

    /// Alle registrierten IDs
    pub fn ids(&self) -> Vec<ClientId> {
        self.clients.lock().keys().copied().collect()
    }

    pub fn anzahl(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn ist_registriert(&self, id: &ClientId) -> bool {
        self.clients.lock().contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use std::net::{IpAddr, Ipv4Addr};

    fn test_record(port: u16) -> ClientRecord {
        ClientRecord::neu(
            ClientId::new(),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port),
            SessionKeys::generieren(&mut OsRng),
        )
    }

    #[test]
    fn hinzufuegen_liefert_vorherige_ids() {
        let registry = ClientRegistry::neu();

        let a = test_record(5000);
        let a_id = a.id();
        assert!(registry.hinzufuegen(a).is_empty());

        let b = test_record(5001);
        let b_id = b.id();
        assert_eq!(registry.hinzufuegen(b), vec![a_id]);

        let mut vorher = registry.hinzufuegen(test_record(5002));
        vorher.sort();
        let mut erwartet = vec![a_id, b_id];
        erwartet.sort();
        assert_eq!(vorher, erwartet);
        assert_eq!(registry.anzahl(), 3);
    }

    #[test]
    fn neuer_eintrag_ist_connected() {
        let registry = ClientRegistry::neu();
        let record = test_record(5000);
        let id = record.id();
        registry.hinzufuegen(record);

        let snapshot = registry.abrufen(&id).unwrap();
        assert_eq!(snapshot.letzter_zustand, "CONNECTED");
        assert_eq!(snapshot.udp_adresse.port(), 5000);
    }

    #[test]
    fn aktualisieren_speichert_zustand_und_liefert_andere() {
        let registry = ClientRegistry::neu();
        let a = test_record(5000);
        let b = test_record(5001);
        let (a_id, b_id) = (a.id(), b.id());
        registry.hinzufuegen(a);
        registry.hinzufuegen(b);

        let andere = registry.aktualisieren(&a_id, "hello").unwrap();
        assert_eq!(andere, vec![b_id]);
        assert_eq!(registry.abrufen(&a_id).unwrap().letzter_zustand, "hello");
        assert_eq!(registry.abrufen(&b_id).unwrap().letzter_zustand, "CONNECTED");
    }

    #[test]
    fn aktualisieren_unbekannter_client() {
        let registry = ClientRegistry::neu();
        let id = ClientId::new();
        assert_eq!(
            registry.aktualisieren(&id, "x"),
            Err(RegistryError::NichtGefunden(id))
        );
    }

    #[test]
    fn entfernen_liefert_verbleibende() {
        let registry = ClientRegistry::neu();
        let a = test_record(5000);
        let b = test_record(5001);
        let (a_id, b_id) = (a.id(), b.id());
        registry.hinzufuegen(a);
        registry.hinzufuegen(b);

        assert_eq!(registry.entfernen(&a_id).unwrap(), vec![b_id]);
        assert!(!registry.ist_registriert(&a_id));
        assert!(registry.abrufen(&a_id).is_none());
    }

    #[test]
    fn doppeltes_entfernen_ist_nicht_gefunden() {
        let registry = ClientRegistry::neu();
        let record = test_record(5000);
        let id = record.id();
        registry.hinzufuegen(record);

        assert!(registry.entfernen(&id).is_ok());
        assert_eq!(registry.entfernen(&id), Err(RegistryError::NichtGefunden(id)));
    }

    #[test]
    fn abrufen_mehrere_ueberspringt_fehlende() {
        let registry = ClientRegistry::neu();
        let record = test_record(5000);
        let id = record.id();
        registry.hinzufuegen(record);

        let snapshots = registry.abrufen_mehrere(&[id, ClientId::new()]);
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].id, id);
    }

    #[test]
    fn clone_teilt_inneren_zustand() {
        let registry = ClientRegistry::neu();
        let kopie = registry.clone();
        registry.hinzufuegen(test_record(5000));
        assert_eq!(kopie.anzahl(), 1);
        assert_eq!(kopie.ids(), registry.ids());
    }

    #[test]
    fn paralleles_hinzufuegen_und_entfernen() {
        let registry = ClientRegistry::neu();
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        let record = test_record(1000 + i * 100 + j);
                        let id = record.id();
                        registry.hinzufuegen(record);
                        registry.aktualisieren(&id, "x").unwrap();
                        registry.entfernen(&id).unwrap();
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(registry.anzahl(), 0);
    }
}
