//! Relay-Broadcaster – Verteilt Zustandsaenderungen an alle anderen Clients
//!
//! Jede Runde verschluesselt `<id>|<zustand>` pro Empfaenger mit dessen
//! Sitzungsschluessel und schickt es als einzelnes Datagramm los.
//!
//! ## Runden
//! - Verbinden (`vorstellen`): neuer Client und jeder bestehende Peer lernen
//!   sich gegenseitig kennen
//! - Aktualisieren (`aktualisieren`): neuer Zustand an alle anderen
//! - Trennen (`trennen`): `DISCONNECTED` an alle verbleibenden
//!
//! Ein fehlgeschlagener Versand wird geloggt und uebersprungen. Er bricht
//! die Runde nie ab und beruehrt keine TCP-Verbindung.

use beacon_core::ClientId;
use beacon_crypto::verschluesseln;
use beacon_protocol::RelayMessage;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::registry::{ClientRecord, ClientRegistry, ClientSnapshot};
use crate::udp::DatagramSender;

// ---------------------------------------------------------------------------
// BroadcastBericht
// ---------------------------------------------------------------------------

/// Ergebnis einer Broadcast-Runde
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastBericht {
    pub versucht: usize,
    pub zugestellt: usize,
    pub fehlgeschlagen: usize,
}

impl BroadcastBericht {
    fn erfassen(&mut self, erfolgreich: bool) {
        self.versucht += 1;
        if erfolgreich {
            self.zugestellt += 1;
        } else {
            self.fehlgeschlagen += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// RelayBroadcaster
// ---------------------------------------------------------------------------

/// Verbindet Registry und Datagramm-Sender
///
/// Clone teilt Registry und Sender.
#[derive(Clone)]
pub struct RelayBroadcaster {
    registry: ClientRegistry,
    sender: Arc<dyn DatagramSender>,
}

impl RelayBroadcaster {
    pub fn neu(registry: ClientRegistry, sender: Arc<dyn DatagramSender>) -> Self {
        Self { registry, sender }
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Registriert einen Client und stellt ihn allen bestehenden Peers vor
    ///
    /// Jeder Peer bekommt den Zustand des neuen Clients, der neue Client
    /// bekommt den aktuellen Zustand jedes Peers.
    pub async fn vorstellen(&self, record: ClientRecord) -> BroadcastBericht {
        let id = record.id();
        let peers = self.registry.hinzufuegen(record);
        let mut bericht = BroadcastBericht::default();

        let Some(neu) = self.registry.abrufen(&id) else {
            // Bereits wieder entfernt, niemand muss ihn kennenlernen
            return bericht;
        };
        let an_peers = RelayMessage::neu(id, neu.letzter_zustand.clone()).kodieren();

        for peer in self.registry.abrufen_mehrere(&peers) {
            bericht.erfassen(self.senden(&an_peers, &peer).await);

            let an_neu = RelayMessage::neu(peer.id, peer.letzter_zustand.clone()).kodieren();
            bericht.erfassen(self.senden(&an_neu, &neu).await);
        }

        tracing::debug!(
            client_id = %id,
            versucht = bericht.versucht,
            fehlgeschlagen = bericht.fehlgeschlagen,
            "Client vorgestellt"
        );
        bericht
    }

    /// Speichert den neuen Zustand und verteilt ihn an alle anderen
    pub async fn aktualisieren(
        &self,
        id: ClientId,
        zustand: String,
    ) -> Result<BroadcastBericht, RegistryError> {
        let andere = self.registry.aktualisieren(&id, zustand.as_str())?;
        let klartext = RelayMessage::neu(id, zustand).kodieren();

        let mut bericht = BroadcastBericht::default();
        for peer in self.registry.abrufen_mehrere(&andere) {
            bericht.erfassen(self.senden(&klartext, &peer).await);
        }
        Ok(bericht)
    }

    /// Entfernt einen Client und meldet `DISCONNECTED` an alle verbleibenden
    ///
    /// `NichtGefunden` heisst: bereits entfernt, es wird nichts verteilt.
    pub async fn trennen(&self, id: ClientId) -> Result<BroadcastBericht, RegistryError> {
        let verbleibend = self.registry.entfernen(&id)?;
        Ok(self.getrennt_verteilen(id, &verbleibend).await)
    }

    /// Meldet `DISCONNECTED` fuer einen bereits entfernten Client
    pub async fn getrennt_verteilen(
        &self,
        id: ClientId,
        verbleibend: &[ClientId],
    ) -> BroadcastBericht {
        let klartext = RelayMessage::getrennt(id).kodieren();

        let mut bericht = BroadcastBericht::default();
        for peer in self.registry.abrufen_mehrere(verbleibend) {
            bericht.erfassen(self.senden(&klartext, &peer).await);
        }
        bericht
    }

    /// Verschluesselt fuer einen Empfaenger und versendet ein Datagramm
    async fn senden(&self, klartext: &str, empfaenger: &ClientSnapshot) -> bool {
        let daten = verschluesseln(klartext, &empfaenger.schluessel);

        match self
            .sender
            .datagramm_senden(&daten, empfaenger.udp_adresse)
            .await
        {
            Ok(n) if n == daten.len() => {
                tracing::trace!(
                    client_id = %empfaenger.id,
                    ziel = %empfaenger.udp_adresse,
                    bytes = n,
                    "Relay-Datagramm gesendet"
                );
                true
            }
            Ok(n) => {
                tracing::warn!(
                    client_id = %empfaenger.id,
                    ziel = %empfaenger.udp_adresse,
                    gesendet = n,
                    erwartet = daten.len(),
                    "Relay-Datagramm nur teilweise gesendet"
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    client_id = %empfaenger.id,
                    ziel = %empfaenger.udp_adresse,
                    fehler = %e,
                    "UDP-Sendefehler"
                );
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use beacon_crypto::{entschluesseln, SessionKeys};
    use parking_lot::Mutex;
    use rand::rngs::OsRng;
    use std::collections::HashSet;
    use std::io;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    /// Sammelt alle Datagramme, schlaegt fuer ausgewaehlte Ziele fehl
    #[derive(Default)]
    struct MockSender {
        gesendet: Mutex<Vec<(SocketAddr, Vec<u8>)>>,
        fehlerhaft: Mutex<HashSet<SocketAddr>>,
        abgeschnitten: Mutex<HashSet<SocketAddr>>,
    }

    #[async_trait]
    impl DatagramSender for MockSender {
        async fn datagramm_senden(&self, daten: &[u8], ziel: SocketAddr) -> io::Result<usize> {
            if self.fehlerhaft.lock().contains(&ziel) {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "unerreichbar"));
            }
            self.gesendet.lock().push((ziel, daten.to_vec()));
            if self.abgeschnitten.lock().contains(&ziel) {
                return Ok(daten.len() - 1);
            }
            Ok(daten.len())
        }
    }

    struct TestClient {
        id: ClientId,
        adresse: SocketAddr,
        schluessel: SessionKeys,
    }

    impl TestClient {
        fn neu(port: u16) -> Self {
            Self {
                id: ClientId::new(),
                adresse: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port),
                schluessel: SessionKeys::generieren(&mut OsRng),
            }
        }

        fn record(&self) -> ClientRecord {
            ClientRecord::neu(self.id, self.adresse, self.schluessel.clone())
        }

        /// Alle an diesen Client gesendeten Nachrichten, entschluesselt
        fn empfangen(&self, sender: &MockSender) -> Vec<RelayMessage> {
            sender
                .gesendet
                .lock()
                .iter()
                .filter(|(ziel, _)| *ziel == self.adresse)
                .map(|(_, daten)| {
                    let text = entschluesseln(daten, &self.schluessel).unwrap();
                    RelayMessage::dekodieren(&text).unwrap()
                })
                .collect()
        }
    }

    fn aufbau() -> (RelayBroadcaster, Arc<MockSender>) {
        let sender = Arc::new(MockSender::default());
        let broadcaster = RelayBroadcaster::neu(ClientRegistry::neu(), sender.clone());
        (broadcaster, sender)
    }

    fn enthaelt_genau_einmal(nachrichten: &[RelayMessage], id: ClientId, zustand: &str) -> bool {
        nachrichten
            .iter()
            .filter(|n| n.client_id == id && n.zustand == zustand)
            .count()
            == 1
    }

    #[tokio::test]
    async fn erster_client_sendet_nichts() {
        let (broadcaster, sender) = aufbau();
        let a = TestClient::neu(5000);

        let bericht = broadcaster.vorstellen(a.record()).await;
        assert_eq!(bericht, BroadcastBericht::default());
        assert!(sender.gesendet.lock().is_empty());
    }

    #[tokio::test]
    async fn vorstellung_ist_vollstaendig_und_einmalig() {
        let (broadcaster, sender) = aufbau();
        let a = TestClient::neu(5000);
        let b = TestClient::neu(5001);
        let c = TestClient::neu(5002);

        broadcaster.vorstellen(a.record()).await;
        let bericht_b = broadcaster.vorstellen(b.record()).await;
        let bericht_c = broadcaster.vorstellen(c.record()).await;

        assert_eq!(bericht_b.versucht, 2);
        assert_eq!(bericht_c.versucht, 4);
        assert_eq!(sender.gesendet.lock().len(), 6);

        let bei_a = a.empfangen(&sender);
        assert_eq!(bei_a.len(), 2);
        assert!(enthaelt_genau_einmal(&bei_a, b.id, "CONNECTED"));
        assert!(enthaelt_genau_einmal(&bei_a, c.id, "CONNECTED"));

        let bei_b = b.empfangen(&sender);
        assert_eq!(bei_b.len(), 2);
        assert!(enthaelt_genau_einmal(&bei_b, a.id, "CONNECTED"));
        assert!(enthaelt_genau_einmal(&bei_b, c.id, "CONNECTED"));

        let bei_c = c.empfangen(&sender);
        assert_eq!(bei_c.len(), 2);
        assert!(enthaelt_genau_einmal(&bei_c, a.id, "CONNECTED"));
        assert!(enthaelt_genau_einmal(&bei_c, b.id, "CONNECTED"));
    }

    #[tokio::test]
    async fn neuer_client_lernt_letzten_zustand() {
        let (broadcaster, sender) = aufbau();
        let a = TestClient::neu(5000);
        let b = TestClient::neu(5001);

        broadcaster.vorstellen(a.record()).await;
        broadcaster.aktualisieren(a.id, "busy".into()).await.unwrap();
        broadcaster.vorstellen(b.record()).await;

        let bei_b = b.empfangen(&sender);
        assert_eq!(bei_b, vec![RelayMessage::neu(a.id, "busy")]);
    }

    #[tokio::test]
    async fn aktualisierung_geht_an_alle_anderen() {
        let (broadcaster, sender) = aufbau();
        let a = TestClient::neu(5000);
        let b = TestClient::neu(5001);
        let c = TestClient::neu(5002);
        for client in [&a, &b, &c] {
            broadcaster.vorstellen(client.record()).await;
        }
        sender.gesendet.lock().clear();

        let bericht = broadcaster
            .aktualisieren(a.id, "hello".into())
            .await
            .unwrap();
        assert_eq!(
            bericht,
            BroadcastBericht {
                versucht: 2,
                zugestellt: 2,
                fehlgeschlagen: 0
            }
        );

        assert!(a.empfangen(&sender).is_empty());
        assert_eq!(b.empfangen(&sender), vec![RelayMessage::neu(a.id, "hello")]);
        assert_eq!(c.empfangen(&sender), vec![RelayMessage::neu(a.id, "hello")]);
    }

    #[tokio::test]
    async fn trennung_wird_an_verbleibende_gemeldet() {
        let (broadcaster, sender) = aufbau();
        let a = TestClient::neu(5000);
        let b = TestClient::neu(5001);
        let c = TestClient::neu(5002);
        for client in [&a, &b, &c] {
            broadcaster.vorstellen(client.record()).await;
        }
        sender.gesendet.lock().clear();

        let bericht = broadcaster.trennen(b.id).await.unwrap();
        assert_eq!(bericht.zugestellt, 2);

        assert_eq!(a.empfangen(&sender), vec![RelayMessage::getrennt(b.id)]);
        assert_eq!(c.empfangen(&sender), vec![RelayMessage::getrennt(b.id)]);
        assert!(b.empfangen(&sender).is_empty());
        assert!(!broadcaster.registry().ist_registriert(&b.id));

        // Zweites Trennen verteilt nichts
        assert_eq!(
            broadcaster.trennen(b.id).await,
            Err(RegistryError::NichtGefunden(b.id))
        );
        assert_eq!(sender.gesendet.lock().len(), 2);
    }

    #[tokio::test]
    async fn aktualisieren_nach_trennung_ist_nicht_gefunden() {
        let (broadcaster, _sender) = aufbau();
        let a = TestClient::neu(5000);
        broadcaster.vorstellen(a.record()).await;
        broadcaster.trennen(a.id).await.unwrap();

        assert_eq!(
            broadcaster.aktualisieren(a.id, "x".into()).await,
            Err(RegistryError::NichtGefunden(a.id))
        );
    }

    #[tokio::test]
    async fn fehlerhafter_peer_bricht_runde_nicht_ab() {
        let (broadcaster, sender) = aufbau();
        let a = TestClient::neu(5000);
        let b = TestClient::neu(5001);
        let c = TestClient::neu(5002);
        for client in [&a, &b, &c] {
            broadcaster.vorstellen(client.record()).await;
        }
        sender.gesendet.lock().clear();
        sender.fehlerhaft.lock().insert(b.adresse);

        let bericht = broadcaster
            .aktualisieren(a.id, "hello".into())
            .await
            .unwrap();
        assert_eq!(
            bericht,
            BroadcastBericht {
                versucht: 2,
                zugestellt: 1,
                fehlgeschlagen: 1
            }
        );
        assert_eq!(c.empfangen(&sender), vec![RelayMessage::neu(a.id, "hello")]);

        // Der Zustand ist trotzdem gespeichert
        let snapshot = broadcaster.registry().abrufen(&a.id).unwrap();
        assert_eq!(snapshot.letzter_zustand, "hello");
    }

    #[tokio::test]
    async fn teilweiser_versand_zaehlt_als_fehlschlag() {
        let (broadcaster, sender) = aufbau();
        let a = TestClient::neu(5000);
        let b = TestClient::neu(5001);
        broadcaster.vorstellen(a.record()).await;
        broadcaster.vorstellen(b.record()).await;
        sender.abgeschnitten.lock().insert(b.adresse);

        let bericht = broadcaster.aktualisieren(a.id, "x".into()).await.unwrap();
        assert_eq!(bericht.fehlgeschlagen, 1);
        assert_eq!(bericht.zugestellt, 0);
    }

    #[tokio::test]
    async fn jeder_empfaenger_hat_eigenen_chiffretext() {
        let (broadcaster, sender) = aufbau();
        let a = TestClient::neu(5000);
        let b = TestClient::neu(5001);
        let c = TestClient::neu(5002);
        for client in [&a, &b, &c] {
            broadcaster.vorstellen(client.record()).await;
        }
        sender.gesendet.lock().clear();

        broadcaster.aktualisieren(a.id, "hello".into()).await.unwrap();

        let gesendet = sender.gesendet.lock();
        assert_eq!(gesendet.len(), 2);
        assert_ne!(gesendet[0].1, gesendet[1].1);
        // Mit fremdem Schluessel nicht lesbar
        let fremd = gesendet.iter().find(|(ziel, _)| *ziel == b.adresse).unwrap();
        assert_ne!(
            entschluesseln(&fremd.1, &c.schluessel).ok(),
            Some(format!("{}|hello", a.id))
        );
    }
}
