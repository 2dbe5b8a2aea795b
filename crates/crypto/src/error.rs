//! Fehlertypen fuer Handshake und Sitzungsverschluesselung

use beacon_protocol::TransportError;
use thiserror::Error;

/// Fehler beim Ver- oder Entschluesseln einer einzelnen Nachricht
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("Ungueltiges Padding")]
    UngueltigesPadding,

    #[error("Ungueltige Ciphertext-Laenge: {laenge} Bytes (Vielfaches von 16 erwartet)")]
    LaengeUngueltig { laenge: usize },

    #[error("Klartext ist kein gueltiges UTF-8")]
    KeinUtf8,
}

/// Fehler waehrend des Handshakes
///
/// Jeder dieser Fehler beendet die Verbindung, bevor ein Registry-Eintrag
/// entsteht. Es gibt keinen zweiten Versuch.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("Verbindung endete nach {erhalten} von {erwartet} Bytes")]
    KurzesLesen { erwartet: usize, erhalten: usize },

    #[error("RSA-Entschluesselung fehlgeschlagen: {0}")]
    Entschluesselung(String),

    #[error("RSA-Verschluesselung fehlgeschlagen: {0}")]
    Verschluesselung(String),

    #[error("Ungueltiger UDP-Port: '{0}'")]
    UngueltigerPort(String),

    #[error("Ungueltiger oeffentlicher Schluessel: {0}")]
    UngueltigerSchluessel(String),

    #[error("Schluessel-Generierung fehlgeschlagen: {0}")]
    SchluesselGenerierung(String),

    #[error("Nicht unterstuetzte RSA-Schluesselgroesse: {0} Bit")]
    UngueltigeSchluesselGroesse(usize),

    #[error("Transportfehler: {0}")]
    Transport(#[from] TransportError),

    #[error("Chiffre-Fehler: {0}")]
    Chiffre(#[from] CipherError),
}

pub type HandshakeResult<T> = Result<T, HandshakeError>;
