//! Sitzungsschluessel und IV einer Verbindung
//!
//! Beide werden genau einmal im Handshake festgelegt und danach fuer jede
//! Nachricht der Verbindung verwendet. Beim Drop werden sie genullt.

use rand::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Laenge des AES-256 Sitzungsschluessels in Bytes
pub const SESSION_KEY_LAENGE: usize = 32;

/// Laenge des IV in Bytes (eine AES-Blockgroesse)
pub const SESSION_IV_LAENGE: usize = 16;

/// AES-256 Sitzungsschluessel (wird beim Drop genullt)
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_LAENGE]);

impl SessionKey {
    pub fn aus_bytes(bytes: [u8; SESSION_KEY_LAENGE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_LAENGE] {
        &self.0
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionKey([REDACTED] {} bytes)", SESSION_KEY_LAENGE)
    }
}

/// CBC-Initialisierungsvektor (wird beim Drop genullt)
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionIv([u8; SESSION_IV_LAENGE]);

impl SessionIv {
    pub fn aus_bytes(bytes: [u8; SESSION_IV_LAENGE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SESSION_IV_LAENGE] {
        &self.0
    }
}

impl std::fmt::Debug for SessionIv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionIv([REDACTED] {} bytes)", SESSION_IV_LAENGE)
    }
}

/// Schluessel und IV einer Verbindung
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKeys {
    pub key: SessionKey,
    pub iv: SessionIv,
}

impl SessionKeys {
    pub fn neu(key: SessionKey, iv: SessionIv) -> Self {
        Self { key, iv }
    }

    /// Erzeugt frischen Schluessel und IV aus einem kryptografischen RNG
    pub fn generieren<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut key = [0u8; SESSION_KEY_LAENGE];
        let mut iv = [0u8; SESSION_IV_LAENGE];
        rng.fill_bytes(&mut key);
        rng.fill_bytes(&mut iv);

        let schluessel = Self::neu(SessionKey::aus_bytes(key), SessionIv::aus_bytes(iv));
        key.zeroize();
        iv.zeroize();
        schluessel
    }

    /// Baut Schluessel und IV aus RSA-entschluesselten Bytes
    ///
    /// Die entschluesselte Ausgabe kann kuerzer als der Zielpuffer sein,
    /// wenn die Gegenstelle fuehrende Null-Bytes weglaesst. Sie wird deshalb
    /// rechtsbuendig kopiert.
    pub fn aus_entschluesselt(iv: &[u8], key: &[u8]) -> Self {
        let mut key_buf = [0u8; SESSION_KEY_LAENGE];
        let mut iv_buf = [0u8; SESSION_IV_LAENGE];
        rechtsbuendig_kopieren(key, &mut key_buf);
        rechtsbuendig_kopieren(iv, &mut iv_buf);

        let schluessel = Self::neu(SessionKey::aus_bytes(key_buf), SessionIv::aus_bytes(iv_buf));
        key_buf.zeroize();
        iv_buf.zeroize();
        schluessel
    }
}

/// Kopiert `quelle` rechtsbuendig in `ziel`
///
/// Ist `quelle` kuerzer, wird der Kopf von `ziel` mit Nullen aufgefuellt.
/// Ist `quelle` laenger, werden nur die letzten `ziel.len()` Bytes uebernommen.
pub fn rechtsbuendig_kopieren(quelle: &[u8], ziel: &mut [u8]) {
    if quelle.len() >= ziel.len() {
        ziel.copy_from_slice(&quelle[quelle.len() - ziel.len()..]);
    } else {
        let versatz = ziel.len() - quelle.len();
        ziel[..versatz].fill(0);
        ziel[versatz..].copy_from_slice(quelle);
    }
}
