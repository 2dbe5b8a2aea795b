//! RSA-Schluesselpaare fuer den Handshake
//!
//! Der Server erzeugt pro Verbindung ein frisches Schluesselpaar. Der
//! oeffentliche Teil geht als zwei rohe Big-Endian Bloecke an den Client:
//! zuerst der Exponent (fest 3 Bytes), dann der Modulus (`bits / 8` Bytes).

use rand::rngs::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

use crate::error::{HandshakeError, HandshakeResult};
use crate::types::rechtsbuendig_kopieren;

/// Kleinste zulaessige Modulusgroesse in Bit
pub const MIN_RSA_BITS: usize = 1024;

/// Groesste zulaessige Modulusgroesse in Bit
pub const MAX_RSA_BITS: usize = 4096;

/// Laenge des Exponenten auf dem Draht (65537 = 0x01 0x00 0x01)
pub const EXPONENT_LAENGE: usize = 3;

/// Laenge des Modulus (und jedes RSA-Blocks) in Bytes
pub fn modulus_laenge(bits: usize) -> usize {
    bits / 8
}

/// Prueft eine konfigurierte Schluesselgroesse
pub fn rsa_bits_pruefen(bits: usize) -> HandshakeResult<()> {
    if bits < MIN_RSA_BITS || bits > MAX_RSA_BITS || bits % 8 != 0 {
        return Err(HandshakeError::UngueltigeSchluesselGroesse(bits));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ServerKeyPair
// ---------------------------------------------------------------------------

/// Privates Schluesselpaar einer einzelnen Verbindung
///
/// Die Erzeugung ist rechenintensiv und sollte nicht auf einem
/// Async-Worker laufen (`spawn_blocking`).
pub struct ServerKeyPair {
    privat: RsaPrivateKey,
    bits: usize,
}

impl ServerKeyPair {
    pub fn generieren(bits: usize) -> HandshakeResult<Self> {
        rsa_bits_pruefen(bits)?;
        let privat = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| HandshakeError::SchluesselGenerierung(e.to_string()))?;
        Ok(Self { privat, bits })
    }

    /// Laenge eines RSA-Blocks in Bytes
    pub fn block_laenge(&self) -> usize {
        modulus_laenge(self.bits)
    }

    /// Oeffentlicher Exponent, rechtsbuendig auf 3 Bytes
    pub fn exponent_bytes(&self) -> [u8; EXPONENT_LAENGE] {
        let mut ziel = [0u8; EXPONENT_LAENGE];
        rechtsbuendig_kopieren(&self.privat.e().to_bytes_be(), &mut ziel);
        ziel
    }

    /// Modulus, rechtsbuendig auf `bits / 8` Bytes
    pub fn modulus_bytes(&self) -> Vec<u8> {
        let mut ziel = vec![0u8; self.block_laenge()];
        rechtsbuendig_kopieren(&self.privat.n().to_bytes_be(), &mut ziel);
        ziel
    }

    /// Entschluesselt einen PKCS#1 v1.5 Block
    pub fn entschluesseln(&self, block: &[u8]) -> HandshakeResult<Zeroizing<Vec<u8>>> {
        self.privat
            .decrypt(Pkcs1v15Encrypt, block)
            .map(Zeroizing::new)
            .map_err(|e| HandshakeError::Entschluesselung(e.to_string()))
    }
}

impl std::fmt::Debug for ServerKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ServerKeyPair([REDACTED] {} bit)", self.bits)
    }
}

// ---------------------------------------------------------------------------
// ServerPublicKey
// ---------------------------------------------------------------------------

/// Oeffentlicher Schluessel des Servers aus Sicht des Clients
#[derive(Debug, Clone)]
pub struct ServerPublicKey {
    oeffentlich: RsaPublicKey,
    block_laenge: usize,
}

impl ServerPublicKey {
    /// Baut den Schluessel aus den rohen Bloecken des Handshakes
    pub fn aus_bytes(exponent: &[u8], modulus: &[u8]) -> HandshakeResult<Self> {
        let n = BigUint::from_bytes_be(modulus);
        let e = BigUint::from_bytes_be(exponent);
        let oeffentlich = RsaPublicKey::new(n, e)
            .map_err(|e| HandshakeError::UngueltigerSchluessel(e.to_string()))?;
        Ok(Self {
            oeffentlich,
            block_laenge: modulus.len(),
        })
    }

    /// Verschluesselt `daten` mit PKCS#1 v1.5, rechtsbuendig auf Blocklaenge
    pub fn verschluesseln(&self, daten: &[u8]) -> HandshakeResult<Vec<u8>> {
        let chiffre = self
            .oeffentlich
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, daten)
            .map_err(|e| HandshakeError::Verschluesselung(e.to_string()))?;

        let mut block = vec![0u8; self.block_laenge.max(self.oeffentlich.size())];
        rechtsbuendig_kopieren(&chiffre, &mut block);
        Ok(block)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::OnceLock;

    /// Ein 1024-Bit Schluesselpaar fuer alle Tests (Erzeugung ist teuer)
    pub(crate) fn test_schluesselpaar() -> &'static ServerKeyPair {
        static PAAR: OnceLock<ServerKeyPair> = OnceLock::new();
        PAAR.get_or_init(|| ServerKeyPair::generieren(MIN_RSA_BITS).unwrap())
    }

    #[test]
    fn bits_pruefen() {
        assert!(rsa_bits_pruefen(1024).is_ok());
        assert!(rsa_bits_pruefen(2048).is_ok());
        assert!(rsa_bits_pruefen(4096).is_ok());
        assert!(rsa_bits_pruefen(512).is_err());
        assert!(rsa_bits_pruefen(1025).is_err());
        assert!(rsa_bits_pruefen(8192).is_err());
    }

    #[test]
    fn modulus_laenge_in_bytes() {
        assert_eq!(modulus_laenge(1024), 128);
        assert_eq!(modulus_laenge(2048), 256);
    }

    #[test]
    fn exponent_ist_65537() {
        let paar = test_schluesselpaar();
        assert_eq!(paar.exponent_bytes(), [0x01, 0x00, 0x01]);
    }

    #[test]
    fn modulus_hat_blocklaenge() {
        let paar = test_schluesselpaar();
        let modulus = paar.modulus_bytes();
        assert_eq!(modulus.len(), 128);
        // Ein 1024-Bit Modulus hat das oberste Bit gesetzt
        assert!(modulus[0] & 0x80 != 0);
    }

    #[test]
    fn oeffentlich_verschluesseln_privat_entschluesseln() {
        let paar = test_schluesselpaar();
        let oeffentlich =
            ServerPublicKey::aus_bytes(&paar.exponent_bytes(), &paar.modulus_bytes()).unwrap();

        let block = oeffentlich.verschluesseln(b"sitzungsschluessel").unwrap();
        assert_eq!(block.len(), paar.block_laenge());

        let klar = paar.entschluesseln(&block).unwrap();
        assert_eq!(klar.as_slice(), b"sitzungsschluessel");
    }

    #[test]
    fn muell_block_wird_abgelehnt() {
        let paar = test_schluesselpaar();
        let block = vec![0xFFu8; paar.block_laenge()];
        assert!(matches!(
            paar.entschluesseln(&block),
            Err(HandshakeError::Entschluesselung(_))
        ));
    }

    #[test]
    fn zu_langer_klartext_ist_verschluesselungsfehler() {
        let paar = test_schluesselpaar();
        let oeffentlich =
            ServerPublicKey::aus_bytes(&paar.exponent_bytes(), &paar.modulus_bytes()).unwrap();

        // PKCS#1 v1.5 erlaubt hoechstens Blocklaenge - 11 Bytes
        let zu_lang = vec![0x42u8; paar.block_laenge()];
        assert!(matches!(
            oeffentlich.verschluesseln(&zu_lang),
            Err(HandshakeError::Verschluesselung(_))
        ));
    }

    #[test]
    fn exponent_eins_ist_ungueltig() {
        let paar = test_schluesselpaar();
        assert!(matches!(
            ServerPublicKey::aus_bytes(&[0x00, 0x00, 0x01], &paar.modulus_bytes()),
            Err(HandshakeError::UngueltigerSchluessel(_))
        ));
    }

    #[test]
    fn debug_verraet_keinen_privaten_schluessel() {
        let text = format!("{:?}", test_schluesselpaar());
        assert_eq!(text, "ServerKeyPair([REDACTED] 1024 bit)");
    }
}
