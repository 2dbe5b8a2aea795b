//! AES-256-CBC mit PKCS#7-Padding
//!
//! Alle Nachrichten einer Verbindung (TCP-Frames und UDP-Datagramme an
//! diesen Client) verwenden denselben Schluessel und denselben IV.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::error::CipherError;
use crate::types::SessionKeys;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES-Blockgroesse in Bytes
pub const BLOCK_GROESSE: usize = 16;

/// Verschluesselt einen UTF-8 Text
///
/// Die Ausgabe ist immer ein nicht-leeres Vielfaches der Blockgroesse,
/// auch fuer einen leeren Text.
pub fn verschluesseln(klartext: &str, schluessel: &SessionKeys) -> Vec<u8> {
    Aes256CbcEnc::new(
        schluessel.key.as_bytes().into(),
        schluessel.iv.as_bytes().into(),
    )
    .encrypt_padded_vec_mut::<Pkcs7>(klartext.as_bytes())
}

/// Entschluesselt einen Chiffretext zu einem UTF-8 Text
pub fn entschluesseln(chiffretext: &[u8], schluessel: &SessionKeys) -> Result<String, CipherError> {
    if chiffretext.is_empty() || chiffretext.len() % BLOCK_GROESSE != 0 {
        return Err(CipherError::LaengeUngueltig {
            laenge: chiffretext.len(),
        });
    }

    let klartext = Aes256CbcDec::new(
        schluessel.key.as_bytes().into(),
        schluessel.iv.as_bytes().into(),
    )
    .decrypt_padded_vec_mut::<Pkcs7>(chiffretext)
    .map_err(|_| CipherError::UngueltigesPadding)?;

    String::from_utf8(klartext).map_err(|_| CipherError::KeinUtf8)
}
