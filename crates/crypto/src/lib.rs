//! # beacon-crypto
//!
//! Hybrid-Verschluesselung fuer Beacon-Verbindungen.
//!
//! ## Module
//! - `handshake` - Schluesseltransport per RSA, Willkommen und UDP-Port
//! - `cipher` - AES-256-CBC Codec fuer einzelne Nachrichten
//! - `keys` - RSA-Schluesselpaar pro Verbindung
//! - `types` - Sitzungsschluessel und IV (werden beim Drop genullt)
//! - `error` - Fehlertypen

pub mod cipher;
pub mod error;
pub mod handshake;
pub mod keys;
pub mod types;

// Bequeme Re-Exports
pub use cipher::{entschluesseln, verschluesseln};
pub use error::{CipherError, HandshakeError, HandshakeResult};
pub use handshake::{
    client_handshake, client_handshake_mit, server_handshake, ClientHandshake, ServerHandshake,
};
pub use keys::{rsa_bits_pruefen, ServerKeyPair, ServerPublicKey, MAX_RSA_BITS, MIN_RSA_BITS};
pub use types::{SessionIv, SessionKey, SessionKeys};
