//! beacon-protocol – Netzwerkprotokoll-Definitionen
//!
//! Dieses Crate definiert das Wire-Format der TCP-Steuerverbindung
//! (laengen-praefixierte Frames) und das Format der Relay-Nachrichten,
//! die ueber den UDP-Seitenkanal verteilt werden.

pub mod error;
pub mod relay;
pub mod wire;

pub use error::{RelayMessageError, TransportError, TransportResult};
pub use relay::{RelayMessage, ZUSTAND_GETRENNT, ZUSTAND_VERBUNDEN};
pub use wire::{read_frame, write_frame, FrameCodec};
