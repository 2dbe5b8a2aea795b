//! beacon-relay – TCP-Relay mit UDP-Seitenkanal
//!
//! Dieser Crate implementiert den eigentlichen Relay-Dienst: Verbindungen
//! annehmen, Handshake durchfuehren, Zustaende empfangen und an alle anderen
//! Clients verteilen.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (RelayServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |  Handshake -> Nachrichten-Schleife -> Abmeldung
//!     |
//!     v
//! RelayBroadcaster
//!     |
//!     +-- ClientRegistry    (ein Mutex, Snapshots)
//!     +-- DatagramSender    (UDP, best-effort)
//! ```

pub mod broadcast;
pub mod connection;
pub mod error;
pub mod registry;
pub mod server_state;
pub mod tcp;
pub mod udp;

// Bequeme Re-Exporte
pub use broadcast::{BroadcastBericht, RelayBroadcaster};
pub use connection::ClientConnection;
pub use error::{RegistryError, RelayError, RelayResult};
pub use registry::{ClientRecord, ClientRegistry, ClientSnapshot};
pub use server_state::{RelayConfig, RelayState};
pub use tcp::RelayServer;
pub use udp::{DatagramSender, UdpDatagramSender};
