//! Beacon Server – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Server.

use anyhow::Result;
use beacon_observability::logging_initialisieren;
use beacon_server::{config::ServerConfig, port_aus_argumenten, Server};

#[tokio::main]
async fn main() -> Result<()> {
    // Optionaler TCP-Port als einziges Argument
    let port = port_aus_argumenten(std::env::args().skip(1))?;

    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("BEACON_CONFIG").unwrap_or_else(|_| "beacon.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let mut config = ServerConfig::laden(&config_pfad)?;
    if let Some(port) = port {
        config.netzwerk.tcp_port = port;
    }

    logging_initialisieren(&config.logging.level, &config.logging.format)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        tcp_port = config.netzwerk.tcp_port,
        "Beacon Server wird initialisiert"
    );

    Server::neu(config).starten().await
}
