//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable (hat Vorrang vor der Konfiguration):
//! - `BEACON_LOG_LEVEL`: Filter (z.B. `info` oder `beacon_relay=debug`)
//! - `BEACON_LOG_FORMAT`: Format (`text`/`json`)
//!
//! Ausgabe geht nach stderr, damit stdout frei fuer Programmausgaben bleibt.

use anyhow::{anyhow, bail};
use std::str::FromStr;
use tracing_subscriber::{fmt, EnvFilter};

/// Umgebungsvariable fuer den Log-Filter
pub const ENV_LOG_LEVEL: &str = "BEACON_LOG_LEVEL";

/// Umgebungsvariable fuer das Log-Format
pub const ENV_LOG_FORMAT: &str = "BEACON_LOG_FORMAT";

/// Ausgabeformat der Logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            anderes => bail!("Unbekanntes Log-Format '{anderes}' (erlaubt: text, json)"),
        }
    }
}

/// Initialisiert das Logging-System.
///
/// `BEACON_LOG_LEVEL` und `BEACON_LOG_FORMAT` ueberschreiben die Parameter.
/// Ein ungueltiger Filter faellt auf `info` zurueck, ein ungueltiges Format
/// ist ein Fehler.
pub fn logging_initialisieren(level: &str, format: &str) -> anyhow::Result<()> {
    let level = std::env::var(ENV_LOG_LEVEL).unwrap_or_else(|_| level.to_string());
    let format = std::env::var(ENV_LOG_FORMAT).unwrap_or_else(|_| format.to_string());

    let filter = filter_bauen(&level);
    let ergebnis = match format.parse::<LogFormat>()? {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init(),
    };

    ergebnis.map_err(|e| anyhow!("Logging konnte nicht initialisiert werden: {e}"))
}

/// Baut den Filter, faellt bei ungueltiger Angabe auf `info` zurueck
fn filter_bauen(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Validiert einen Log-Level oder eine Filter-Angabe wie `warn,beacon_relay=debug`
pub fn log_filter_gueltig(level: &str) -> bool {
    !level.trim().is_empty() && EnvFilter::try_new(level).is_ok()
}
