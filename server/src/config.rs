//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use anyhow::Context;
use beacon_crypto::rsa_bits_pruefen;
use beacon_observability::{log_filter_gueltig, LogFormat};
use beacon_protocol::wire::DEFAULT_MAX_FRAME_SIZE;
use beacon_relay::RelayConfig;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Schluessel und Limits der Steuerverbindung
    pub sicherheit: SicherheitsEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers (nur fuer Logs)
    pub name: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen
    pub max_clients: usize,
    /// Eigener Willkommenstext (leer = Standardtext mit Version)
    pub willkommen: Option<String>,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Beacon Relay".into(),
            max_clients: 512,
            willkommen: None,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer den TCP-Listener ("::" = Dual-Stack)
    pub bind_adresse: String,
    /// Port fuer den TCP-Listener
    pub tcp_port: u16,
    /// Lokale Adresse des IPv4-UDP-Senders
    pub udp_bind_v4: String,
    /// Lokale Adresse des IPv6-UDP-Senders (leer = kein IPv6)
    pub udp_bind_v6: Option<String>,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "::".into(),
            tcp_port: 9987,
            udp_bind_v4: "0.0.0.0:0".into(),
            udp_bind_v6: Some("[::]:0".into()),
        }
    }
}

/// Schluessel und Limits der Steuerverbindung
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SicherheitsEinstellungen {
    /// RSA-Modulusgroesse pro Verbindung (mindestens 1024)
    pub rsa_bits: usize,
    /// Zeitlimit fuer den Handshake in Sekunden
    pub handshake_timeout_sek: u64,
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_groesse: usize,
}

impl Default for SicherheitsEinstellungen {
    fn default() -> Self {
        Self {
            rsa_bits: 2048,
            handshake_timeout_sek: 30,
            max_frame_groesse: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level oder Filter, z.B. "info" oder "beacon_relay=debug"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Logging ist hier noch nicht initialisiert
                eprintln!("Konfigurationsdatei '{pfad}' nicht gefunden, verwende Standardwerte");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Gibt die Bind-Adresse fuer den TCP-Listener zurueck
    pub fn tcp_bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self
            .netzwerk
            .bind_adresse
            .parse()
            .with_context(|| format!("Ungueltige bind_adresse '{}'", self.netzwerk.bind_adresse))?;
        Ok(SocketAddr::new(ip, self.netzwerk.tcp_port))
    }

    /// Gibt die Bind-Adresse des IPv4-UDP-Senders zurueck
    pub fn udp_bind_v4(&self) -> anyhow::Result<SocketAddr> {
        self.netzwerk
            .udp_bind_v4
            .parse()
            .with_context(|| format!("Ungueltige udp_bind_v4 '{}'", self.netzwerk.udp_bind_v4))
    }

    /// Gibt die Bind-Adresse des IPv6-UDP-Senders zurueck (falls konfiguriert)
    pub fn udp_bind_v6(&self) -> anyhow::Result<Option<SocketAddr>> {
        match self.netzwerk.udp_bind_v6.as_deref() {
            None | Some("") => Ok(None),
            Some(adresse) => adresse
                .parse()
                .map(Some)
                .with_context(|| format!("Ungueltige udp_bind_v6 '{adresse}'")),
        }
    }

    /// Uebersetzt die Konfiguration fuer den Relay-Kern
    ///
    /// Prueft dabei Schluesselgroesse, Limits und Logging-Einstellungen.
    pub fn relay_config(&self) -> anyhow::Result<RelayConfig> {
        if !log_filter_gueltig(&self.logging.level) {
            anyhow::bail!("Ungueltige Einstellung logging.level '{}'", self.logging.level);
        }
        self.logging
            .format
            .parse::<LogFormat>()
            .context("Ungueltige Einstellung logging.format")?;

        rsa_bits_pruefen(self.sicherheit.rsa_bits)
            .context("Ungueltige Einstellung sicherheit.rsa_bits")?;

        if self.server.max_clients == 0 {
            anyhow::bail!("server.max_clients muss groesser als 0 sein");
        }
        if self.sicherheit.handshake_timeout_sek == 0 {
            anyhow::bail!("sicherheit.handshake_timeout_sek muss groesser als 0 sein");
        }
        if self.sicherheit.max_frame_groesse == 0
            || self.sicherheit.max_frame_groesse > u32::MAX as usize
        {
            anyhow::bail!(
                "sicherheit.max_frame_groesse muss zwischen 1 und {} liegen",
                u32::MAX
            );
        }

        let mut relay = RelayConfig {
            max_clients: self.server.max_clients,
            rsa_bits: self.sicherheit.rsa_bits,
            handshake_timeout: Duration::from_secs(self.sicherheit.handshake_timeout_sek),
            max_frame_groesse: self.sicherheit.max_frame_groesse,
            ..RelayConfig::default()
        };
        if let Some(willkommen) = self.server.willkommen.as_ref().filter(|w| !w.is_empty()) {
            relay.willkommen = willkommen.clone();
        }
        Ok(relay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.server.max_clients, 512);
        assert_eq!(cfg.netzwerk.tcp_port, 9987);
        assert_eq!(cfg.sicherheit.rsa_bits, 2048);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.relay_config().is_ok());
    }

    #[test]
    fn bind_adressen() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.tcp_bind_adresse().unwrap(), "[::]:9987".parse().unwrap());
        assert_eq!(cfg.udp_bind_v4().unwrap(), "0.0.0.0:0".parse().unwrap());
        assert_eq!(cfg.udp_bind_v6().unwrap(), Some("[::]:0".parse().unwrap()));
    }

    #[test]
    fn leere_ipv6_adresse_deaktiviert_ipv6() {
        let mut cfg = ServerConfig::default();
        cfg.netzwerk.udp_bind_v6 = Some(String::new());
        assert_eq!(cfg.udp_bind_v6().unwrap(), None);
    }

    #[test]
    fn ungueltige_bind_adresse() {
        let mut cfg = ServerConfig::default();
        cfg.netzwerk.bind_adresse = "kein-host".into();
        assert!(cfg.tcp_bind_adresse().is_err());
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [server]
            name = "Mein Relay"
            max_clients = 100
            willkommen = "Hallo"

            [netzwerk]
            tcp_port = 10000

            [sicherheit]
            rsa_bits = 1024
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.server.name, "Mein Relay");
        assert_eq!(cfg.netzwerk.tcp_port, 10000);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.netzwerk.bind_adresse, "::");
        assert_eq!(cfg.sicherheit.handshake_timeout_sek, 30);

        let relay = cfg.relay_config().unwrap();
        assert_eq!(relay.max_clients, 100);
        assert_eq!(relay.rsa_bits, 1024);
        assert_eq!(relay.willkommen, "Hallo");
        assert_eq!(relay.handshake_timeout, Duration::from_secs(30));
    }

    #[test]
    fn standard_willkommen_enthaelt_version() {
        let relay = ServerConfig::default().relay_config().unwrap();
        assert!(relay.willkommen.starts_with("Welcome to the Beacon relay v"));
    }

    #[test]
    fn zu_kleiner_rsa_schluessel_wird_abgelehnt() {
        let mut cfg = ServerConfig::default();
        cfg.sicherheit.rsa_bits = 512;
        assert!(cfg.relay_config().is_err());
    }

    #[test]
    fn null_clients_wird_abgelehnt() {
        let mut cfg = ServerConfig::default();
        cfg.server.max_clients = 0;
        assert!(cfg.relay_config().is_err());
    }

    #[test]
    fn logging_einstellungen_werden_geprueft() {
        let mut cfg = ServerConfig::default();
        cfg.logging.level = "warn,beacon_relay=debug".into();
        assert!(cfg.relay_config().is_ok());

        cfg.logging.level = "beacon=gespraechig".into();
        let fehler = cfg.relay_config().unwrap_err();
        assert!(fehler.to_string().contains("logging.level"));

        cfg.logging.level = "info".into();
        cfg.logging.format = "xml".into();
        assert!(cfg.relay_config().is_err());
    }

    #[test]
    fn fehlende_datei_ergibt_standardwerte() {
        let cfg = ServerConfig::laden("/nicht/vorhanden/beacon.toml").unwrap();
        assert_eq!(cfg.netzwerk.tcp_port, 9987);
    }

    #[test]
    fn kaputte_datei_ist_fehler() {
        let pfad = std::env::temp_dir().join(format!("beacon-test-{}.toml", std::process::id()));
        std::fs::write(&pfad, "[server\nname = ").unwrap();
        let ergebnis = ServerConfig::laden(pfad.to_str().unwrap());
        std::fs::remove_file(&pfad).ok();
        assert!(ergebnis.is_err());
    }
}
