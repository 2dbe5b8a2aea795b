//! Beacon Client – Konsole
//!
//! Gibt den Willkommenstext und alle empfangenen `id|zustand` Zeilen aus und
//! sendet jede Eingabezeile als neuen Zustand. Eine leere Zeile oder EOF
//! beendet die Sitzung.

use anyhow::Result;
use beacon_client::{Aufruf, ClientConfig, RelayClient};
use beacon_observability::logging_initialisieren;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    let aufruf = Aufruf::aus_argumenten(std::env::args().skip(1))?;
    logging_initialisieren("warn", "text")?;

    let (mut client, mut nachrichten) =
        RelayClient::verbinden(&aufruf.host, aufruf.port, aufruf.udp_port, &ClientConfig::default())
            .await?;

    println!("{}", client.willkommen());

    let mut zeilen = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            zeile = zeilen.next_line() => {
                match zeile? {
                    Some(text) if !text.is_empty() => client.senden(&text).await?,
                    _ => break,
                }
            }

            Some(nachricht) = nachrichten.recv() => {
                println!("{nachricht}");
            }

            _ = client.server_geschlossen() => {
                eprintln!("Verbindung vom Server getrennt");
                return Ok(());
            }
        }
    }

    client.trennen().await?;
    Ok(())
}
