//! Hybrid-Handshake einer Steuerverbindung
//!
//! Ablauf (Server-Sicht):
//! 1. Exponent (3 Bytes) und Modulus (`bits / 8` Bytes) roh senden
//! 2. RSA(IV) und danach RSA(Schluessel) als rohe Bloecke lesen
//! 3. Willkommenstext als verschluesselten Frame senden
//! 4. UDP-Port des Clients als verschluesselten Frame lesen
//!
//! Ab Schritt 3 laeuft alles ueber laengen-praefixierte Frames.

use beacon_protocol::{read_frame, write_frame, TransportError};
use rand::rngs::OsRng;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::cipher::{entschluesseln, verschluesseln};
use crate::error::{HandshakeError, HandshakeResult};
use crate::keys::{modulus_laenge, rsa_bits_pruefen, ServerKeyPair, ServerPublicKey, EXPONENT_LAENGE};
use crate::types::SessionKeys;

/// Ergebnis eines erfolgreichen Handshakes auf Server-Seite
#[derive(Debug)]
pub struct ServerHandshake {
    pub schluessel: SessionKeys,
    pub udp_port: u16,
}

/// Ergebnis eines erfolgreichen Handshakes auf Client-Seite
#[derive(Debug)]
pub struct ClientHandshake {
    pub schluessel: SessionKeys,
    pub willkommen: String,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Fuehrt den Handshake als Server durch
///
/// Jeder Fehler ist endgueltig: der Aufrufer schliesst die Verbindung.
pub async fn server_handshake<S>(
    stream: &mut S,
    schluesselpaar: &ServerKeyPair,
    willkommen: &str,
    max_frame_groesse: usize,
) -> HandshakeResult<ServerHandshake>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream
        .write_all(&schluesselpaar.exponent_bytes())
        .await
        .map_err(TransportError::from)?;
    stream
        .write_all(&schluesselpaar.modulus_bytes())
        .await
        .map_err(TransportError::from)?;
    stream.flush().await.map_err(TransportError::from)?;

    let block_laenge = schluesselpaar.block_laenge();

    let iv_block = block_lesen(stream, block_laenge).await?;
    let iv = schluesselpaar.entschluesseln(&iv_block)?;

    let key_block = block_lesen(stream, block_laenge).await?;
    let key = schluesselpaar.entschluesseln(&key_block)?;

    let schluessel = SessionKeys::aus_entschluesselt(&iv, &key);
    tracing::debug!(
        iv_laenge = iv.len(),
        key_laenge = key.len(),
        "Sitzungsschluessel empfangen"
    );

    let begruessung = verschluesseln(willkommen, &schluessel);
    write_frame(stream, &begruessung, max_frame_groesse).await?;

    let port_frame = read_frame(stream, max_frame_groesse).await?;
    let port_text = entschluesseln(&port_frame, &schluessel)?;
    let udp_port = udp_port_parsen(&port_text)?;

    Ok(ServerHandshake {
        schluessel,
        udp_port,
    })
}

/// Liest genau `laenge` rohe Bytes
///
/// Endet die Verbindung vorher, ist das ein `KurzesLesen` mit der Anzahl
/// bereits gelesener Bytes.
async fn block_lesen<S>(stream: &mut S, laenge: usize) -> HandshakeResult<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut puffer = vec![0u8; laenge];
    let mut gelesen = 0;

    while gelesen < laenge {
        let n = stream
            .read(&mut puffer[gelesen..])
            .await
            .map_err(TransportError::from)?;
        if n == 0 {
            return Err(HandshakeError::KurzesLesen {
                erwartet: laenge,
                erhalten: gelesen,
            });
        }
        gelesen += n;
    }

    Ok(puffer)
}

/// Parst den UDP-Port als Dezimalzahl
///
/// Umgebende Leerzeichen werden toleriert, Port 0 nicht.
pub fn udp_port_parsen(text: &str) -> HandshakeResult<u16> {
    match text.trim().parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(HandshakeError::UngueltigerPort(text.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Fuehrt den Handshake als Client mit frischen Sitzungsschluesseln durch
pub async fn client_handshake<S>(
    stream: &mut S,
    rsa_bits: usize,
    udp_port: u16,
    max_frame_groesse: usize,
) -> HandshakeResult<ClientHandshake>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let schluessel = SessionKeys::generieren(&mut OsRng);
    client_handshake_mit(
        stream,
        rsa_bits,
        schluessel,
        &udp_port.to_string(),
        max_frame_groesse,
    )
    .await
}

/// Client-Handshake mit vorgegebenen Schluesseln und beliebigem Port-Text
///
/// Die Schluesselgroesse des Servers ist vorab bekannt; auf dem Draht steht
/// sie nicht.
pub async fn client_handshake_mit<S>(
    stream: &mut S,
    rsa_bits: usize,
    schluessel: SessionKeys,
    port_text: &str,
    max_frame_groesse: usize,
) -> HandshakeResult<ClientHandshake>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    rsa_bits_pruefen(rsa_bits)?;

    let exponent = block_lesen(stream, EXPONENT_LAENGE).await?;
    let modulus = block_lesen(stream, modulus_laenge(rsa_bits)).await?;
    let oeffentlich = ServerPublicKey::aus_bytes(&exponent, &modulus)?;

    let iv_block = oeffentlich.verschluesseln(schluessel.iv.as_bytes())?;
    let key_block = oeffentlich.verschluesseln(schluessel.key.as_bytes())?;
    stream
        .write_all(&iv_block)
        .await
        .map_err(TransportError::from)?;
    stream
        .write_all(&key_block)
        .await
        .map_err(TransportError::from)?;
    stream.flush().await.map_err(TransportError::from)?;

    let begruessung = read_frame(stream, max_frame_groesse).await?;
    let willkommen = entschluesseln(&begruessung, &schluessel)?;

    let port_frame = verschluesseln(port_text, &schluessel);
    write_frame(stream, &port_frame, max_frame_groesse).await?;

    Ok(ClientHandshake {
        schluessel,
        willkommen,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
