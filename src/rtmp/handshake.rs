//! Client side of the RTMP simple handshake
//!
//! ```text
//! Client                                   Server
//!   |------- C0 (1 byte: version) --------->|
//!   |------- C1 (1536 bytes: time+random) ->|
//!   |<------ S0 (1 byte: version) ----------|
//!   |<------ S1 (1536 bytes: time+random) --|
//!   |<------ S2 (1536 bytes: echo C1) ------|
//!   |------- C2 (1536 bytes: echo S1) ----->|
//! ```
//!
//! No HMAC digest is used; every mainstream ingest accepts the simple form.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{HANDSHAKE_SIZE, RTMP_VERSION};
use crate::error::{HandshakeError, Result};

/// Run the client handshake over an established transport
pub async fn client_handshake<S>(stream: &mut S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let c1 = generate_packet();

    let mut c0c1 = BytesMut::with_capacity(1 + HANDSHAKE_SIZE);
    c0c1.put_u8(RTMP_VERSION);
    c0c1.put_slice(&c1);
    stream.write_all(&c0c1).await?;
    stream.flush().await?;

    let mut s0 = [0u8; 1];
    read_exact(stream, &mut s0).await?;
    // Lenient: servers answer with anything from 3 up
    if s0[0] < RTMP_VERSION {
        return Err(HandshakeError::InvalidVersion(s0[0]).into());
    }

    let mut s1 = [0u8; HANDSHAKE_SIZE];
    read_exact(stream, &mut s1).await?;

    // S2 should echo C1; some servers don't, so it is only consumed
    let mut s2 = [0u8; HANDSHAKE_SIZE];
    read_exact(stream, &mut s2).await?;

    let c2 = generate_echo(&s1);
    stream.write_all(&c2).await?;
    stream.flush().await?;

    tracing::debug!(server_version = s0[0], "RTMP handshake complete");
    Ok(())
}

async fn read_exact<S>(stream: &mut S, buf: &mut [u8]) -> Result<()>
where
    S: AsyncRead + Unpin,
{
    match stream.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(HandshakeError::UnexpectedEof.into())
        }
        Err(e) => Err(e.into()),
    }
}

fn now_millis() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u32)
        .unwrap_or(0)
}

/// Generate C1
///
/// Format (1536 bytes):
/// - Bytes 0-3: Timestamp (32-bit, big-endian)
/// - Bytes 4-7: Zero
/// - Bytes 8-1535: Random data
pub(crate) fn generate_packet() -> [u8; HANDSHAKE_SIZE] {
    let mut packet = [0u8; HANDSHAKE_SIZE];
    let timestamp = now_millis();

    packet[0..4].copy_from_slice(&timestamp.to_be_bytes());

    // LCG filler; the handshake does not need real randomness
    let mut seed = u64::from(timestamp) | 1;
    for chunk in packet[8..].chunks_mut(8) {
        seed = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let bytes = seed.to_le_bytes();
        let len = chunk.len();
        chunk.copy_from_slice(&bytes[..len]);
    }

    packet
}

/// Generate C2: the peer's S1 with bytes 4-7 replaced by our read time
pub(crate) fn generate_echo(peer_packet: &[u8; HANDSHAKE_SIZE]) -> [u8; HANDSHAKE_SIZE] {
    let mut echo = *peer_packet;
    echo[4..8].copy_from_slice(&now_millis().to_be_bytes());
    echo
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    /// Minimal server side: reads C0C1, answers S0S1S2, reads C2
    async fn fake_server<S>(mut stream: S, version: u8) -> std::io::Result<[u8; HANDSHAKE_SIZE]>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut c0c1 = vec![0u8; 1 + HANDSHAKE_SIZE];
        stream.read_exact(&mut c0c1).await?;

        let s1 = generate_packet();
        let mut response = Vec::with_capacity(1 + HANDSHAKE_SIZE * 2);
        response.push(version);
        response.extend_from_slice(&s1);
        response.extend_from_slice(&c0c1[1..]);
        stream.write_all(&response).await?;

        let mut c2 = [0u8; HANDSHAKE_SIZE];
        stream.read_exact(&mut c2).await?;
        assert_eq!(&c2[8..], &s1[8..]);
        Ok(c2)
    }

    #[tokio::test]
    async fn test_client_handshake() {
        let (mut client, server) = tokio::io::duplex(8192);
        let server = tokio::spawn(fake_server(server, RTMP_VERSION));

        client_handshake(&mut client).await.unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_rejects_old_version() {
        let (mut client, server) = tokio::io::duplex(8192);
        let _server = tokio::spawn(fake_server(server, 2));

        let err = client_handshake(&mut client).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Handshake(HandshakeError::InvalidVersion(2))
        ));
    }

    #[tokio::test]
    async fn test_server_hangs_up() {
        let (mut client, server) = tokio::io::duplex(8192);
        drop(server);

        let err = client_handshake(&mut client).await.unwrap_err();
        assert!(matches!(err, Error::Handshake(_) | Error::Io(_)));
    }

    #[test]
    fn test_packet_layout() {
        let packet = generate_packet();
        assert_eq!(&packet[4..8], &[0, 0, 0, 0]);
        assert!(packet[8..64].iter().any(|&b| b != 0));

        let echo = generate_echo(&packet);
        assert_eq!(&echo[0..4], &packet[0..4]);
        assert_eq!(&echo[8..], &packet[8..]);
    }
}
