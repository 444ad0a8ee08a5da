//! Async frame I/O shared by the listener and the client

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::domain::protocol::{decode_header, encode_header, FRAME_HEADER_LEN};
use crate::error::CodecError;

/// Largest buffer handed out before payload bytes have actually arrived
pub const READ_CHUNK: usize = 64 * 1024;

/// Read exactly one frame payload.
///
/// A peer that hangs up before the first byte yields
/// [`CodecError::EmptyStream`], one that hangs up mid-frame yields
/// [`CodecError::Truncated`]. The buffer grows with the bytes received, so a
/// header announcing a large frame costs at most [`READ_CHUNK`] up front.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Vec<u8>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    let mut filled = 0;
    while filled < FRAME_HEADER_LEN {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            return Err(if filled == 0 {
                CodecError::EmptyStream
            } else {
                CodecError::Truncated {
                    expected: FRAME_HEADER_LEN,
                    received: filled,
                }
            });
        }
        filled += n;
    }

    let len = decode_header(header, max_len)?;
    let mut payload = Vec::with_capacity(len.min(READ_CHUNK));
    (&mut *reader).take(len as u64).read_to_end(&mut payload).await?;
    if payload.len() < len {
        return Err(CodecError::Truncated {
            expected: len,
            received: payload.len(),
        });
    }

    Ok(payload)
}

/// Write one frame and flush it
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    let header = encode_header(payload.len())?;
    writer.write_all(&header).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read everything the peer sends until it closes its side.
///
/// A reset after a close without reply is reported as an empty reply: either
/// way the peer sent nothing.
pub async fn read_reply<R>(reader: &mut R) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut reply = Vec::new();
    match reader.read_to_end(&mut reply).await {
        Ok(_) => Ok(reply),
        Err(e) if e.kind() == io::ErrorKind::ConnectionReset && reply.is_empty() => Ok(reply),
        Err(e) => Err(e),
    }
}
