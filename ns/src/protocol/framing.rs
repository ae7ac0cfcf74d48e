//! Newline-delimited JSON frames over async streams

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::{Fault, FaultKind};

/// Maximum frame size, newline included
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Frame IO failed")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode or decode frame")]
    Json(#[from] serde_json::Error),

    #[error("Frame too large: {0} bytes")]
    TooLarge(usize),
}

impl From<&FrameError> for Fault {
    fn from(err: &FrameError) -> Self {
        let kind = match err {
            FrameError::Io(_) => FaultKind::Transport,
            FrameError::Json(_) | FrameError::TooLarge(_) => FaultKind::Protocol,
        };
        Fault::from_error(kind, err)
    }
}

impl From<FrameError> for Fault {
    fn from(err: FrameError) -> Self {
        Fault::from(&err)
    }
}

/// Write one message followed by a newline and flush
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(message)?;
    if line.len() >= MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge(line.len()));
    }
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one message; `None` when the peer closed the stream before sending one
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, FrameError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    // one byte past the limit is enough to tell an oversized frame apart
    let bytes_read = (&mut *reader)
        .take(MAX_FRAME_SIZE as u64 + 1)
        .read_line(&mut line)
        .await?;
    if bytes_read == 0 {
        debug!("read_frame: stream closed");
        return Ok(None);
    }
    if bytes_read > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge(bytes_read));
    }
    Ok(Some(serde_json::from_str(line.trim())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ControlRequest, ControlResponse};
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_frame_over_duplex() {
        let (client, server) = tokio::io::duplex(4096);
        let (server_read, _server_write) = tokio::io::split(server);
        let (_client_read, mut client_write) = tokio::io::split(client);

        write_frame(&mut client_write, &ControlRequest::Ping).await.unwrap();
        write_frame(&mut client_write, &ControlRequest::ListProxies).await.unwrap();
        drop(client_write);

        let mut reader = BufReader::new(server_read);
        let first: Option<ControlRequest> = read_frame(&mut reader).await.unwrap();
        let second: Option<ControlRequest> = read_frame(&mut reader).await.unwrap();
        assert_eq!(first, Some(ControlRequest::Ping));
        assert_eq!(second, Some(ControlRequest::ListProxies));
    }

    #[tokio::test]
    async fn test_eof_reads_none() {
        let mut reader = BufReader::new(&b""[..]);
        let frame: Option<ControlResponse> = read_frame(&mut reader).await.unwrap();
        assert!(frame.is_none());
    }

    #[tokio::test]
    async fn test_unterminated_frame_stops_at_limit() {
        let flood = vec![b'a'; MAX_FRAME_SIZE * 3];
        let mut reader = BufReader::new(&flood[..]);
        let err = read_frame::<_, ControlRequest>(&mut reader).await.unwrap_err();
        match err {
            FrameError::TooLarge(read) => assert_eq!(read, MAX_FRAME_SIZE + 1),
            other => panic!("expected oversized frame, got {other:?}"),
        }
        assert_eq!(Fault::from(FrameError::TooLarge(0)).kind, FaultKind::Protocol);
    }

    #[tokio::test]
    async fn test_garbage_is_protocol_fault() {
        let mut reader = BufReader::new(&b"not json\n"[..]);
        let err = read_frame::<_, ControlResponse>(&mut reader).await.unwrap_err();
        assert!(matches!(err, FrameError::Json(_)));
        assert_eq!(Fault::from(err).kind, FaultKind::Protocol);
    }
}
