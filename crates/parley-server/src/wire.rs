//! Frame I/O on QUIC streams.
//!
//! Reads length-prefixed intent frames off an inbound stream and encodes
//! outbound server messages. Generic over the tokio I/O traits so the same
//! code runs against Quinn streams and in-memory buffers.

use bytes::Bytes;
use parley_proto::{Frame, Intent, ServerMessage};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::ServerError;

/// Read the next frame from `recv`.
///
/// Returns `Ok(None)` when the stream ends cleanly between frames.
///
/// # Errors
///
/// - `ServerError::Protocol` if the prefix announces more than `max_frame_bytes`
///   or the stream ends inside a payload
/// - `ServerError::Transport` on any other read failure
pub async fn read_frame<R>(recv: &mut R, max_frame_bytes: usize) -> Result<Option<Frame>, ServerError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; Frame::PREFIX_SIZE];
    match recv.read_exact(&mut prefix).await {
        Ok(_) => {},
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let size = Frame::payload_len(prefix, max_frame_bytes)?;

    let mut payload = vec![0u8; size];
    recv.read_exact(&mut payload).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => {
            ServerError::Protocol(format!("stream ended inside a {size} byte payload"))
        },
        _ => e.into(),
    })?;

    Ok(Some(Frame::new(payload)))
}

/// Read and decode the next intent from `recv`.
pub async fn read_intent<R>(recv: &mut R, max_frame_bytes: usize) -> Result<Option<Intent>, ServerError>
where
    R: AsyncRead + Unpin,
{
    match read_frame(recv, max_frame_bytes).await? {
        Some(frame) => Ok(Some(frame.to_message()?)),
        None => Ok(None),
    }
}

/// Encode a server message as prefix plus payload, ready to write.
pub fn encode_message(message: &ServerMessage) -> Result<Bytes, ServerError> {
    Ok(Frame::from_message(message)?.to_bytes()?)
}

#[cfg(test)]
mod tests {
    use parley_proto::{MessageContent, ProtocolError, SessionId};

    use super::*;

    fn framed(intents: &[Intent]) -> Vec<u8> {
        let mut buf = Vec::new();
        for intent in intents {
            buf.extend_from_slice(&Frame::from_message(intent).unwrap().to_bytes().unwrap());
        }
        buf
    }

    #[tokio::test]
    async fn reads_back_to_back_intents_in_order() {
        let intents = vec![
            Intent::JoinApplication { display_name: "ann".into() },
            Intent::JoinRoom { room: "ops".into() },
            Intent::SendPrivateMessage {
                to: SessionId(4),
                content: MessageContent::Text { body: "hi".into() },
            },
        ];
        let bytes = framed(&intents);
        let mut recv = &bytes[..];

        let mut decoded = Vec::new();
        while let Some(intent) = read_intent(&mut recv, 1024).await.unwrap() {
            decoded.push(intent);
        }

        assert_eq!(decoded, intents);
    }

    #[tokio::test]
    async fn empty_stream_is_clean_end() {
        let mut recv: &[u8] = &[];
        assert!(read_frame(&mut recv, 1024).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_prefix_rejected_before_reading_payload() {
        let mut bytes = 5000u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 16]);
        let mut recv = &bytes[..];

        let err = read_frame(&mut recv, 4096).await.unwrap_err();
        let expected: ServerError = ProtocolError::PayloadTooLarge { size: 5000, max: 4096 }.into();
        assert_eq!(err.to_string(), expected.to_string());
    }

    #[tokio::test]
    async fn truncated_payload_is_protocol_error() {
        let mut bytes = 10u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(b"abc");
        let mut recv = &bytes[..];

        assert!(matches!(read_frame(&mut recv, 1024).await, Err(ServerError::Protocol(_))));
    }

    #[tokio::test]
    async fn malformed_intent_is_protocol_error() {
        let frame = Frame::new(&b"\xff\x00not cbor"[..]);
        let bytes = frame.to_bytes().unwrap();
        let mut recv = &bytes[..];

        assert!(matches!(read_intent(&mut recv, 1024).await, Err(ServerError::Protocol(_))));
    }
}
