//! Length-prefixed signal codec for tokio I/O.
//!
//! Framing: `[4 bytes: payload length, big-endian u32][N bytes: payload]`
//!
//! A paste signal is a frame with an empty payload, so on the wire it is
//! exactly four zero bytes. Frames announcing a payload are rejected
//! without waiting for the payload to arrive.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Size of the frame length header.
pub const HEADER_LEN: usize = 4;

/// One "paste now" request. Carries no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signal;

/// Codec error type.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("unexpected payload: {0} bytes (signals carry none)")]
    UnexpectedPayload(usize),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Zero-length frame codec.
#[derive(Debug, Default)]
pub struct SignalCodec;

impl SignalCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for SignalCodec {
    type Item = Signal;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LEN {
            return Ok(None); // Need more data for the header.
        }
        let len = src.get_u32() as usize;
        if len != 0 {
            return Err(CodecError::UnexpectedPayload(len));
        }
        Ok(Some(Signal))
    }
}

impl Encoder<Signal> for SignalCodec {
    type Error = CodecError;

    fn encode(&mut self, _item: Signal, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(HEADER_LEN);
        dst.put_u32(0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_is_four_zero_bytes() {
        let mut buf = BytesMut::new();
        SignalCodec::new().encode(Signal, &mut buf).unwrap();
        assert_eq!(&buf[..], &[0, 0, 0, 0]);
    }

    #[test]
    fn decodes_a_signal() {
        let mut buf = BytesMut::from(&[0u8, 0, 0, 0][..]);
        let decoded = SignalCodec::new().decode(&mut buf).unwrap();
        assert_eq!(decoded, Some(Signal));
        assert!(buf.is_empty());
    }

    #[test]
    fn empty_buffer_returns_none() {
        let mut buf = BytesMut::new();
        assert!(SignalCodec::new().decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn partial_header_returns_none() {
        let mut codec = SignalCodec::new();
        let mut buf = BytesMut::from(&[0u8, 0][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 2, "partial header must not be consumed");

        buf.extend_from_slice(&[0, 0]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Signal));
    }

    #[test]
    fn back_to_back_signals_are_not_coalesced() {
        let mut codec = SignalCodec::new();
        let mut buf = BytesMut::new();
        for _ in 0..3 {
            codec.encode(Signal, &mut buf).unwrap();
        }

        let mut count = 0;
        while let Some(Signal) = codec.decode(&mut buf).unwrap() {
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn payload_is_rejected_before_it_arrives() {
        let mut buf = BytesMut::new();
        buf.put_u32(3);

        let err = SignalCodec::new().decode(&mut buf).unwrap_err();
        assert!(matches!(err, CodecError::UnexpectedPayload(3)));
    }

    #[test]
    fn length_header_is_big_endian() {
        // A little-endian writer would put the 1 in the first byte.
        let mut buf = BytesMut::from(&[1u8, 0, 0, 0][..]);
        let err = SignalCodec::new().decode(&mut buf).unwrap_err();
        assert!(matches!(err, CodecError::UnexpectedPayload(0x0100_0000)));
    }
}
