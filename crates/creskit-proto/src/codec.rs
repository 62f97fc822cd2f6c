//! Stream codec for `*`-terminated frames.
//!
//! Bytes after the last terminator stay in the read buffer and are joined
//! with the next read, so a frame split across two TCP segments decodes
//! intact. Only fully delimited frames are ever emitted.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::Error;
use crate::frame::{FRAME_TERMINATOR, Frame};

/// Longest unterminated fragment kept before the decoder gives up on it.
pub const MAX_FRAME_LEN: usize = 4096;

// The terminator is ASCII, so a byte search is exact.
const TERMINATOR: u8 = FRAME_TERMINATOR as u8;

/// Decoder/encoder pair for the controller wire format.
///
/// Outbound items are already-encoded wire strings; the correlator needs
/// to retransmit them verbatim, so the codec writes them untouched.
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Offset into the buffer already scanned for a terminator.
    next_index: usize,
    /// Set after an oversize fragment was dropped; everything up to the
    /// next terminator belongs to that fragment and is skipped too.
    discarding: bool,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, Error> {
        loop {
            let start = self.next_index.min(buf.len());
            let Some(offset) = buf[start..].iter().position(|b| *b == TERMINATOR) else {
                if buf.len() > MAX_FRAME_LEN {
                    tracing::warn!(
                        len = buf.len(),
                        max = MAX_FRAME_LEN,
                        "dropping unterminated fragment"
                    );
                    buf.clear();
                    self.discarding = true;
                    self.next_index = 0;
                } else {
                    self.next_index = buf.len();
                }
                return Ok(None);
            };

            let raw = buf.split_to(start + offset + 1);
            self.next_index = 0;

            if self.discarding {
                self.discarding = false;
                continue;
            }

            let body = raw.get(..raw.len() - 1).unwrap_or_default();
            let text = String::from_utf8_lossy(body);
            match Frame::parse(text.trim()) {
                Some(frame) => return Ok(Some(frame)),
                None => {
                    tracing::trace!(fragment = %text, "skipping fragment without category");
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        if !buf.is_empty() {
            tracing::debug!(len = buf.len(), "discarding unterminated tail at end of stream");
            buf.clear();
        }
        self.next_index = 0;
        self.discarding = false;
        Ok(None)
    }
}

impl Encoder<String> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, wire: String, dst: &mut BytesMut) -> Result<(), Error> {
        dst.reserve(wire.len());
        dst.put_slice(wire.as_bytes());
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::frame::encode;
    use pretty_assertions::assert_eq;

    fn drain(codec: &mut FrameCodec, buf: &mut BytesMut) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = codec.decode(buf).unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn decodes_several_frames_from_one_read() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(
            "Lightbulb:5:eventPowerState:1*GarageDoorOpener:3:getCurrentDoorState:0*",
        );

        let frames = drain(&mut codec, &mut buf);
        assert_eq!(
            frames,
            vec![
                Frame::new("Lightbulb", "5", "eventPowerState", Some(1)),
                Frame::new("GarageDoorOpener", "3", "getCurrentDoorState", Some(0)),
            ]
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn frame_split_across_reads_is_reassembled() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from("MultiSpeedFan:2:getRota");
        assert!(drain(&mut codec, &mut buf).is_empty());

        buf.extend_from_slice(b"tionSpeed:50*Lock:1:");
        let frames = drain(&mut codec, &mut buf);
        assert_eq!(
            frames,
            vec![Frame::new("MultiSpeedFan", "2", "getRotationSpeed", Some(50))]
        );

        buf.extend_from_slice(b"eventLockCurrentState:1*");
        let frames = drain(&mut codec, &mut buf);
        assert_eq!(
            frames,
            vec![Frame::new("Lock", "1", "eventLockCurrentState", Some(1))]
        );
    }

    #[test]
    fn empty_fragments_and_line_noise_are_skipped() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from("**\r\nSwitch:4:eventPowerState:0*\n*");
        let frames = drain(&mut codec, &mut buf);
        assert_eq!(frames, vec![Frame::new("Switch", "4", "eventPowerState", Some(0))]);
    }

    #[test]
    fn malformed_value_still_produces_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from("Lightbulb:5:getPowerState:*");
        let frames = drain(&mut codec, &mut buf);
        assert_eq!(frames, vec![Frame::new("Lightbulb", "5", "getPowerState", None)]);
    }

    #[test]
    fn oversize_fragment_is_dropped_and_decoder_resyncs() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from("x".repeat(MAX_FRAME_LEN + 1).as_str());
        assert!(drain(&mut codec, &mut buf).is_empty());
        assert!(buf.is_empty());

        buf.extend_from_slice(b"still-garbage*Lightbulb:1:eventPowerState:1*");
        let frames = drain(&mut codec, &mut buf);
        assert_eq!(frames, vec![Frame::new("Lightbulb", "1", "eventPowerState", Some(1))]);
    }

    #[test]
    fn eof_discards_partial_tail() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from("Lightbulb:1:eventPowerState:1*Lightbulb:1:even");
        assert!(codec.decode_eof(&mut buf).unwrap().is_some());
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn encoded_command_decodes_to_same_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(encode("WindowCovering", "7", "setTargetPosition", Some(1)), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], b"WindowCovering:7:setTargetPosition:1*");

        let frames = drain(&mut codec, &mut buf);
        assert_eq!(
            frames,
            vec![Frame::new("WindowCovering", "7", "setTargetPosition", Some(1))]
        );
    }

    #[tokio::test]
    async fn framed_stream_reassembles_chunked_socket_reads() {
        use futures_util::{SinkExt, StreamExt};
        use tokio_util::codec::{FramedRead, FramedWrite};

        let socket = tokio_test::io::Builder::new()
            .read(b"Lightbulb:5:event")
            .read(b"PowerState:1*Loc")
            .read(b"k:1:eventLockCurrentState:0*Lock:1:ev")
            .build();
        let frames: Vec<Frame> = FramedRead::new(socket, FrameCodec::new())
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(
            frames,
            vec![
                Frame::new("Lightbulb", "5", "eventPowerState", Some(1)),
                Frame::new("Lock", "1", "eventLockCurrentState", Some(0)),
            ]
        );

        let socket = tokio_test::io::Builder::new()
            .write(b"Lightbulb:5:getPowerState:*")
            .build();
        let mut sink = FramedWrite::new(socket, FrameCodec::new());
        sink.send(encode("Lightbulb", "5", "getPowerState", None))
            .await
            .unwrap();
    }
}
