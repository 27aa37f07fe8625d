//! Length-prefix frame codec for byte-oriented links.
//!
//! Wire format:
//! ```text
//! ┌────────────┬─────────────────────────────────┐
//! │ Length (4B)│ postcard-encoded RpcMessage (N) │
//! │ LE u32     │                                 │
//! └────────────┴─────────────────────────────────┘
//! ```
//!
//! [`FrameDecoder`] accumulates incoming bytes and yields complete frame
//! payloads, so a single read may carry part of a header, part of a
//! payload, or several frames back to back.

use crate::error::CodecError;
use crate::rpc::message::RpcMessage;

/// Maximum frame payload size.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Frame header size (4-byte little-endian length).
pub const HEADER_SIZE: usize = 4;

enum DecoderState {
    ReadingHeader { collected: usize },
    ReadingPayload { expected: usize, collected: usize },
}

/// Streaming frame decoder.
pub struct FrameDecoder {
    state: DecoderState,
    header_buf: [u8; HEADER_SIZE],
    payload_buf: Vec<u8>,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::ReadingHeader { collected: 0 },
            header_buf: [0; HEADER_SIZE],
            payload_buf: Vec::new(),
        }
    }

    /// Feed bytes, returning every frame payload they complete.
    ///
    /// Zero-length and oversized headers are skipped and the decoder
    /// resynchronises on the next four bytes.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        let mut offset = 0;

        while offset < data.len() {
            match &mut self.state {
                DecoderState::ReadingHeader { collected } => {
                    let to_copy = (HEADER_SIZE - *collected).min(data.len() - offset);
                    self.header_buf[*collected..*collected + to_copy]
                        .copy_from_slice(&data[offset..offset + to_copy]);
                    *collected += to_copy;
                    offset += to_copy;

                    if *collected == HEADER_SIZE {
                        let expected = u32::from_le_bytes(self.header_buf) as usize;
                        if expected == 0 || expected > MAX_FRAME_SIZE {
                            self.state = DecoderState::ReadingHeader { collected: 0 };
                            continue;
                        }
                        self.payload_buf.clear();
                        self.payload_buf.reserve(expected);
                        self.state = DecoderState::ReadingPayload {
                            expected,
                            collected: 0,
                        };
                    }
                }

                DecoderState::ReadingPayload { expected, collected } => {
                    let to_copy = (*expected - *collected).min(data.len() - offset);
                    self.payload_buf
                        .extend_from_slice(&data[offset..offset + to_copy]);
                    *collected += to_copy;
                    offset += to_copy;

                    if *collected == *expected {
                        frames.push(core::mem::take(&mut self.payload_buf));
                        self.state = DecoderState::ReadingHeader { collected: 0 };
                    }
                }
            }
        }

        frames
    }

    /// Reset decoder state (e.g. after a link reconnect).
    pub fn reset(&mut self) {
        self.state = DecoderState::ReadingHeader { collected: 0 };
        self.payload_buf.clear();
    }
}

/// Prefix `payload` with its length.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, CodecError> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Encode a message into a complete frame.
pub fn encode_message(message: &RpcMessage) -> Result<Vec<u8>, CodecError> {
    let payload = postcard::to_allocvec(message)?;
    encode_frame(&payload)
}

/// Decode one frame payload (without the length header).
pub fn decode_message(payload: &[u8]) -> Result<RpcMessage, CodecError> {
    Ok(postcard::from_bytes(payload)?)
}
