//! Message transport over a byte link.
//!
//! Outbound messages are postcard-encoded and length-prefixed (see
//! [`codec`](crate::rpc::codec)); inbound bytes are reassembled by a
//! [`FrameDecoder`] and dispatched to the channel.
//!
//! Transferables cannot move across a byte link; their contents travel
//! inline as a copy.

use std::cell::RefCell;

use log::{debug, warn};

use crate::rpc::channel::{RpcChannel, WeakChannel};
use crate::rpc::codec::{FrameDecoder, decode_message, encode_message};
use crate::rpc::message::RpcMessage;
use crate::rpc::transport::{ByteLink, Transport};
use crate::rpc::value::Transferable;

/// Read chunk size for [`FramedReceiver::poll_link`].
const READ_CHUNK: usize = 512;

/// Sending side: wraps the write half of a [`ByteLink`].
pub struct FramedTransport<L: ByteLink> {
    link: RefCell<L>,
}

impl<L: ByteLink> FramedTransport<L> {
    pub fn new(link: L) -> Self {
        Self {
            link: RefCell::new(link),
        }
    }

    pub fn into_inner(self) -> L {
        self.link.into_inner()
    }
}

impl<L: ByteLink> Transport for FramedTransport<L> {
    fn send(&self, message: RpcMessage, transfer: Vec<Transferable>) {
        if !transfer.is_empty() {
            debug!("framed: copying {} transferables inline", transfer.len());
        }
        let frame = match encode_message(&message) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("framed: dropping message to {}: {}", message.to, e);
                return;
            }
        };

        let mut link = self.link.borrow_mut();
        let mut rest = frame.as_slice();
        while !rest.is_empty() {
            match link.write(rest) {
                Ok(0) => {
                    warn!("framed: link stalled with {} bytes unsent", rest.len());
                    return;
                }
                Ok(n) => rest = &rest[n..],
                Err(e) => {
                    warn!("framed: write failed: {:?}", e);
                    return;
                }
            }
        }
        if let Err(e) = link.flush() {
            warn!("framed: flush failed: {:?}", e);
        }
    }
}

/// Receiving side: decodes frames and feeds them to a channel.
pub struct FramedReceiver {
    decoder: FrameDecoder,
    channel: WeakChannel,
}

impl FramedReceiver {
    pub fn new(channel: &RpcChannel) -> Self {
        Self {
            decoder: FrameDecoder::new(),
            channel: channel.downgrade(),
        }
    }

    /// Feed raw bytes. Returns the number of messages dispatched.
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        let Some(channel) = self.channel.upgrade() else {
            return 0;
        };
        let mut dispatched = 0;
        for payload in self.decoder.feed(bytes) {
            match decode_message(&payload) {
                Ok(message) => {
                    channel.receive(message);
                    dispatched += 1;
                }
                Err(e) => warn!("framed: bad frame ({} bytes): {}", payload.len(), e),
            }
        }
        dispatched
    }

    /// Read everything currently available on `link` and dispatch it.
    pub fn poll_link<L: ByteLink>(&mut self, link: &mut L) -> Result<usize, L::Error> {
        let mut buf = [0u8; READ_CHUNK];
        let mut dispatched = 0;
        loop {
            let n = link.read(&mut buf)?;
            if n == 0 {
                return Ok(dispatched);
            }
            dispatched += self.feed(&buf[..n]);
        }
    }

    /// Drop any partially received frame (e.g. after a reconnect).
    pub fn reset(&mut self) {
        self.decoder.reset();
    }
}
