//! Transport abstractions.
//!
//! A channel only needs a way to hand a message (plus its transfer list)
//! to the other side: [`Transport`]. Delivery of inbound messages is the
//! owner's job; it calls [`RpcChannel::receive`] with each one.
//!
//! Byte-oriented links (serial ports, sockets, pipes) implement
//! [`ByteLink`] instead and are wrapped by
//! [`FramedTransport`](crate::adapters::framed::FramedTransport), which
//! encodes messages with the length-prefix codec.
//!
//! [`RpcChannel::receive`]: crate::rpc::channel::RpcChannel::receive

use crate::rpc::message::RpcMessage;
use crate::rpc::value::Transferable;

/// Outbound half of a message link.
pub trait Transport {
    /// Post `message`. Ownership of everything in `transfer` moves with it.
    fn send(&self, message: RpcMessage, transfer: Vec<Transferable>);
}

impl<F> Transport for F
where
    F: Fn(RpcMessage, Vec<Transferable>),
{
    fn send(&self, message: RpcMessage, transfer: Vec<Transferable>) {
        self(message, transfer);
    }
}

/// A transport that discards everything.
/// Useful for channels that only ever receive, and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn send(&self, _message: RpcMessage, _transfer: Vec<Transferable>) {}
}

/// Byte-oriented link.
pub trait ByteLink {
    /// Error type for this link.
    type Error: core::fmt::Debug;

    /// Read up to `buf.len()` bytes into `buf`.
    /// Returns 0 if no data is available (non-blocking).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write `data`, returning the number of bytes actually written.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Flush any buffered output.
    fn flush(&mut self) -> Result<(), Self::Error>;
}
