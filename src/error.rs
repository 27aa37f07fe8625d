//! Unified error types for the RPC channel core.
//!
//! Every failure a caller can observe funnels into one of four enums:
//! [`SerializationError`] (a value cannot go on the wire), [`RpcError`]
//! (a call or stream failed), [`CodecError`] (a byte frame is malformed) and
//! [`ConfigError`] (a channel configuration is inconsistent).
//!
//! Remote failures travel as serialized error objects. The reserved error
//! names below let the receiving side rebuild the distinct kinds (forbidden,
//! not found) instead of collapsing everything into a generic rejection.

use core::fmt;

use crate::rpc::value::{ErrorInfo, Value};

/// Error name carried by access-denied responses.
pub const ACCESS_DENIED_ERROR: &str = "AccessDeniedError";

/// Error name carried by responses for addresses with no handler.
pub const NOT_FOUND_ERROR: &str = "NotFoundError";

/// Error name used when a reply value cannot be serialized.
pub const SERIALIZATION_ERROR: &str = "SerializationError";

/// Error name used when a handler panics during dispatch.
pub const PANIC_ERROR: &str = "PanicError";

/// Message carried by not-found responses.
pub const NOT_FOUND_MESSAGE: &str = "Function at address is undefined";

// ---------------------------------------------------------------------------
// Serialization errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerializationError {
    /// Symbols and callables have no wire representation.
    Unsupported,
    /// A local-only value of unknown runtime type.
    UnknownType,
    /// A custom serialization hook reported a failure.
    Custom(String),
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported => write!(f, "cannot serialize symbols/functions"),
            Self::UnknownType => write!(f, "cannot serialize value of unknown type"),
            Self::Custom(msg) => write!(f, "custom serializer failed: {msg}"),
        }
    }
}

impl std::error::Error for SerializationError {}

// ---------------------------------------------------------------------------
// Call / stream errors
// ---------------------------------------------------------------------------

/// Failure surfaced by [`call`](crate::rpc::channel::RpcChannel::call) or a
/// [`RpcStream`](crate::rpc::stream::RpcStream).
#[derive(Debug, Clone, PartialEq)]
pub enum RpcError {
    /// A reply arrived through a different channel instance than the one
    /// that issued the request (stale or reused correlation address).
    InvalidChannel,
    /// The remote access pipeline refused the call.
    AccessDenied(ErrorInfo),
    /// Nothing is registered at the target address on the remote.
    NotFound(ErrorInfo),
    /// The remote handler failed with a named error.
    Forwarded(ErrorInfo),
    /// The remote handler failed with an unnamed value.
    Rejected(Value),
    /// The channel closed while the operation was pending.
    ChannelClosed,
    /// The request arguments could not be serialized locally.
    Serialization(SerializationError),
}

impl RpcError {
    /// Classify an error payload received from the peer.
    pub fn from_remote(error: Value) -> Self {
        match ErrorInfo::from_value(&error) {
            Some(info) if info.name == ACCESS_DENIED_ERROR => Self::AccessDenied(info),
            Some(info) if info.name == NOT_FOUND_ERROR => Self::NotFound(info),
            Some(info) => Self::Forwarded(info),
            None => Self::Rejected(error),
        }
    }

    /// The remote error record, if this failure came from the peer.
    pub fn remote_error(&self) -> Option<&ErrorInfo> {
        match self {
            Self::AccessDenied(info) | Self::NotFound(info) | Self::Forwarded(info) => Some(info),
            _ => None,
        }
    }

    /// `true` for failures that originated on the remote side.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::AccessDenied(_) | Self::NotFound(_) | Self::Forwarded(_) | Self::Rejected(_)
        )
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChannel => write!(f, "reply delivered through a different channel"),
            Self::AccessDenied(info) => write!(f, "access denied: {}", info.message),
            Self::NotFound(info) => write!(f, "{}", info.message),
            Self::Forwarded(info) => write!(f, "remote {}: {}", info.name, info.message),
            Self::Rejected(value) => write!(f, "remote rejected: {}", value.to_json()),
            Self::ChannelClosed => write!(f, "channel closed"),
            Self::Serialization(e) => write!(f, "serialization: {e}"),
        }
    }
}

impl std::error::Error for RpcError {}

impl From<SerializationError> for RpcError {
    fn from(e: SerializationError) -> Self {
        Self::Serialization(e)
    }
}

// ---------------------------------------------------------------------------
// Frame codec errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Encoded message exceeds the maximum frame payload.
    FrameTooLarge { len: usize, max: usize },
    /// Frame shorter than its length header claims.
    Truncated,
    /// postcard could not encode or decode the message.
    Postcard(postcard::Error),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FrameTooLarge { len, max } => {
                write!(f, "frame payload of {len} bytes exceeds {max}")
            }
            Self::Truncated => write!(f, "truncated frame"),
            Self::Postcard(e) => write!(f, "postcard: {e}"),
        }
    }
}

impl std::error::Error for CodecError {}

impl From<postcard::Error> for CodecError {
    fn from(e: postcard::Error) -> Self {
        Self::Postcard(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Heartbeats must be more frequent than the inactivity timeout.
    KeepaliveNotShorterThanTimeout { keepalive_ms: u64, timeout_ms: u64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeepaliveNotShorterThanTimeout {
                keepalive_ms,
                timeout_ms,
            } => write!(
                f,
                "keepalive interval {keepalive_ms}ms must be shorter than timeout {timeout_ms}ms"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
