//! chanrpc: address-routed RPC channels over opaque message transports.
//!
//! A [`RpcChannel`] sits on one end of a message link. It routes inbound
//! messages to handlers registered under hierarchical address patterns
//! (with `*` wildcards), checks them against composable access controllers,
//! and answers with single replies or lazily produced value streams.
//! Outbound, it issues calls and stream requests and correlates the replies.
//!
//! Everything is single-threaded: channels share state through `Rc` and run
//! their background work on an `edge_executor::LocalExecutor`.

#![deny(unused_must_use)]

pub mod adapters;
pub mod config;
pub mod error;
pub mod rpc;
pub mod runtime;

pub use config::ChannelConfig;
pub use error::{RpcError, SerializationError};
pub use rpc::access::{AccessController, AccessPolicy, OptAccessPolicy};
pub use rpc::address::{Address, Pattern};
pub use rpc::channel::{ChannelState, RpcChannel};
pub use rpc::handler::{Handler, Invocation, Reply};
pub use rpc::registry::{HandlerRegistry, HandlerSet};
pub use rpc::value::{Data, ErrorInfo, Value};
