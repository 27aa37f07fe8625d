//! Address-routed RPC over an opaque message transport.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          RPC Stack                           │
//! │                                                              │
//! │  ┌───────────┐   ┌────────────┐   ┌────────────────────────┐ │
//! │  │ Transport │──▶│ RpcChannel │──▶│ HandlerRegistry        │ │
//! │  │ (trait)   │   │ receive()  │   │  AddressMap<Handler>   │ │
//! │  └───────────┘   └─────┬──────┘   └────────────────────────┘ │
//! │       ▲                │ AccessController chain              │
//! │       │                ▼                                     │
//! │  ┌───────────┐   ┌────────────┐                              │
//! │  │ Transport │◀──│ Serializer │  call / stream replies       │
//! │  │ (send)    │   │ Data→Value │                              │
//! │  └───────────┘   └────────────┘                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod access;
pub mod address;
pub mod address_map;
pub mod channel;
pub mod client;
pub mod codec;
pub mod handler;
pub mod message;
pub mod registry;
pub mod reply;
pub mod serializer;
pub mod stream;
pub mod transport;
pub mod value;
