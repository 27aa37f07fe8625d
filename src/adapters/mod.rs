//! Concrete transports for [`RpcChannel`](crate::rpc::channel::RpcChannel).
//!
//! | Adapter  | Implements          | Connects to                         |
//! |----------|---------------------|-------------------------------------|
//! | `memory` | Transport           | another channel in the same thread  |
//! | `framed` | Transport           | any [`ByteLink`] via the frame codec|
//!
//! [`ByteLink`]: crate::rpc::transport::ByteLink

pub mod framed;
pub mod memory;
