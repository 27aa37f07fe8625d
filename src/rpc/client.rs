//! Address-building handle for calling into a peer.
//!
//! ```ignore
//! let math = channel.remote(["svc", "math"]);
//! let sum = math.at("add").call(&[1.into(), 2.into()]).await?;
//! let mut ticks = math.at("ticks").generate(&[]);
//! ```

use crate::error::SerializationError;
use crate::rpc::address::Address;
use crate::rpc::channel::RpcChannel;
use crate::rpc::reply::ReplyFuture;
use crate::rpc::stream::RpcStream;
use crate::rpc::value::Data;

#[derive(Clone, Debug)]
pub struct Remote {
    channel: RpcChannel,
    address: Address,
}

impl Remote {
    pub(crate) fn new(channel: RpcChannel, address: Address) -> Self {
        Self { channel, address }
    }

    /// Descend one segment.
    pub fn at(&self, segment: impl Into<String>) -> Self {
        Self {
            channel: self.channel.clone(),
            address: self.address.child(segment),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn channel(&self) -> &RpcChannel {
        &self.channel
    }

    pub fn call(&self, args: &[Data]) -> ReplyFuture {
        self.channel.call(&self.address, args)
    }

    pub fn generate(&self, args: &[Data]) -> RpcStream {
        self.channel.generate(&self.address, args)
    }

    pub fn notify(&self, args: &[Data]) -> Result<(), SerializationError> {
        self.channel.notify(&self.address, args)
    }
}
