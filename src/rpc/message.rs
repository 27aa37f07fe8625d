//! The single message shape exchanged between channels.
//!
//! ```text
//!   RpcMessage {
//!       to:          target address
//!       args:        serialized argument list
//!       return_addr: where the reply goes (absent for notifications)
//!       return_type: Call → one [value, error] reply
//!                    Stream → many [value, error, done] frames
//!   }
//! ```

use serde::{Deserialize, Serialize};

use crate::rpc::address::Address;
use crate::rpc::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnType {
    #[default]
    Call,
    Stream,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcMessage {
    pub to: Address,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default, rename = "returnAddr")]
    pub return_addr: Option<Address>,
    #[serde(default, rename = "returnType")]
    pub return_type: ReturnType,
}

impl RpcMessage {
    /// A message expecting no reply.
    pub fn notice(to: Address, args: Vec<Value>) -> Self {
        Self {
            to,
            args,
            return_addr: None,
            return_type: ReturnType::Call,
        }
    }

    pub fn expects_reply(&self) -> bool {
        self.return_addr.is_some()
    }
}

/// `[value, error]`
pub(crate) fn call_frame(value: Value, error: Value) -> Vec<Value> {
    vec![value, error]
}

/// `[value, error, done]`
pub(crate) fn stream_frame(value: Value, error: Value, done: bool) -> Vec<Value> {
    vec![value, error, Value::Bool(done)]
}
