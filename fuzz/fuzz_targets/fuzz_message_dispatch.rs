//! Fuzz target: `RpcChannel::receive`
//!
//! Decodes arbitrary frames into messages and delivers them to a channel
//! with an echo handler and a wildcard handler registered. Dispatch must
//! never panic, whatever the address, arguments or return type.
//!
//! cargo fuzz run fuzz_message_dispatch

#![no_main]

use chanrpc::rpc::codec::decode_message;
use chanrpc::rpc::transport::NullTransport;
use chanrpc::runtime::{self, new_executor};
use chanrpc::{Data, Handler, Pattern, Reply, RpcChannel, Value};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(message) = decode_message(data) else {
        return;
    };

    let executor = new_executor();
    let Ok(channel) = RpcChannel::builder(NullTransport, executor.clone()).build() else {
        return;
    };
    channel.registry().register(
        ["echo"],
        Handler::args_only(|args| Reply::value(Data::from(Value::Array(args)))),
    );
    channel.registry().register(
        Pattern::parse("any/*"),
        Handler::new(|inv| Reply::value(inv.wildcards.len() as f64)),
    );

    channel.receive(message);
    runtime::block_on(&executor, runtime::yield_times(4));
    channel.close(false);
});
