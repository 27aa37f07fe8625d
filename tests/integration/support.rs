//! Shared fixtures: a client/server channel pair over memory pipes.

use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use chanrpc::adapters::memory;
use chanrpc::rpc::access::AccessController;
use chanrpc::runtime::{self, Executor};
use chanrpc::{ChannelConfig, HandlerRegistry, RpcChannel};

pub struct Pair {
    pub executor: Rc<Executor>,
    pub client: RpcChannel,
    pub server: RpcChannel,
}

impl Pair {
    pub fn server_registry(&self) -> &Rc<HandlerRegistry> {
        self.server.registry()
    }

    pub fn run<T>(&self, future: impl Future<Output = T>) -> T {
        runtime::block_on(&self.executor, future)
    }
}

pub fn pair() -> Pair {
    pair_with(ChannelConfig::default(), ChannelConfig::default(), None)
}

pub fn pair_with(
    client: ChannelConfig,
    server: ChannelConfig,
    server_access: Option<Rc<dyn AccessController>>,
) -> Pair {
    let executor = runtime::new_executor();
    let (client, server) = memory::connect(
        &executor,
        |b| b.config(client),
        |b| {
            let b = b.config(server);
            match server_access {
                Some(access) => b.access_shared(access),
                None => b,
            }
        },
    )
    .expect("valid configs");
    Pair {
        executor,
        client,
        server,
    }
}

pub async fn sleep_ms(ms: u64) {
    runtime::sleep(Duration::from_millis(ms)).await;
}

/// Let queued deliveries and replies run.
pub async fn settle() {
    runtime::yield_times(32).await;
}
