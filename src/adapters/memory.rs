//! In-process message pipes.
//!
//! ```text
//!   channel A ── MemoryTransport ──▶ pipe ──▶ MemoryInbox ── pump task ──▶ B.receive()
//!   channel B ── MemoryTransport ──▶ pipe ──▶ MemoryInbox ── pump task ──▶ A.receive()
//! ```
//!
//! Delivery is asynchronous: `send` only enqueues, and the pump task on the
//! executor hands messages to the receiving channel in order. A handler
//! that replies from inside `receive` therefore never re-enters the peer.
//! Transferables move along with the message; the pipe counts them.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::poll_fn;
use std::rc::Rc;
use std::task::Poll;

use embassy_sync::waitqueue::WakerRegistration;
use log::debug;

use crate::error::ConfigError;
use crate::rpc::channel::{ChannelBuilder, RpcChannel};
use crate::rpc::message::RpcMessage;
use crate::rpc::transport::Transport;
use crate::rpc::value::Transferable;
use crate::runtime::Executor;

struct Pipe {
    queue: RefCell<VecDeque<RpcMessage>>,
    waker: RefCell<WakerRegistration>,
    closed: Cell<bool>,
    sent: Cell<u64>,
    transferred: Cell<u64>,
}

impl Pipe {
    fn close(&self) {
        self.closed.set(true);
        self.waker.borrow_mut().wake();
    }
}

/// Sending half of a pipe.
pub struct MemoryTransport {
    pipe: Rc<Pipe>,
}

impl MemoryTransport {
    /// Stop accepting messages; the inbox drains and then ends.
    pub fn close(&self) {
        self.pipe.close();
    }

    pub fn messages_sent(&self) -> u64 {
        self.pipe.sent.get()
    }

    pub fn items_transferred(&self) -> u64 {
        self.pipe.transferred.get()
    }
}

impl Transport for MemoryTransport {
    fn send(&self, message: RpcMessage, transfer: Vec<Transferable>) {
        if self.pipe.closed.get() {
            debug!("memory: pipe closed, dropping message to {}", message.to);
            return;
        }
        self.pipe.sent.set(self.pipe.sent.get() + 1);
        self.pipe
            .transferred
            .set(self.pipe.transferred.get() + transfer.len() as u64);
        self.pipe.queue.borrow_mut().push_back(message);
        self.pipe.waker.borrow_mut().wake();
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.pipe.close();
    }
}

/// Receiving half of a pipe.
pub struct MemoryInbox {
    pipe: Rc<Pipe>,
}

impl MemoryInbox {
    pub fn try_recv(&self) -> Option<RpcMessage> {
        self.pipe.queue.borrow_mut().pop_front()
    }

    /// Next message, or `None` once the pipe is closed and drained.
    pub async fn recv(&self) -> Option<RpcMessage> {
        poll_fn(|cx| {
            if let Some(message) = self.try_recv() {
                return Poll::Ready(Some(message));
            }
            if self.pipe.closed.get() {
                return Poll::Ready(None);
            }
            self.pipe.waker.borrow_mut().register(cx.waker());
            Poll::Pending
        })
        .await
    }

    pub fn len(&self) -> usize {
        self.pipe.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn a pump on the channel's executor that feeds every message to
    /// `channel.receive`. The pump holds only a weak handle and ends when
    /// the channel is dropped or closed, or the pipe closes.
    pub fn deliver_to(self, channel: &RpcChannel) {
        let weak = channel.downgrade();
        let id = channel.id();
        channel
            .executor()
            .spawn(async move {
                while let Some(message) = self.recv().await {
                    let Some(channel) = weak.upgrade() else {
                        break;
                    };
                    if channel.is_closed() {
                        break;
                    }
                    channel.receive(message);
                }
                debug!("memory: pump for channel {id} finished");
            })
            .detach();
    }
}

/// A fresh one-way pipe.
pub fn pipe() -> (MemoryTransport, MemoryInbox) {
    let pipe = Rc::new(Pipe {
        queue: RefCell::new(VecDeque::new()),
        waker: RefCell::new(WakerRegistration::new()),
        closed: Cell::new(false),
        sent: Cell::new(0),
        transferred: Cell::new(0),
    });
    (
        MemoryTransport { pipe: pipe.clone() },
        MemoryInbox { pipe },
    )
}

/// Two channels wired back to back on `executor`.
///
/// The closures customise each side's builder (config, registry, access).
pub fn connect<L, R>(
    executor: &Rc<Executor>,
    left: L,
    right: R,
) -> Result<(RpcChannel, RpcChannel), ConfigError>
where
    L: FnOnce(ChannelBuilder) -> ChannelBuilder,
    R: FnOnce(ChannelBuilder) -> ChannelBuilder,
{
    let (to_right, right_inbox) = pipe();
    let (to_left, left_inbox) = pipe();

    let a = left(RpcChannel::builder(to_right, executor.clone())).build()?;
    let b = right(RpcChannel::builder(to_left, executor.clone())).build()?;

    right_inbox.deliver_to(&b);
    left_inbox.deliver_to(&a);
    Ok((a, b))
}
