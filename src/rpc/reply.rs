//! Client side of the call protocol: a future for one reply.
//!
//! The channel registers a one-shot handler at a fresh correlation
//! address; when the `[value, error]` frame arrives it settles the shared
//! [`CallSlot`] and the [`ReplyFuture`] resolves. A slot settles at most
//! once, so a late reply after close (or a duplicate) is ignored.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use embassy_sync::waitqueue::WakerRegistration;

use crate::error::RpcError;
use crate::rpc::address::Address;
use crate::rpc::channel::RpcChannel;
use crate::rpc::value::Value;

pub(crate) struct CallSlot {
    outcome: RefCell<Option<Result<Value, RpcError>>>,
    settled: Cell<bool>,
    waker: RefCell<WakerRegistration>,
}

impl CallSlot {
    pub(crate) fn new() -> Self {
        Self {
            outcome: RefCell::new(None),
            settled: Cell::new(false),
            waker: RefCell::new(WakerRegistration::new()),
        }
    }

    /// Store the outcome unless one was already stored.
    pub(crate) fn settle(&self, outcome: Result<Value, RpcError>) -> bool {
        if self.settled.replace(true) {
            return false;
        }
        *self.outcome.borrow_mut() = Some(outcome);
        self.waker.borrow_mut().wake();
        true
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.settled.get()
    }
}

/// Decode a `[value, error]` reply frame.
pub(crate) fn decode_call_frame(mut args: Vec<Value>) -> Result<Value, RpcError> {
    let error = if args.len() > 1 { args.swap_remove(1) } else { Value::Undefined };
    if !error.is_nullish() {
        return Err(RpcError::from_remote(error));
    }
    Ok(args.into_iter().next().unwrap_or_default())
}

/// Resolves with the remote handler's result.
///
/// Dropping the future before it resolves unregisters the correlation
/// handler; a reply arriving afterwards is answered with not-found by
/// this side and otherwise ignored.
pub struct ReplyFuture {
    slot: Rc<CallSlot>,
    pending: Option<(RpcChannel, Address)>,
}

impl ReplyFuture {
    pub(crate) fn pending(channel: RpcChannel, correlation: Address, slot: Rc<CallSlot>) -> Self {
        Self {
            slot,
            pending: Some((channel, correlation)),
        }
    }

    pub(crate) fn failed(error: RpcError) -> Self {
        let slot = Rc::new(CallSlot::new());
        slot.settle(Err(error));
        Self {
            slot,
            pending: None,
        }
    }

    /// The reply address this call is waiting on.
    pub fn correlation(&self) -> Option<&Address> {
        self.pending.as_ref().map(|(_, addr)| addr)
    }

    pub fn is_settled(&self) -> bool {
        self.slot.is_settled()
    }
}

impl Future for ReplyFuture {
    type Output = Result<Value, RpcError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let outcome = self.slot.outcome.borrow_mut().take();
        if let Some(outcome) = outcome {
            self.pending = None;
            return Poll::Ready(outcome);
        }
        if self.slot.is_settled() {
            // Outcome already taken by an earlier poll.
            return Poll::Ready(Err(RpcError::ChannelClosed));
        }
        self.slot.waker.borrow_mut().register(cx.waker());
        Poll::Pending
    }
}

impl Drop for ReplyFuture {
    fn drop(&mut self) {
        if let Some((channel, correlation)) = self.pending.take() {
            if !self.slot.is_settled() {
                channel.forget_call(&correlation);
            }
        }
    }
}
