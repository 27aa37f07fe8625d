//! Client side of the stream protocol.
//!
//! ```text
//!   remote                                   local
//!   ──────                                   ─────
//!   [v1, undefined, false]  ──▶  queue ──▶  Some(Ok(v1))
//!   [v2, undefined, false]  ──▶  queue ──▶  Some(Ok(v2))
//!   [undefined, undefined, true] ──▶ ...──▶ None            (done)
//!   [undefined, err, true]  ──▶  queue ──▶  Some(Err(e)), then None
//!
//!   RpcStream dropped early ──▶ _/stopgen/<correlation> ──▶ remote stops
//! ```
//!
//! Frames are buffered in arrival order, so the consumer may fall behind
//! without losing values. The correlation handler is removed as soon as a
//! terminal frame arrives.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use embassy_sync::waitqueue::WakerRegistration;
use futures_lite::Stream;
use log::debug;

use crate::error::RpcError;
use crate::rpc::address::Address;
use crate::rpc::channel::RpcChannel;
use crate::rpc::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Frame {
    Item(Value),
    Failed(RpcError),
    Done,
}

impl Frame {
    fn is_terminal(&self) -> bool {
        !matches!(self, Self::Item(_))
    }
}

/// Decode a `[value, error, done]` frame.
pub(crate) fn decode_stream_frame(args: Vec<Value>) -> Frame {
    let mut it = args.into_iter();
    let value = it.next().unwrap_or_default();
    let error = it.next().unwrap_or_default();
    let done = it.next().unwrap_or_default();
    if !error.is_nullish() {
        Frame::Failed(RpcError::from_remote(error))
    } else if done.is_truthy() {
        Frame::Done
    } else {
        Frame::Item(value)
    }
}

pub(crate) struct StreamQueue {
    frames: RefCell<VecDeque<Frame>>,
    terminated: Cell<bool>,
    waker: RefCell<WakerRegistration>,
}

impl StreamQueue {
    pub(crate) fn new() -> Self {
        Self {
            frames: RefCell::new(VecDeque::new()),
            terminated: Cell::new(false),
            waker: RefCell::new(WakerRegistration::new()),
        }
    }

    /// Enqueue a frame. Frames after a terminal one are dropped.
    /// Returns `true` if `frame` ended the stream.
    pub(crate) fn push(&self, frame: Frame) -> bool {
        if self.terminated.get() {
            return false;
        }
        let terminal = frame.is_terminal();
        self.terminated.set(terminal);
        self.frames.borrow_mut().push_back(frame);
        self.waker.borrow_mut().wake();
        terminal
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.terminated.get()
    }
}

/// Values produced by a remote stream handler.
///
/// Implements [`Stream`]; use `futures_lite::StreamExt::next` or the
/// inherent [`next`](RpcStream::next). Dropping the stream (or calling
/// [`cancel`](RpcStream::cancel)) before the remote finishes sends a single
/// stop notice.
pub struct RpcStream {
    queue: Rc<StreamQueue>,
    channel: Option<RpcChannel>,
    correlation: Address,
    finished: bool,
}

impl RpcStream {
    pub(crate) fn open(channel: RpcChannel, correlation: Address, queue: Rc<StreamQueue>) -> Self {
        Self {
            queue,
            channel: Some(channel),
            correlation,
            finished: false,
        }
    }

    /// A stream that yields `error` once and ends.
    pub(crate) fn failed(error: RpcError) -> Self {
        let queue = Rc::new(StreamQueue::new());
        queue.push(Frame::Failed(error));
        Self {
            queue,
            channel: None,
            correlation: Address::default(),
            finished: false,
        }
    }

    pub fn correlation(&self) -> &Address {
        &self.correlation
    }

    /// Next value, or `None` once the stream is done.
    pub async fn next(&mut self) -> Option<Result<Value, RpcError>> {
        futures_lite::StreamExt::next(self).await
    }

    /// Drain the remaining values.
    pub async fn collect(mut self) -> Result<Vec<Value>, RpcError> {
        let mut out = Vec::new();
        while let Some(item) = self.next().await {
            out.push(item?);
        }
        Ok(out)
    }

    /// Stop consuming. If the remote has not finished, it is told to stop.
    pub fn cancel(&mut self) {
        self.finished = true;
        self.release();
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn release(&mut self) {
        let Some(channel) = self.channel.take() else {
            return;
        };
        channel.forget_stream(&self.correlation);
        if !self.queue.is_terminated() && !channel.is_closed() {
            debug!("RPC[{}]: stopping remote stream {}", channel.id(), self.correlation);
            channel.notify_address(Address::stop_stream(&self.correlation));
        }
    }
}

impl Stream for RpcStream {
    type Item = Result<Value, RpcError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        let frame = self.queue.frames.borrow_mut().pop_front();
        match frame {
            Some(Frame::Item(value)) => Poll::Ready(Some(Ok(value))),
            Some(Frame::Failed(error)) => {
                self.finished = true;
                self.release();
                Poll::Ready(Some(Err(error)))
            }
            Some(Frame::Done) => {
                self.finished = true;
                self.release();
                Poll::Ready(None)
            }
            None => {
                self.queue.waker.borrow_mut().register(cx.waker());
                Poll::Pending
            }
        }
    }
}

impl Drop for RpcStream {
    fn drop(&mut self) {
        self.release();
    }
}
