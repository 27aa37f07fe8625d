//! The RPC channel: one endpoint of a message link.
//!
//! ```text
//!   inbound RpcMessage
//!        │
//!        ▼
//!   ┌──────────┐  closed? drop
//!   │ receive  │──────────────▶ ✗
//!   └────┬─────┘
//!        │ touch activity, wake start()
//!        ▼
//!   lookup: internal registry (_/…) ─▶ application registry
//!        │
//!        ▼
//!   access: channel controller ─▶ internal chain ─▶ configured default
//!        │            Deny ──▶ AccessDeniedError reply
//!        │         missing ──▶ NotFoundError reply
//!        ▼
//!   handler(Invocation) ──▶ Reply::{Ready, Deferred, Stream}
//!        │
//!        ▼
//!   return_type Call   ─▶ one [value, error] to return_addr
//!   return_type Stream ─▶ [value, error, done] frames to return_addr
//! ```
//!
//! Lifecycle: `Inactive ─start()─▶ Active ─close()─▶ Closed`. With
//! `await_first_message`, `start()` stays inactive until something arrives.
//! Once active, an optional watchdog closes the channel after `timeout_ms`
//! of inbound silence, and an optional ticker sends `_/keepalive` notices.
//!
//! All state lives behind `Rc` on one thread. No `RefCell` borrow is held
//! while a handler, observer, access controller, or the transport runs, so
//! any of them may call back into the channel.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::signal::Signal;
use futures_lite::{FutureExt, StreamExt};
use log::{debug, info, warn};

use crate::config::ChannelConfig;
use crate::error::{
    ACCESS_DENIED_ERROR, ConfigError, NOT_FOUND_ERROR, NOT_FOUND_MESSAGE, PANIC_ERROR,
    RpcError, SERIALIZATION_ERROR, SerializationError,
};
use crate::rpc::access::{AccessContext, AccessController, AccessPolicy, PolicyMapAccess};
use crate::rpc::address::{Address, Pattern, RESERVED_NAMESPACE};
use crate::rpc::client::Remote;
use crate::rpc::handler::{Handler, Invocation, LocalBoxStream, Outcome, Reply};
use crate::rpc::message::{ReturnType, RpcMessage, call_frame, stream_frame};
use crate::rpc::registry::HandlerRegistry;
use crate::rpc::reply::{CallSlot, ReplyFuture, decode_call_frame};
use crate::rpc::serializer::{serialize, serialize_all, serialize_error};
use crate::rpc::stream::{Frame, RpcStream, StreamQueue, decode_stream_frame};
use crate::rpc::transport::Transport;
use crate::rpc::value::{Data, ErrorInfo, Value};
use crate::runtime::{self, Executor, Task};

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Constructed, not yet started (or waiting for the first message).
    Inactive,
    /// Liveness timers armed.
    Active,
    /// Terminal. Inbound messages are ignored, outbound ones dropped.
    Closed,
}

type StateObserver = Rc<dyn Fn(ChannelState)>;
type StopSignal = Signal<NoopRawMutex, ()>;

struct Inner {
    id: u64,
    config: ChannelConfig,
    transport: Box<dyn Transport>,
    executor: Rc<Executor>,
    /// Reserved `_/…` handlers: replies, stop listeners, close, keepalive.
    internal: HandlerRegistry,
    registry: Rc<HandlerRegistry>,
    access: RefCell<Option<Rc<dyn AccessController>>>,
    state: Cell<ChannelState>,
    last_activity: Cell<Instant>,
    first_message: Signal<NoopRawMutex, ()>,
    observers: RefCell<Vec<StateObserver>>,
    /// Outstanding calls, keyed by correlation address.
    calls: RefCell<BTreeMap<Address, Rc<CallSlot>>>,
    /// Outstanding client-side streams, keyed by correlation address.
    streams: RefCell<BTreeMap<Address, Rc<StreamQueue>>>,
    /// Streams this side is serving, keyed by the peer's correlation address.
    serving: RefCell<BTreeMap<Address, Rc<StopSignal>>>,
    liveness: RefCell<Vec<Task<()>>>,
}

/// Cheap, clonable handle to a channel.
#[derive(Clone)]
pub struct RpcChannel {
    inner: Rc<Inner>,
}

#[derive(Clone)]
pub struct WeakChannel {
    inner: Weak<Inner>,
}

impl WeakChannel {
    pub fn upgrade(&self) -> Option<RpcChannel> {
        RpcChannel::upgrade(&self.inner)
    }
}

// ── Construction ───────────────────────────────────────────────

pub struct ChannelBuilder {
    transport: Box<dyn Transport>,
    executor: Rc<Executor>,
    config: ChannelConfig,
    registry: Option<Rc<HandlerRegistry>>,
    access: Option<Rc<dyn AccessController>>,
}

impl ChannelBuilder {
    pub fn config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    /// Application handlers. A fresh empty registry is used if unset.
    pub fn registry(mut self, registry: Rc<HandlerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Channel-level access controller, consulted before anything else.
    pub fn access(mut self, controller: impl AccessController + 'static) -> Self {
        self.access = Some(Rc::new(controller));
        self
    }

    pub fn access_shared(mut self, controller: Rc<dyn AccessController>) -> Self {
        self.access = Some(controller);
        self
    }

    pub fn build(self) -> Result<RpcChannel, ConfigError> {
        self.config.validate()?;

        let internal = HandlerRegistry::new();
        internal.add_access_controller(
            PolicyMapAccess::new().with(Pattern::from([RESERVED_NAMESPACE]), AccessPolicy::Allow),
        );
        internal.register(
            Address::close_notice(),
            Handler::new(|inv| {
                info!("RPC[{}]: peer closed the channel", inv.channel.id());
                inv.channel.close(false);
                Reply::value(())
            }),
        );
        internal.register(Address::keepalive(), Handler::new(|_| Reply::value(())));

        let id = NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed);
        debug!("RPC[{id}]: created ({:?})", self.config);

        Ok(RpcChannel {
            inner: Rc::new(Inner {
                id,
                config: self.config,
                transport: self.transport,
                executor: self.executor,
                internal,
                registry: self.registry.unwrap_or_else(HandlerRegistry::shared),
                access: RefCell::new(self.access),
                state: Cell::new(ChannelState::Inactive),
                last_activity: Cell::new(Instant::now()),
                first_message: Signal::new(),
                observers: RefCell::new(Vec::new()),
                calls: RefCell::new(BTreeMap::new()),
                streams: RefCell::new(BTreeMap::new()),
                serving: RefCell::new(BTreeMap::new()),
                liveness: RefCell::new(Vec::new()),
            }),
        })
    }
}

impl RpcChannel {
    pub fn builder(transport: impl Transport + 'static, executor: Rc<Executor>) -> ChannelBuilder {
        ChannelBuilder {
            transport: Box::new(transport),
            executor,
            config: ChannelConfig::default(),
            registry: None,
            access: None,
        }
    }

    fn upgrade(inner: &Weak<Inner>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    /// Non-owning handle, for tasks that must not keep the channel alive.
    pub fn downgrade(&self) -> WeakChannel {
        WeakChannel {
            inner: Rc::downgrade(&self.inner),
        }
    }

    // ── Accessors ──────────────────────────────────────────────

    /// Process-unique channel id.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn state(&self) -> ChannelState {
        self.inner.state.get()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ChannelState::Closed
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.inner.config
    }

    /// Application handler registry.
    pub fn registry(&self) -> &Rc<HandlerRegistry> {
        &self.inner.registry
    }

    /// Reserved-namespace handlers owned by this channel.
    pub fn internal_registry(&self) -> &HandlerRegistry {
        &self.inner.internal
    }

    pub fn executor(&self) -> &Rc<Executor> {
        &self.inner.executor
    }

    /// Replace the channel-level access controller.
    pub fn set_access_controller(&self, controller: Option<Rc<dyn AccessController>>) {
        *self.inner.access.borrow_mut() = controller;
    }

    /// Observe `Active` and `Closed` transitions.
    pub fn on_state_change(&self, observer: impl Fn(ChannelState) + 'static) {
        self.inner.observers.borrow_mut().push(Rc::new(observer));
    }

    /// `true` when both handles refer to the same channel.
    pub fn same_channel(&self, other: &RpcChannel) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Typed address builder rooted at `address`.
    pub fn remote(&self, address: impl Into<Address>) -> Remote {
        Remote::new(self.clone(), address.into())
    }

    /// Number of calls and client streams still awaiting the peer.
    pub fn pending_requests(&self) -> usize {
        self.inner.calls.borrow().len() + self.inner.streams.borrow().len()
    }

    // ── Lifecycle ──────────────────────────────────────────────

    /// Activate the channel and arm the liveness timers.
    ///
    /// With `await_first_message` this waits for the first inbound message.
    /// Returns early (without activating) if the channel closes first.
    pub async fn start(&self) {
        if self.state() != ChannelState::Inactive {
            return;
        }
        if self.inner.config.await_first_message {
            debug!("RPC[{}]: waiting for first message", self.id());
            self.inner.first_message.wait().await;
        }
        if self.state() != ChannelState::Inactive {
            return;
        }

        self.inner.last_activity.set(Instant::now());
        self.inner.state.set(ChannelState::Active);
        info!("RPC[{}]: active", self.id());
        self.arm_liveness();
        self.notify_observers(ChannelState::Active);
    }

    /// Close the channel. Idempotent.
    ///
    /// Every stream still being consumed gets a `_/stopgen` notice so the
    /// peer stops producing, then, with `send_notice`, the peer is told via
    /// `_/close`. Pending calls and streams fail with
    /// [`RpcError::ChannelClosed`], served streams stop, and the liveness
    /// timers are cancelled.
    pub fn close(&self, send_notice: bool) {
        let inner = &self.inner;
        if inner.state.get() == ChannelState::Closed {
            return;
        }
        let unfinished: Vec<Address> = inner
            .streams
            .borrow()
            .iter()
            .filter(|(_, queue)| !queue.is_terminated())
            .map(|(correlation, _)| correlation.clone())
            .collect();
        for correlation in &unfinished {
            self.notify_address(Address::stop_stream(correlation));
        }
        if send_notice {
            self.notify_address(Address::close_notice());
        }
        inner.state.set(ChannelState::Closed);
        info!("RPC[{}]: closed", inner.id);

        inner.internal.clear();
        let liveness = std::mem::take(&mut *inner.liveness.borrow_mut());
        let calls = std::mem::take(&mut *inner.calls.borrow_mut());
        let streams = std::mem::take(&mut *inner.streams.borrow_mut());
        let serving = std::mem::take(&mut *inner.serving.borrow_mut());

        for slot in calls.into_values() {
            slot.settle(Err(RpcError::ChannelClosed));
        }
        for queue in streams.into_values() {
            queue.push(Frame::Failed(RpcError::ChannelClosed));
        }
        for stop in serving.into_values() {
            stop.signal(());
        }
        inner.first_message.signal(());

        self.notify_observers(ChannelState::Closed);
        drop(liveness);
    }

    fn notify_observers(&self, state: ChannelState) {
        let observers = self.inner.observers.borrow().clone();
        for observer in observers {
            observer(state);
        }
    }

    fn arm_liveness(&self) {
        let mut tasks = Vec::new();
        if let Some(timeout) = self.inner.config.timeout() {
            let weak = Rc::downgrade(&self.inner);
            tasks.push(self.inner.executor.spawn(watchdog(weak, timeout)));
        }
        if let Some(interval) = self.inner.config.keepalive_interval() {
            let weak = Rc::downgrade(&self.inner);
            tasks.push(self.inner.executor.spawn(keepalive(weak, interval)));
        }
        self.inner.liveness.borrow_mut().extend(tasks);
    }

    // ── Outbound ───────────────────────────────────────────────

    /// Serialize `args` and post a message.
    pub fn send(
        &self,
        to: impl Into<Address>,
        args: &[Data],
        return_addr: Option<Address>,
        return_type: ReturnType,
    ) -> Result<(), SerializationError> {
        let mut transfer = Vec::new();
        let args = serialize_all(args, &mut transfer)?;
        self.post(
            RpcMessage {
                to: to.into(),
                args,
                return_addr,
                return_type,
            },
            transfer,
        );
        Ok(())
    }

    /// Fire-and-forget message; no reply is expected.
    pub fn notify(&self, to: impl Into<Address>, args: &[Data]) -> Result<(), SerializationError> {
        self.send(to, args, None, ReturnType::Call)
    }

    pub(crate) fn notify_address(&self, to: Address) {
        self.post(RpcMessage::notice(to, Vec::new()), Vec::new());
    }

    fn post(&self, message: RpcMessage, transfer: Vec<crate::rpc::value::Transferable>) {
        if self.is_closed() {
            debug!("RPC[{}]: dropping message to {} on closed channel", self.id(), message.to);
            return;
        }
        self.inner.transport.send(message, transfer);
    }

    /// Call the remote handler at `to` and await its single reply.
    pub fn call(&self, to: impl Into<Address>, args: &[Data]) -> ReplyFuture {
        if self.is_closed() {
            return ReplyFuture::failed(RpcError::ChannelClosed);
        }
        let mut transfer = Vec::new();
        let args = match serialize_all(args, &mut transfer) {
            Ok(args) => args,
            Err(e) => return ReplyFuture::failed(e.into()),
        };

        let correlation = self.inner.internal.next_correlation_address();
        let slot = Rc::new(CallSlot::new());
        self.inner
            .calls
            .borrow_mut()
            .insert(correlation.clone(), slot.clone());

        let origin = Rc::downgrade(&self.inner);
        let origin_id = self.id();
        let key = correlation.clone();
        let reply_slot = slot.clone();
        self.inner.internal.register(
            &correlation,
            Handler::new(move |inv| {
                let outcome = if inv.channel.id() == origin_id {
                    decode_call_frame(inv.args)
                } else {
                    warn!("RPC[{}]: reply for {} from foreign channel", origin_id, key);
                    Err(RpcError::InvalidChannel)
                };
                if let Some(channel) = RpcChannel::upgrade(&origin) {
                    channel.forget_call(&key);
                }
                reply_slot.settle(outcome);
                Reply::value(())
            }),
        );

        self.post(
            RpcMessage {
                to: to.into(),
                args,
                return_addr: Some(correlation.clone()),
                return_type: ReturnType::Call,
            },
            transfer,
        );
        ReplyFuture::pending(self.clone(), correlation, slot)
    }

    /// Call a remote stream handler and consume its values lazily.
    pub fn generate(&self, to: impl Into<Address>, args: &[Data]) -> RpcStream {
        if self.is_closed() {
            return RpcStream::failed(RpcError::ChannelClosed);
        }
        let mut transfer = Vec::new();
        let args = match serialize_all(args, &mut transfer) {
            Ok(args) => args,
            Err(e) => return RpcStream::failed(e.into()),
        };

        let correlation = self.inner.internal.next_correlation_address();
        let queue = Rc::new(StreamQueue::new());
        self.inner
            .streams
            .borrow_mut()
            .insert(correlation.clone(), queue.clone());

        let origin = Rc::downgrade(&self.inner);
        let origin_id = self.id();
        let key = correlation.clone();
        let frames = queue.clone();
        self.inner.internal.register(
            &correlation,
            Handler::new(move |inv| {
                let frame = if inv.channel.id() == origin_id {
                    decode_stream_frame(inv.args)
                } else {
                    warn!("RPC[{}]: stream frame for {} from foreign channel", origin_id, key);
                    Frame::Failed(RpcError::InvalidChannel)
                };
                if frames.push(frame) {
                    if let Some(channel) = RpcChannel::upgrade(&origin) {
                        channel.inner.internal.unregister(&key);
                    }
                }
                Reply::value(())
            }),
        );

        self.post(
            RpcMessage {
                to: to.into(),
                args,
                return_addr: Some(correlation.clone()),
                return_type: ReturnType::Stream,
            },
            transfer,
        );
        RpcStream::open(self.clone(), correlation, queue)
    }

    pub(crate) fn forget_call(&self, correlation: &Address) {
        self.inner.internal.unregister(correlation);
        self.inner.calls.borrow_mut().remove(correlation);
    }

    pub(crate) fn forget_stream(&self, correlation: &Address) {
        self.inner.internal.unregister(correlation);
        self.inner.streams.borrow_mut().remove(correlation);
    }

    // ── Inbound ────────────────────────────────────────────────

    /// Dispatch one inbound message.
    pub fn receive(&self, message: RpcMessage) {
        if self.is_closed() {
            debug!("RPC[{}]: ignoring message to {} on closed channel", self.id(), message.to);
            return;
        }
        self.inner.last_activity.set(Instant::now());
        self.inner.first_message.signal(());

        let RpcMessage {
            to,
            args,
            return_addr,
            return_type,
        } = message;

        let mut wildcards = Vec::new();
        let handler = match self.inner.internal.lookup(&to, &mut wildcards) {
            Some(handler) => Some(handler),
            None => {
                wildcards.clear();
                self.inner.registry.lookup(&to, &mut wildcards)
            }
        };

        if self.decide(&to, &args, &wildcards, handler.as_ref()) == AccessPolicy::Deny {
            warn!("RPC[{}]: access denied for {}", self.id(), to);
            let error = ErrorInfo::new(ACCESS_DENIED_ERROR, format!("Access denied for address {to}"));
            self.reply_error(return_addr, return_type, error);
            return;
        }

        let Some(handler) = handler else {
            debug!("RPC[{}]: no handler at {}", self.id(), to);
            self.reply_error(return_addr, return_type, ErrorInfo::new(NOT_FOUND_ERROR, NOT_FOUND_MESSAGE));
            return;
        };

        let invocation = Invocation {
            channel: self.clone(),
            wildcards,
            args,
        };
        let reply = match panic::catch_unwind(AssertUnwindSafe(|| handler.call(invocation))) {
            Ok(reply) => reply,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!("RPC[{}]: handler at {} panicked: {}", self.id(), to, message);
                Reply::error(ErrorInfo::new(PANIC_ERROR, message))
            }
        };
        self.dispatch_reply(return_addr, return_type, reply);
    }

    /// Channel controller, then the internal chain, then the default.
    fn decide(&self, to: &Address, args: &[Value], wildcards: &[String], handler: Option<&Handler>) -> AccessPolicy {
        let ctx = AccessContext {
            args,
            wildcards,
            channel: self,
            handler,
        };
        let explicit = self.inner.access.borrow().clone();
        explicit
            .and_then(|controller| controller.can(to, &ctx))
            .or_else(|| self.inner.internal.check_access(to, &ctx))
            .unwrap_or(self.inner.config.default_policy)
    }

    fn reply_error(&self, return_addr: Option<Address>, return_type: ReturnType, error: ErrorInfo) {
        let Some(reply_to) = return_addr else {
            return;
        };
        let error = Data::Error(error);
        let done = (return_type == ReturnType::Stream).then_some(true);
        self.send_frame(&reply_to, &Data::Undefined, &error, done);
    }

    fn dispatch_reply(&self, return_addr: Option<Address>, return_type: ReturnType, reply: Reply) {
        let Some(reply_to) = return_addr else {
            if let Reply::Deferred(future) = reply {
                self.spawn(async move {
                    let _ = AssertUnwindSafe(future).catch_unwind().await;
                });
            }
            return;
        };

        match (return_type, reply) {
            (ReturnType::Call, Reply::Ready(outcome)) => self.send_call_reply(&reply_to, outcome),
            (ReturnType::Call, Reply::Deferred(future)) => {
                let channel = self.clone();
                self.spawn(async move {
                    let outcome = settle_deferred(future).await;
                    channel.send_call_reply(&reply_to, outcome);
                });
            }
            (ReturnType::Call, Reply::Stream(mut stream)) => {
                let channel = self.clone();
                self.spawn(async move {
                    let outcome = stream.next().await.unwrap_or(Ok(Data::Undefined));
                    channel.send_call_reply(&reply_to, outcome);
                });
            }
            (ReturnType::Stream, Reply::Ready(outcome)) => self.send_single_stream(&reply_to, outcome),
            (ReturnType::Stream, Reply::Deferred(future)) => {
                let channel = self.clone();
                self.spawn(async move {
                    let outcome = settle_deferred(future).await;
                    channel.send_single_stream(&reply_to, outcome);
                });
            }
            (ReturnType::Stream, Reply::Stream(stream)) => self.serve_stream(reply_to, stream),
        }
    }

    fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        self.inner.executor.spawn(future).detach();
    }

    fn send_call_reply(&self, to: &Address, outcome: Outcome) {
        match outcome {
            Ok(value) => self.send_frame(to, &value, &Data::Undefined, None),
            Err(error) => self.send_frame(to, &Data::Undefined, &error, None),
        };
    }

    /// A non-stream result answering a stream request: one value then
    /// done, or a single terminal error.
    fn send_single_stream(&self, to: &Address, outcome: Outcome) {
        match outcome {
            Ok(value) => {
                if self.send_frame(to, &value, &Data::Undefined, Some(false)) {
                    self.send_frame(to, &Data::Undefined, &Data::Undefined, Some(true));
                }
            }
            Err(error) => {
                self.send_frame(to, &Data::Undefined, &error, Some(true));
            }
        }
    }

    /// Post one reply frame. `done: None` selects the call layout.
    ///
    /// If the payload cannot be serialized a `SerializationError` frame is
    /// sent instead (terminal for streams) and `false` is returned.
    fn send_frame(&self, to: &Address, value: &Data, error: &Data, done: Option<bool>) -> bool {
        let mut transfer = Vec::new();
        let encoded = serialize(value, &mut transfer).and_then(|v| Ok((v, serialize(error, &mut transfer)?)));
        let (value, error, ok) = match encoded {
            Ok((value, error)) => (value, error, true),
            Err(e) => {
                warn!("RPC[{}]: reply to {} not serializable: {}", self.id(), to, e);
                transfer.clear();
                let info = ErrorInfo::new(SERIALIZATION_ERROR, e.to_string());
                (Value::Undefined, serialize_error(&info), false)
            }
        };
        let args = match done {
            None => call_frame(value, error),
            Some(done) => stream_frame(value, error, done || !ok),
        };
        self.post(RpcMessage::notice(to.clone(), args), transfer);
        ok
    }

    fn serve_stream(&self, reply_to: Address, stream: LocalBoxStream<Outcome>) {
        let stop_addr = Address::stop_stream(&reply_to);
        let stop = Rc::new(StopSignal::new());
        self.inner
            .serving
            .borrow_mut()
            .insert(reply_to.clone(), stop.clone());

        let listener_stop = stop.clone();
        let listener_addr = stop_addr.clone();
        self.inner.internal.register(
            &stop_addr,
            Handler::new(move |inv| {
                debug!("RPC[{}]: consumer stopped {}", inv.channel.id(), listener_addr);
                listener_stop.signal(());
                inv.channel.inner.internal.unregister(&listener_addr);
                Reply::value(())
            }),
        );

        let channel = self.clone();
        self.spawn(async move {
            channel.pump_stream(&reply_to, stream, &stop).await;
            channel.inner.internal.unregister(&stop_addr);
            channel.inner.serving.borrow_mut().remove(&reply_to);
        });
    }

    async fn pump_stream(&self, to: &Address, mut stream: LocalBoxStream<Outcome>, stop: &StopSignal) {
        enum Step {
            Stop,
            Next(Option<Outcome>),
        }

        loop {
            let step = futures_lite::future::or(
                async {
                    stop.wait().await;
                    Step::Stop
                },
                async { Step::Next(stream.next().await) },
            )
            .await;

            match step {
                Step::Stop => return,
                Step::Next(None) => {
                    self.send_frame(to, &Data::Undefined, &Data::Undefined, Some(true));
                    return;
                }
                Step::Next(Some(Ok(value))) => {
                    if self.is_closed() || !self.send_frame(to, &value, &Data::Undefined, Some(false)) {
                        return;
                    }
                }
                Step::Next(Some(Err(error))) => {
                    self.send_frame(to, &Data::Undefined, &error, Some(true));
                    return;
                }
            }
        }
    }
}

impl fmt::Debug for RpcChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcChannel")
            .field("id", &self.inner.id)
            .field("state", &self.inner.state.get())
            .finish_non_exhaustive()
    }
}

async fn settle_deferred(future: crate::rpc::handler::LocalBoxFuture<Outcome>) -> Outcome {
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => Err(Data::Error(ErrorInfo::new(
            PANIC_ERROR,
            panic_message(payload.as_ref()),
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_owned()
    }
}

// ── Liveness tasks ─────────────────────────────────────────────

async fn watchdog(inner: Weak<Inner>, timeout: Duration) {
    loop {
        let Some(channel) = RpcChannel::upgrade(&inner) else {
            return;
        };
        if channel.is_closed() {
            return;
        }
        let idle = channel.inner.last_activity.get().elapsed();
        if idle >= timeout {
            warn!("RPC[{}]: no traffic for {:?}, closing", channel.id(), idle);
            channel.close(true);
            return;
        }
        drop(channel);
        runtime::sleep(timeout - idle).await;
    }
}

async fn keepalive(inner: Weak<Inner>, interval: Duration) {
    loop {
        runtime::sleep(interval).await;
        let Some(channel) = RpcChannel::upgrade(&inner) else {
            return;
        };
        if channel.is_closed() {
            return;
        }
        channel.notify_address(Address::keepalive());
    }
}
