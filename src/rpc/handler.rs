//! Handlers: the callables registered at addresses.
//!
//! A [`Handler`] receives an [`Invocation`] (channel, wildcard captures,
//! deserialized arguments) and produces a [`Reply`]:
//!
//! - `Ready`: an immediate value or error
//! - `Deferred`: a future resolving to a value or error
//! - `Stream`: a lazy sequence of values, terminated by exhaustion or error
//!
//! Handlers also carry optional permission annotations consumed by
//! [`PermissionAccess`](crate::rpc::access::PermissionAccess). The
//! combinators (`with_*`) wrap a handler and preserve those annotations.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use futures_lite::Stream;

use crate::rpc::access::{AccessContext, OptAccessPolicy, PermissionRequest};
use crate::rpc::channel::RpcChannel;
use crate::rpc::value::{Data, Value};

/// Success value or error value produced by a handler.
pub type Outcome = Result<Data, Data>;

pub type LocalBoxFuture<T> = Pin<Box<dyn Future<Output = T>>>;
pub type LocalBoxStream<T> = Pin<Box<dyn Stream<Item = T>>>;

/// Arguments of one inbound request.
pub struct Invocation {
    pub channel: RpcChannel,
    /// Segments captured by wildcards, in address order.
    pub wildcards: Vec<String>,
    pub args: Vec<Value>,
}

impl Invocation {
    /// Argument `index`, or `Undefined` when absent.
    pub fn arg(&self, index: usize) -> &Value {
        const UNDEFINED: &Value = &Value::Undefined;
        self.args.get(index).unwrap_or(UNDEFINED)
    }
}

pub enum Reply {
    Ready(Outcome),
    Deferred(LocalBoxFuture<Outcome>),
    Stream(LocalBoxStream<Outcome>),
}

impl Reply {
    pub fn value(value: impl Into<Data>) -> Self {
        Self::Ready(Ok(value.into()))
    }

    pub fn error(error: impl Into<Data>) -> Self {
        Self::Ready(Err(error.into()))
    }

    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = Outcome> + 'static,
    {
        Self::Deferred(Box::pin(future))
    }

    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Outcome> + 'static,
    {
        Self::Stream(Box::pin(stream))
    }
}

impl From<Outcome> for Reply {
    fn from(outcome: Outcome) -> Self {
        Self::Ready(outcome)
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(outcome) => f.debug_tuple("Ready").field(outcome).finish(),
            Self::Deferred(_) => write!(f, "Deferred(..)"),
            Self::Stream(_) => write!(f, "Stream(..)"),
        }
    }
}

type HandlerFn = dyn Fn(Invocation) -> Reply;

/// Access predicate attached to a handler. It may demand permissions
/// through the request; those are verified after it returns.
pub type CanCallFn = dyn Fn(&mut PermissionRequest<'_>, &AccessContext<'_>) -> OptAccessPolicy;

#[derive(Clone)]
pub struct Handler {
    func: Rc<HandlerFn>,
    permissions: BTreeSet<String>,
    can_call: Option<Rc<CanCallFn>>,
}

impl Handler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Invocation) -> Reply + 'static,
    {
        Self {
            func: Rc::new(f),
            permissions: BTreeSet::new(),
            can_call: None,
        }
    }

    /// A handler that only looks at its arguments.
    pub fn args_only<F>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Reply + 'static,
    {
        Self::new(move |inv| f(inv.args))
    }

    pub fn call(&self, invocation: Invocation) -> Reply {
        (self.func)(invocation)
    }

    pub fn required_permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    pub fn can_call(&self) -> Option<Rc<CanCallFn>> {
        self.can_call.clone()
    }

    // ── Annotations ────────────────────────────────────────────

    pub fn require_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    pub fn with_can_call<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&mut PermissionRequest<'_>, &AccessContext<'_>) -> OptAccessPolicy + 'static,
    {
        self.can_call = Some(Rc::new(predicate));
        self
    }

    // ── Combinators ────────────────────────────────────────────

    fn wrap<F>(self, f: F) -> Self
    where
        F: Fn(&HandlerFn, Invocation) -> Reply + 'static,
    {
        let inner = self.func;
        Self {
            func: Rc::new(move |inv| f(&*inner, inv)),
            permissions: self.permissions,
            can_call: self.can_call,
        }
    }

    /// Drop the first `n` arguments before calling.
    pub fn with_dropped_args(self, n: usize) -> Self {
        self.wrap(move |inner, mut inv| {
            inv.args = inv.args.split_off(n.min(inv.args.len()));
            inner(inv)
        })
    }

    /// If called with a single array argument, spread it into the
    /// argument list.
    pub fn with_expanded_args(self) -> Self {
        self.wrap(|inner, mut inv| {
            if let [Value::Array(_)] = inv.args.as_slice() {
                if let Some(Value::Array(items)) = inv.args.pop() {
                    inv.args = items;
                }
            }
            inner(inv)
        })
    }

    /// Prepend wildcard captures to the arguments (as strings).
    pub fn with_wildcards_as_args(self) -> Self {
        self.wrap(|inner, mut inv| {
            let mut args: Vec<Value> = inv.wildcards.drain(..).map(Value::String).collect();
            args.append(&mut inv.args);
            inv.args = args;
            inner(inv)
        })
    }

    /// Run `guard` over the arguments first; an `Err` becomes the reply.
    pub fn with_guard<G>(self, guard: G) -> Self
    where
        G: Fn(&[Value]) -> Result<(), Data> + 'static,
    {
        self.wrap(move |inner, inv| match guard(&inv.args) {
            Ok(()) => inner(inv),
            Err(e) => Reply::Ready(Err(e)),
        })
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("permissions", &self.permissions)
            .field("can_call", &self.can_call.is_some())
            .finish_non_exhaustive()
    }
}
