//! Handler registry: an [`AddressMap`] of handlers plus a correlation
//! counter and an access chain.
//!
//! A registry is shared (`Rc<HandlerRegistry>`) between channels and the
//! application, so all mutation goes through interior mutability. Lookups
//! return a cloned [`Handler`] and never hold a borrow while user code runs;
//! handlers may freely register or unregister from inside a call.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::debug;

use crate::rpc::access::{AccessContext, AccessController, ChainAccess, OptAccessPolicy};
use crate::rpc::address::{Address, Pattern};
use crate::rpc::address_map::AddressMap;
use crate::rpc::handler::{Handler, Invocation, Reply};

pub struct HandlerRegistry {
    handlers: RefCell<AddressMap<Handler>>,
    next_id: Cell<u64>,
    access: RefCell<ChainAccess>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: RefCell::new(AddressMap::new()),
            next_id: Cell::new(0),
            access: RefCell::new(ChainAccess::new(None)),
        }
    }

    pub fn shared() -> Rc<Self> {
        Rc::new(Self::new())
    }

    pub fn register(&self, pattern: impl Into<Pattern>, handler: Handler) {
        let pattern = pattern.into();
        debug!("RPC: register {pattern}");
        self.handlers.borrow_mut().insert(&pattern, handler);
    }

    pub fn unregister(&self, pattern: impl Into<Pattern>) {
        self.handlers.borrow_mut().remove(&pattern.into());
    }

    pub fn register_all(&self, set: &HandlerSet) {
        let mut handlers = self.handlers.borrow_mut();
        for (pattern, handler) in set.iter() {
            handlers.insert(pattern, handler.clone());
        }
    }

    pub fn unregister_all(&self, set: &HandlerSet) {
        let mut handlers = self.handlers.borrow_mut();
        for (pattern, _) in set.iter() {
            handlers.remove(pattern);
        }
    }

    /// Resolve `address`, recording wildcard captures into `wildcards`.
    pub fn lookup(&self, address: &Address, wildcards: &mut Vec<String>) -> Option<Handler> {
        self.handlers.borrow().get_captured(address, wildcards).cloned()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.handlers.borrow().get(address).is_some()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.handlers.borrow_mut().clear();
    }

    /// Fresh reply address `_/ret/id<N>`; N counts up from 0 per registry.
    pub fn next_correlation_address(&self) -> Address {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        Address::correlation(id)
    }

    /// Append a controller to this registry's access chain.
    pub fn add_access_controller(&self, controller: impl AccessController + 'static) {
        self.access.borrow_mut().push(controller);
    }

    /// Evaluate this registry's access chain.
    pub fn check_access(&self, address: &Address, ctx: &AccessContext<'_>) -> OptAccessPolicy {
        let chain = self.access.borrow().clone();
        chain.can(address, ctx)
    }
}

// ── Handler sets ───────────────────────────────────────────────

/// A group of handlers registered and removed together.
#[derive(Clone, Default)]
pub struct HandlerSet {
    entries: Vec<(Pattern, Handler)>,
}

impl HandlerSet {
    pub fn builder() -> HandlerSetBuilder {
        HandlerSetBuilder::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Pattern, &Handler)> {
        self.entries.iter().map(|(p, h)| (p, h))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Default)]
pub struct HandlerSetBuilder {
    entries: Vec<(Pattern, Handler)>,
}

impl HandlerSetBuilder {
    pub fn handler(mut self, pattern: impl Into<Pattern>, handler: Handler) -> Self {
        self.entries.push((pattern.into(), handler));
        self
    }

    /// Register `method` bound to a shared receiver.
    pub fn bind<T, F>(self, receiver: &Rc<T>, pattern: impl Into<Pattern>, method: F) -> Self
    where
        T: 'static,
        F: Fn(&T, Invocation) -> Reply + 'static,
    {
        let receiver = Rc::clone(receiver);
        self.handler(pattern, Handler::new(move |inv| method(&receiver, inv)))
    }

    pub fn build(self) -> HandlerSet {
        HandlerSet {
            entries: self.entries,
        }
    }
}
