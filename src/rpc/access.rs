//! Access control for inbound calls.
//!
//! Every controller answers the same question for an address and request
//! context: allow, deny, or no opinion (`None`). Controllers compose:
//!
//! ```text
//!   ChainAccess ──▶ [ c1, c2, c3 ] ──▶ first Some(_) wins ──▶ else default
//! ```
//!
//! | Controller          | Decides from                                    |
//! |---------------------|-------------------------------------------------|
//! | [`AllowAll`]        | nothing, always allows                          |
//! | [`DenyAll`]         | nothing, always denies                          |
//! | [`FnAccess`]        | a closure                                       |
//! | [`ChainAccess`]     | an ordered list of controllers                  |
//! | [`PolicyMapAccess`] | fixed policies stored per address pattern       |
//! | [`LookupAccess`]    | predicates stored per address pattern           |
//! | [`PermissionAccess`]| granted permission names vs. handler annotations|

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::rpc::address::{Address, Pattern};
use crate::rpc::address_map::AddressMap;
use crate::rpc::channel::RpcChannel;
use crate::rpc::handler::Handler;
use crate::rpc::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessPolicy {
    Allow,
    Deny,
}

/// A decision, or `None` for "no opinion".
pub type OptAccessPolicy = Option<AccessPolicy>;

/// Everything a controller may inspect about an inbound request.
#[derive(Clone, Copy)]
pub struct AccessContext<'a> {
    pub args: &'a [Value],
    pub wildcards: &'a [String],
    pub channel: &'a RpcChannel,
    /// The resolved handler, when one exists.
    pub handler: Option<&'a Handler>,
}

pub trait AccessController {
    fn can(&self, address: &Address, ctx: &AccessContext<'_>) -> OptAccessPolicy;
}

impl<T: AccessController + ?Sized> AccessController for Rc<T> {
    fn can(&self, address: &Address, ctx: &AccessContext<'_>) -> OptAccessPolicy {
        (**self).can(address, ctx)
    }
}

impl<T: AccessController + ?Sized> AccessController for Box<T> {
    fn can(&self, address: &Address, ctx: &AccessContext<'_>) -> OptAccessPolicy {
        (**self).can(address, ctx)
    }
}

// ── Constant controllers ───────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessController for AllowAll {
    fn can(&self, _address: &Address, _ctx: &AccessContext<'_>) -> OptAccessPolicy {
        Some(AccessPolicy::Allow)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl AccessController for DenyAll {
    fn can(&self, _address: &Address, _ctx: &AccessContext<'_>) -> OptAccessPolicy {
        Some(AccessPolicy::Deny)
    }
}

// ── Closure controller ─────────────────────────────────────────

pub struct FnAccess<F>(F);

impl<F> FnAccess<F>
where
    F: Fn(&Address, &AccessContext<'_>) -> OptAccessPolicy,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> AccessController for FnAccess<F>
where
    F: Fn(&Address, &AccessContext<'_>) -> OptAccessPolicy,
{
    fn can(&self, address: &Address, ctx: &AccessContext<'_>) -> OptAccessPolicy {
        (self.0)(address, ctx)
    }
}

// ── Chain ──────────────────────────────────────────────────────

/// Ordered controllers; the first definite answer wins and later
/// controllers are not consulted.
#[derive(Clone, Default)]
pub struct ChainAccess {
    controllers: Vec<Rc<dyn AccessController>>,
    default: OptAccessPolicy,
}

impl ChainAccess {
    /// An empty chain answering `default` when nothing decides.
    pub fn new(default: OptAccessPolicy) -> Self {
        Self {
            controllers: Vec::new(),
            default,
        }
    }

    pub fn with(mut self, controller: impl AccessController + 'static) -> Self {
        self.push(controller);
        self
    }

    pub fn push(&mut self, controller: impl AccessController + 'static) {
        self.controllers.push(Rc::new(controller));
    }

    pub fn push_shared(&mut self, controller: Rc<dyn AccessController>) {
        self.controllers.push(controller);
    }

    pub fn default_policy(&self) -> OptAccessPolicy {
        self.default
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

impl AccessController for ChainAccess {
    fn can(&self, address: &Address, ctx: &AccessContext<'_>) -> OptAccessPolicy {
        self.controllers
            .iter()
            .find_map(|c| c.can(address, ctx))
            .or(self.default)
    }
}

// ── Pattern-keyed policies ─────────────────────────────────────

/// Fixed decisions stored in an [`AddressMap`]; a policy on a prefix covers
/// the whole subtree unless something more specific overrides it.
#[derive(Debug, Clone, Default)]
pub struct PolicyMapAccess {
    policies: AddressMap<AccessPolicy>,
}

impl PolicyMapAccess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or with `None`, clear) the policy for `pattern`.
    pub fn set(&mut self, pattern: impl Into<Pattern>, policy: OptAccessPolicy) {
        self.policies.put(&pattern.into(), policy);
    }

    pub fn with(mut self, pattern: impl Into<Pattern>, policy: AccessPolicy) -> Self {
        self.set(pattern, Some(policy));
        self
    }
}

impl AccessController for PolicyMapAccess {
    fn can(&self, address: &Address, _ctx: &AccessContext<'_>) -> OptAccessPolicy {
        self.policies.get(address).copied()
    }
}

type Predicate = Rc<dyn Fn(&Address, &AccessContext<'_>) -> OptAccessPolicy>;

/// Predicates stored in an [`AddressMap`]; the most specific one decides.
#[derive(Clone, Default)]
pub struct LookupAccess {
    predicates: AddressMap<Predicate>,
}

impl LookupAccess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<F>(&mut self, pattern: impl Into<Pattern>, predicate: F)
    where
        F: Fn(&Address, &AccessContext<'_>) -> OptAccessPolicy + 'static,
    {
        self.predicates.insert(&pattern.into(), Rc::new(predicate));
    }

    pub fn remove(&mut self, pattern: impl Into<Pattern>) {
        self.predicates.remove(&pattern.into());
    }

    pub fn with<F>(mut self, pattern: impl Into<Pattern>, predicate: F) -> Self
    where
        F: Fn(&Address, &AccessContext<'_>) -> OptAccessPolicy + 'static,
    {
        self.set(pattern, predicate);
        self
    }
}

impl AccessController for LookupAccess {
    fn can(&self, address: &Address, ctx: &AccessContext<'_>) -> OptAccessPolicy {
        self.predicates.get(address).and_then(|p| p(address, ctx))
    }
}

// ── Permissions ────────────────────────────────────────────────

/// Permissions a handler's `can_call` predicate asks for. They are checked
/// against the granted set after the predicate returns.
pub struct PermissionRequest<'a> {
    granted: &'a BTreeSet<String>,
    requested: Vec<String>,
}

impl PermissionRequest<'_> {
    /// Demand `permission`; the call is denied if it is not granted.
    pub fn require(&mut self, permission: impl Into<String>) {
        self.requested.push(permission.into());
    }

    pub fn is_granted(&self, permission: &str) -> bool {
        self.granted.contains(permission)
    }
}

/// Grants named permissions and enforces the ones handlers declare.
///
/// A call is denied when the handler lists a required permission that is
/// not granted, or when its `can_call` predicate requires one. Handlers
/// with neither annotation get no opinion.
#[derive(Debug, Default)]
pub struct PermissionAccess {
    granted: RefCell<BTreeSet<String>>,
}

impl PermissionAccess {
    pub fn new<I, S>(granted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            granted: RefCell::new(granted.into_iter().map(Into::into).collect()),
        }
    }

    pub fn grant(&self, permission: impl Into<String>) {
        self.granted.borrow_mut().insert(permission.into());
    }

    pub fn revoke(&self, permission: &str) {
        self.granted.borrow_mut().remove(permission);
    }

    pub fn is_granted(&self, permission: &str) -> bool {
        self.granted.borrow().contains(permission)
    }
}

impl AccessController for PermissionAccess {
    fn can(&self, address: &Address, ctx: &AccessContext<'_>) -> OptAccessPolicy {
        let handler = ctx.handler?;
        let granted = self.granted.borrow().clone();

        if let Some(missing) = handler
            .required_permissions()
            .iter()
            .find(|p| !granted.contains(*p))
        {
            debug!("RPC: {address} requires ungranted permission {missing}");
            return Some(AccessPolicy::Deny);
        }

        let predicate = handler.can_call()?;
        let mut request = PermissionRequest {
            granted: &granted,
            requested: Vec::new(),
        };
        let verdict = predicate(&mut request, ctx);
        if let Some(missing) = request.requested.iter().find(|p| !granted.contains(*p)) {
            debug!("RPC: {address} predicate requires ungranted permission {missing}");
            return Some(AccessPolicy::Deny);
        }
        verdict
    }
}
