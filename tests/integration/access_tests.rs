//! Access pipeline: channel controller, reserved namespace, default policy.

use std::rc::Rc;

use chanrpc::rpc::access::{
    AccessContext, ChainAccess, DenyAll, LookupAccess, PermissionAccess, PolicyMapAccess,
};
use chanrpc::{
    AccessPolicy, Address, ChannelConfig, Data, Handler, Pattern, Reply, RpcError, Value,
};

use crate::support::{pair, pair_with};

fn echo() -> Handler {
    Handler::args_only(|args| Reply::value(Data::from(Value::Array(args))))
}

#[test]
fn denied_is_distinct_from_missing() {
    let access = PolicyMapAccess::new().with(Pattern::parse("admin"), AccessPolicy::Deny);
    let p = pair_with(
        ChannelConfig::default(),
        ChannelConfig::default(),
        Some(Rc::new(access)),
    );
    p.server_registry().register(["admin", "reboot"], echo());

    let denied = p.run(p.client.call(["admin", "reboot"], &[]));
    assert!(matches!(denied, Err(RpcError::AccessDenied(_))));

    // Denial applies even where nothing is registered.
    let denied = p.run(p.client.call(["admin", "ghost"], &[]));
    assert!(matches!(denied, Err(RpcError::AccessDenied(_))));

    let missing = p.run(p.client.call(["user", "ghost"], &[]));
    assert!(matches!(missing, Err(RpcError::NotFound(_))));
}

#[test]
fn default_deny_with_explicit_allow() {
    let server = ChannelConfig::default().with_default_policy(AccessPolicy::Deny);
    let access = PolicyMapAccess::new().with(Pattern::parse("public"), AccessPolicy::Allow);
    let p = pair_with(ChannelConfig::default(), server, Some(Rc::new(access)));
    p.server_registry().register(Pattern::parse("public/*"), echo());
    p.server_registry().register(["private"], echo());

    assert!(p.run(p.client.call(["public", "echo"], &[])).is_ok());
    assert!(matches!(
        p.run(p.client.call(["private"], &[])),
        Err(RpcError::AccessDenied(_))
    ));
}

#[test]
fn replies_pass_a_default_deny_client() {
    let client = ChannelConfig::default().with_default_policy(AccessPolicy::Deny);
    let p = pair_with(client, ChannelConfig::default(), None);
    p.server_registry().register(["ping"], Handler::new(|_| Reply::value("pong")));

    assert_eq!(p.run(p.client.call(["ping"], &[])), Ok(Value::from("pong")));
    let values = p.run(p.client.generate(["ping"], &[]).collect());
    assert_eq!(values, Ok(vec![Value::from("pong")]));
}

#[test]
fn permissions_gate_annotated_handlers() {
    let permissions = Rc::new(PermissionAccess::new(["read"]));
    let p = pair_with(
        ChannelConfig::default(),
        ChannelConfig::default(),
        Some(permissions.clone()),
    );
    p.server_registry()
        .register(["doc", "read"], echo().require_permission("read"));
    p.server_registry()
        .register(["doc", "write"], echo().require_permission("write"));

    assert!(p.run(p.client.call(["doc", "read"], &[])).is_ok());
    assert!(matches!(
        p.run(p.client.call(["doc", "write"], &[])),
        Err(RpcError::AccessDenied(_))
    ));

    permissions.grant("write");
    assert!(p.run(p.client.call(["doc", "write"], &[])).is_ok());
}

#[test]
fn predicates_see_arguments_and_wildcards() {
    let lookup = LookupAccess::new().with(
        Pattern::parse("files/*"),
        |_: &Address, ctx: &AccessContext<'_>| {
            let owner = ctx.wildcards.first().map(String::as_str);
            let caller = ctx.args.first().and_then(Value::as_str);
            Some(if owner == caller {
                AccessPolicy::Allow
            } else {
                AccessPolicy::Deny
            })
        },
    );
    let p = pair_with(
        ChannelConfig::default(),
        ChannelConfig::default(),
        Some(Rc::new(lookup)),
    );
    p.server_registry().register(Pattern::parse("files/*"), echo());

    assert!(p.run(p.client.call(["files", "ann"], &[Data::from("ann")])).is_ok());
    assert!(matches!(
        p.run(p.client.call(["files", "ann"], &[Data::from("bob")])),
        Err(RpcError::AccessDenied(_))
    ));
}

#[test]
fn chained_controllers_short_circuit() {
    let chain = ChainAccess::new(None)
        .with(PolicyMapAccess::new().with(Pattern::parse("open"), AccessPolicy::Allow))
        .with(DenyAll);
    let p = pair_with(
        ChannelConfig::default(),
        ChannelConfig::default(),
        Some(Rc::new(chain)),
    );
    p.server_registry().register(["open"], echo());
    p.server_registry().register(["closed"], echo());

    assert!(p.run(p.client.call(["open"], &[])).is_ok());
    assert!(matches!(
        p.run(p.client.call(["closed"], &[])),
        Err(RpcError::AccessDenied(_))
    ));
}

#[test]
fn controller_can_be_swapped_at_runtime() {
    let p = pair();
    p.server_registry().register(["x"], echo());
    assert!(p.run(p.client.call(["x"], &[])).is_ok());

    p.server.set_access_controller(Some(Rc::new(DenyAll)));
    assert!(matches!(
        p.run(p.client.call(["x"], &[])),
        Err(RpcError::AccessDenied(_))
    ));
}
