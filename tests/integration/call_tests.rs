//! Call protocol: one request, one `[value, error]` reply.

use chanrpc::error::{NOT_FOUND_MESSAGE, PANIC_ERROR};
use chanrpc::rpc::serializer::REDACTED_STACK;
use chanrpc::{Address, ChannelState, Data, ErrorInfo, Handler, Pattern, Reply, RpcError, Value};

use crate::support::{pair, settle, sleep_ms};

#[test]
fn wildcard_segments_reach_the_handler() {
    let p = pair();
    p.server_registry().register(
        Pattern::parse("net/*/hello"),
        Handler::new(|inv| {
            let caps = inv.wildcards.into_iter().map(Data::from).collect::<Vec<_>>();
            Reply::value(caps)
        }),
    );

    let out = p.run(p.client.call(["net", "x", "hello"], &[]));
    assert_eq!(out, Ok(Value::Array(vec![Value::from("x")])));
}

#[test]
fn missing_handler_is_not_found() {
    let p = pair();
    let out = p.run(p.client.call(["no", "such", "thing"], &[]));
    match out {
        Err(RpcError::NotFound(info)) => assert_eq!(info.message, NOT_FOUND_MESSAGE),
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn arguments_and_result_cross_the_link() {
    let p = pair();
    p.server_registry().register(
        ["math", "add"],
        Handler::args_only(|args| {
            let sum: f64 = args.iter().filter_map(Value::as_f64).sum();
            Reply::value(sum)
        }),
    );
    let add = p.client.remote(["math"]).at("add");
    let out = p.run(add.call(&[Data::from(2), Data::from(40)]));
    assert_eq!(out, Ok(Value::from(42.0)));
}

#[test]
fn named_handler_errors_are_forwarded_redacted() {
    let p = pair();
    p.server_registry().register(
        ["fail"],
        Handler::new(|_| {
            Reply::error(ErrorInfo::new("TypeError", "wrong type").with_stack("at server.rs:1"))
        }),
    );

    let err = p.run(p.client.call(["fail"], &[])).unwrap_err();
    let info = err.remote_error().cloned().expect("named error");
    assert_eq!(info.name, "TypeError");
    assert_eq!(info.message, "wrong type");
    assert_eq!(info.stack.as_deref(), Some(REDACTED_STACK));
}

#[test]
fn unnamed_handler_errors_are_rejections() {
    let p = pair();
    p.server_registry()
        .register(["reject"], Handler::new(|_| Reply::error("just a string")));
    let out = p.run(p.client.call(["reject"], &[]));
    assert_eq!(out, Err(RpcError::Rejected(Value::from("just a string"))));
}

#[test]
fn handler_panics_become_errors() {
    let p = pair();
    p.server_registry()
        .register(["panic"], Handler::new(|_| panic!("handler blew up")));
    let err = p.run(p.client.call(["panic"], &[])).unwrap_err();
    assert_eq!(err.remote_error().map(|e| e.name.as_str()), Some(PANIC_ERROR));
    assert_ne!(p.server.state(), ChannelState::Closed);
}

#[test]
fn deferred_replies_resolve_later() {
    let p = pair();
    p.server_registry().register(
        ["slow"],
        Handler::new(|_| {
            Reply::deferred(async {
                sleep_ms(5).await;
                Ok(Data::from("done"))
            })
        }),
    );
    let out = p.run(p.client.call(["slow"], &[]));
    assert_eq!(out, Ok(Value::from("done")));
}

#[test]
fn concurrent_calls_are_correlated() {
    let p = pair();
    p.server_registry().register(
        ["delay"],
        Handler::args_only(|args| {
            let ms = args.first().and_then(Value::as_f64).unwrap_or(0.0) as u64;
            Reply::deferred(async move {
                sleep_ms(ms).await;
                Ok(Data::from(ms as f64))
            })
        }),
    );

    let slow = p.client.call(["delay"], &[Data::from(20)]);
    let fast = p.client.call(["delay"], &[Data::from(1)]);
    let (slow, fast) = p.run(futures_lite::future::zip(slow, fast));
    assert_eq!(slow, Ok(Value::from(20.0)));
    assert_eq!(fast, Ok(Value::from(1.0)));
    assert_eq!(p.client.pending_requests(), 0);
}

#[test]
fn handlers_can_call_back_into_the_peer() {
    let p = pair();
    p.client.registry().register(
        ["client", "name"],
        Handler::new(|_| Reply::value("alice")),
    );
    p.server_registry().register(
        ["greet"],
        Handler::new(|inv| {
            let back = inv.channel.call(["client", "name"], &[]);
            Reply::deferred(async move {
                match back.await {
                    Ok(name) => Ok(Data::from(format!("hello {}", name.as_str().unwrap_or("?")))),
                    Err(e) => Err(Data::from(e.to_string())),
                }
            })
        }),
    );

    let out = p.run(p.client.call(["greet"], &[]));
    assert_eq!(out, Ok(Value::from("hello alice")));
}

#[test]
fn notifications_run_without_reply() {
    let p = pair();
    let hits = std::rc::Rc::new(std::cell::Cell::new(0));
    let counter = hits.clone();
    p.server_registry().register(
        ["tick"],
        Handler::new(move |_| {
            counter.set(counter.get() + 1);
            Reply::value(())
        }),
    );

    p.client.notify(["tick"], &[]).unwrap();
    p.client.notify(["tick"], &[]).unwrap();
    p.run(settle());
    assert_eq!(hits.get(), 2);
}

#[test]
fn unserializable_arguments_fail_locally() {
    let p = pair();
    let f = Handler::new(|_| Reply::value(()));
    let out = p.run(p.client.call(["x"], &[Data::from(f)]));
    assert!(matches!(out, Err(RpcError::Serialization(_))));
}

#[test]
fn close_fails_pending_calls_once() {
    let p = pair();
    p.server_registry().register(
        ["never"],
        Handler::new(|_| Reply::deferred(futures_lite::future::pending())),
    );

    let pending = p.client.call(["never"], &[]);
    let out = p.run(async {
        settle().await;
        p.client.close(true);
        p.client.close(true);
        let out = pending.await;
        settle().await;
        out
    });

    assert_eq!(out, Err(RpcError::ChannelClosed));
    assert!(p.client.is_closed());
    assert!(p.server.is_closed(), "peer saw the close notice");
    assert_eq!(p.client.pending_requests(), 0);
}

#[test]
fn calls_after_close_fail_immediately() {
    let p = pair();
    p.client.close(false);
    let out = p.run(p.client.call(["anything"], &[]));
    assert_eq!(out, Err(RpcError::ChannelClosed));
    assert!(!p.server.is_closed(), "no notice was sent");
}

#[test]
fn unregistered_handlers_stop_answering() {
    let p = pair();
    let addr = Address::from(["temp"]);
    p.server_registry()
        .register(&addr, Handler::new(|_| Reply::value(1)));
    assert!(p.run(p.client.call(&addr, &[])).is_ok());

    p.server_registry().unregister(&addr);
    assert!(matches!(
        p.run(p.client.call(&addr, &[])),
        Err(RpcError::NotFound(_))
    ));
}

#[test]
fn bursts_of_deferred_calls_all_resolve() {
    let p = pair();
    p.server_registry().register(
        ["later"],
        Handler::new(|_| Reply::deferred(async { Ok(Data::from(1)) })),
    );

    let calls: Vec<_> = (0..150).map(|_| p.client.call(["later"], &[])).collect();
    let results = p.run(async {
        let mut out = Vec::new();
        for call in calls {
            out.push(call.await);
        }
        out
    });

    assert_eq!(results.len(), 150);
    assert!(results.iter().all(|r| *r == Ok(Value::from(1))));
    assert_eq!(p.client.pending_requests(), 0);
    assert!(!p.server.is_closed());
}
