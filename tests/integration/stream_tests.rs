//! Stream protocol: `[value, error, done]` frames and early stop.

use std::cell::Cell;
use std::rc::Rc;

use chanrpc::{Data, ErrorInfo, Handler, Reply, RpcError, Value};
use futures_lite::stream;

use crate::support::{pair, settle, sleep_ms};

fn counting_stream(limit: i32) -> Handler {
    Handler::new(move |_| {
        Reply::stream(stream::iter((1..=limit).map(|n| Ok(Data::from(n)))))
    })
}

#[test]
fn values_arrive_in_order_then_done() {
    let p = pair();
    let baseline = p.server.internal_registry().len();
    p.server_registry().register(["count"], counting_stream(3));

    let values = p.run(p.client.generate(["count"], &[]).collect());
    assert_eq!(
        values,
        Ok(vec![Value::from(1), Value::from(2), Value::from(3)])
    );
    assert_eq!(
        p.server.internal_registry().len(),
        baseline,
        "stop listener removed once the stream finished"
    );
    assert_eq!(p.client.pending_requests(), 0);
}

#[test]
fn error_frame_is_terminal() {
    let p = pair();
    p.server_registry().register(
        ["flaky"],
        Handler::new(|_| {
            Reply::stream(stream::iter(vec![
                Ok(Data::from("first")),
                Err(Data::from(ErrorInfo::new("IoError", "lost"))),
                Ok(Data::from("never")),
            ]))
        }),
    );

    let mut s = p.client.generate(["flaky"], &[]);
    p.run(async {
        assert_eq!(s.next().await, Some(Ok(Value::from("first"))));
        match s.next().await {
            Some(Err(RpcError::Forwarded(info))) => assert_eq!(info.name, "IoError"),
            other => panic!("expected forwarded error, got {other:?}"),
        }
        assert_eq!(s.next().await, None);
    });
    assert!(s.is_finished());
}

#[test]
fn early_drop_stops_the_producer() {
    let p = pair();
    let baseline = p.server.internal_registry().len();
    let produced = Rc::new(Cell::new(0));
    let counter = produced.clone();
    p.server_registry().register(
        ["ticks"],
        Handler::new(move |_| {
            let counter = counter.clone();
            Reply::stream(stream::unfold(0, move |n| {
                let counter = counter.clone();
                async move {
                    sleep_ms(2).await;
                    counter.set(n + 1);
                    Some((Ok(Data::from(n)), n + 1))
                }
            }))
        }),
    );

    p.run(async {
        let mut s = p.client.generate(["ticks"], &[]);
        assert_eq!(s.next().await, Some(Ok(Value::from(0))));
        assert_eq!(s.next().await, Some(Ok(Value::from(1))));
        drop(s);

        sleep_ms(10).await;
        settle().await;
    });

    let stopped_at = produced.get();
    assert_eq!(
        p.server.internal_registry().len(),
        baseline,
        "stop listener unregistered after stop notice"
    );
    p.run(sleep_ms(20));
    assert_eq!(produced.get(), stopped_at, "producer no longer polled");
    assert_eq!(p.client.pending_requests(), 0);
}

#[test]
fn plain_values_answer_stream_requests() {
    let p = pair();
    p.server_registry()
        .register(["one"], Handler::new(|_| Reply::value("only")));
    let values = p.run(p.client.generate(["one"], &[]).collect());
    assert_eq!(values, Ok(vec![Value::from("only")]));
}

#[test]
fn deferred_values_answer_stream_requests() {
    let p = pair();
    p.server_registry().register(
        ["later"],
        Handler::new(|_| {
            Reply::deferred(async {
                sleep_ms(2).await;
                Ok(Data::from(5))
            })
        }),
    );
    let values = p.run(p.client.generate(["later"], &[]).collect());
    assert_eq!(values, Ok(vec![Value::from(5)]));
}

#[test]
fn missing_stream_handler_is_not_found() {
    let p = pair();
    let mut s = p.client.generate(["ghost"], &[]);
    p.run(async {
        assert!(matches!(s.next().await, Some(Err(RpcError::NotFound(_)))));
        assert_eq!(s.next().await, None);
    });
}

#[test]
fn calling_a_stream_handler_yields_first_value() {
    let p = pair();
    p.server_registry().register(["count"], counting_stream(5));
    assert_eq!(p.run(p.client.call(["count"], &[])), Ok(Value::from(1)));
}

#[test]
fn empty_stream_is_immediately_done() {
    let p = pair();
    p.server_registry().register(["empty"], counting_stream(0));
    let values = p.run(p.client.generate(["empty"], &[]).collect());
    assert_eq!(values, Ok(vec![]));
}

#[test]
fn closing_mid_stream_fails_the_consumer() {
    let p = pair();
    p.server_registry().register(
        ["slow"],
        Handler::new(|_| {
            Reply::stream(stream::unfold(0, |n| async move {
                sleep_ms(50).await;
                Some((Ok(Data::from(n)), n + 1))
            }))
        }),
    );

    let mut s = p.client.generate(["slow"], &[]);
    p.run(async {
        settle().await;
        p.client.close(true);
        assert_eq!(s.next().await, Some(Err(RpcError::ChannelClosed)));
        assert_eq!(s.next().await, None);
        settle().await;
    });
    assert!(p.server.is_closed());
}

#[test]
fn silent_close_still_stops_the_producer() {
    let p = pair();
    let baseline = p.server.internal_registry().len();
    let produced = Rc::new(Cell::new(0));
    let counter = produced.clone();
    p.server_registry().register(
        ["ticks"],
        Handler::new(move |_| {
            let counter = counter.clone();
            Reply::stream(stream::unfold(0, move |n| {
                let counter = counter.clone();
                async move {
                    sleep_ms(2).await;
                    counter.set(n + 1);
                    Some((Ok(Data::from(n)), n + 1))
                }
            }))
        }),
    );

    let mut s = p.client.generate(["ticks"], &[]);
    p.run(async {
        assert_eq!(s.next().await, Some(Ok(Value::from(0))));
        p.client.close(false);
        assert_eq!(s.next().await, Some(Err(RpcError::ChannelClosed)));
        sleep_ms(10).await;
        settle().await;
    });

    assert!(!p.server.is_closed(), "no close notice was sent");
    assert_eq!(
        p.server.internal_registry().len(),
        baseline,
        "stop listener removed by the stop notice"
    );
    let stopped_at = produced.get();
    p.run(sleep_ms(20));
    assert_eq!(produced.get(), stopped_at, "producer no longer polled");
}

#[test]
fn bursts_of_stream_requests_all_complete() {
    let p = pair();
    p.server_registry().register(["count"], counting_stream(2));

    let streams: Vec<_> = (0..120).map(|_| p.client.generate(["count"], &[])).collect();
    let results = p.run(async {
        let mut out = Vec::new();
        for s in streams {
            out.push(s.collect().await);
        }
        out
    });

    assert!(
        results
            .iter()
            .all(|r| *r == Ok(vec![Value::from(1), Value::from(2)]))
    );
    assert_eq!(p.client.pending_requests(), 0);
}
