//! Start-up, inactivity watchdog, and keepalive heartbeats.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use chanrpc::{ChannelConfig, ChannelState};

use crate::support::{pair_with, settle, sleep_ms};

#[test]
fn idle_channel_times_out() {
    let client = ChannelConfig::default()
        .with_timeout_ms(20)
        .with_keepalive_ms(0);
    let p = pair_with(client, ChannelConfig::default(), None);

    let states = Rc::new(RefCell::new(Vec::new()));
    let seen = states.clone();
    p.client.on_state_change(move |s| seen.borrow_mut().push(s));

    p.run(async {
        p.client.start().await;
        assert_eq!(p.client.state(), ChannelState::Active);
        sleep_ms(80).await;
        settle().await;
    });

    assert!(p.client.is_closed());
    assert!(p.server.is_closed(), "close notice reached the peer");
    assert_eq!(
        *states.borrow(),
        vec![ChannelState::Active, ChannelState::Closed]
    );
}

#[test]
fn watchdog_fires_close_to_the_timeout() {
    let client = ChannelConfig::default()
        .with_timeout_ms(20)
        .with_keepalive_ms(0);
    let p = pair_with(client, ChannelConfig::default(), None);

    let closed_at = Rc::new(RefCell::new(None));
    let stamp = closed_at.clone();
    p.client.on_state_change(move |s| {
        if s == ChannelState::Closed {
            *stamp.borrow_mut() = Some(Instant::now());
        }
    });

    let started = Instant::now();
    p.run(async {
        p.client.start().await;
        sleep_ms(60).await;
    });

    let closed_at = closed_at.borrow().expect("watchdog closed the channel");
    let elapsed = closed_at - started;
    assert!(elapsed >= Duration::from_millis(20), "closed early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(40), "closed late: {elapsed:?}");
}

#[test]
fn heartbeats_keep_both_sides_open() {
    let config = ChannelConfig::default().with_timeout_ms(60);
    let p = pair_with(config.clone(), config, None);

    p.run(async {
        p.client.start().await;
        p.server.start().await;
        sleep_ms(250).await;
    });

    assert_eq!(p.client.state(), ChannelState::Active);
    assert_eq!(p.server.state(), ChannelState::Active);
}

#[test]
fn traffic_resets_the_watchdog() {
    let server = ChannelConfig::default()
        .with_timeout_ms(40)
        .with_keepalive_ms(0);
    let p = pair_with(ChannelConfig::default(), server, None);

    p.run(async {
        p.server.start().await;
        for _ in 0..8 {
            sleep_ms(15).await;
            p.client.notify(["ping"], &[]).unwrap();
        }
        settle().await;
    });
    assert_eq!(p.server.state(), ChannelState::Active);

    p.run(async {
        sleep_ms(100).await;
    });
    assert!(p.server.is_closed());
}

#[test]
fn await_first_message_defers_activation() {
    let server = ChannelConfig::default().with_await_first_message(true);
    let p = pair_with(ChannelConfig::default(), server, None);

    let server = p.server.clone();
    p.executor
        .spawn(async move { server.start().await })
        .detach();

    p.run(settle());
    assert_eq!(p.server.state(), ChannelState::Inactive);

    p.client.notify(["hello"], &[]).unwrap();
    p.run(settle());
    assert_eq!(p.server.state(), ChannelState::Active);
}

#[test]
fn close_while_waiting_for_first_message() {
    let server = ChannelConfig::default().with_await_first_message(true);
    let p = pair_with(ChannelConfig::default(), server, None);

    let started = Rc::new(RefCell::new(false));
    let done = started.clone();
    let server = p.server.clone();
    p.executor
        .spawn(async move {
            server.start().await;
            *done.borrow_mut() = true;
        })
        .detach();

    p.run(settle());
    p.server.close(false);
    p.run(settle());

    assert!(*started.borrow(), "start() returned");
    assert!(p.server.is_closed());
}
