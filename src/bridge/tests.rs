use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};

use super::*;
use crate::channel::{self, MemoryPort};
use crate::protocol::{PropValue, RequestFocusElement, RequestSceneObjectPropValue};
use crate::scene::Location;

fn connected() -> (Bridge, Bridge) {
    let (host_port, client_port) = channel::pair();
    (
        Bridge::new(Role::Host, host_port),
        Bridge::new(Role::Client, client_port),
    )
}

fn focus(line: i32) -> RequestFocusElement {
    RequestFocusElement {
        location: Location::new("/scene.tsx", line, 4),
    }
}

fn record_focus(client: &Bridge) -> Arc<Mutex<Vec<i32>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _ = client.on_msg(move |msg: RequestFocusElement| {
        sink.lock().push(msg.location.line);
        Dispatch::Handled
    });
    seen
}

#[test]
fn test_commands_wait_for_ready_and_flush_in_order() {
    let (host, client) = connected();
    let seen = record_focus(&client);

    for line in [1, 2, 3] {
        host.send_msg(&focus(line)).unwrap();
    }
    assert!(!host.is_ready());
    assert_eq!(host.queued(), 3);

    // Nothing crossed the channel yet
    assert_eq!(client.pump().unwrap(), 0);
    assert!(seen.lock().is_empty());

    client.announce_ready().unwrap();
    assert_eq!(host.pump().unwrap(), 1);
    assert!(host.is_ready());
    assert_eq!(host.queued(), 0);

    host.send_msg(&focus(4)).unwrap();
    client.pump().unwrap();
    assert_eq!(*seen.lock(), vec![1, 2, 3, 4]);
}

#[test]
fn test_second_ready_does_not_reflush() {
    let (host, client) = connected();
    let seen = record_focus(&client);

    host.send_msg(&focus(1)).unwrap();
    client.announce_ready().unwrap();
    client.announce_ready().unwrap();
    host.pump().unwrap();
    client.pump().unwrap();

    assert_eq!(*seen.lock(), vec![1]);
}

#[test]
fn test_ready_handlers_see_the_event() {
    let (host, client) = connected();
    let readies = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&readies);
    let _ = host.on(MessageKind::Ready, move |_| {
        *sink.lock() += 1;
        Dispatch::Handled
    });

    client.announce_ready().unwrap();
    host.pump().unwrap();
    assert_eq!(*readies.lock(), 1);
}

#[test]
fn test_client_is_open_from_start() {
    let (host, client) = connected();
    assert!(client.is_ready());

    let hovered = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&hovered);
    let _ = host.on(MessageKind::ElementHovered, move |_| {
        *sink.lock() += 1;
        Dispatch::Pass
    });

    client.send(MessageKind::ElementHovered, &Value::Null).unwrap();
    host.pump().unwrap();
    assert_eq!(*hovered.lock(), 1);
}

#[test]
fn test_unserializable_payload_fails_at_send() {
    let (host, _client) = connected();
    let mut bad = HashMap::new();
    bad.insert((1, 2), "tuple keys are not JSON object keys");

    let result = host.send(MessageKind::RequestSetElementProp, &bad);
    assert!(matches!(result, Err(BridgeError::Serialize(_))));
    assert_eq!(host.queued(), 0);

    let result = host.request::<Value>(MessageKind::RequestSceneObjectPropValue, &bad);
    assert!(matches!(result, Err(BridgeError::Serialize(_))));
    assert_eq!(host.pending_replies(), 0);
}

#[test]
fn test_claim_once_dispatch() {
    let (host, client) = connected();
    let calls = Arc::new(Mutex::new(Vec::new()));

    let override_calls = Arc::clone(&calls);
    let override_sub = client.on(MessageKind::RequestFocusElement, move |_| {
        override_calls.lock().push("override");
        Dispatch::Handled
    });
    let default_calls = Arc::clone(&calls);
    let _ = client.on(MessageKind::RequestFocusElement, move |_| {
        default_calls.lock().push("default");
        Dispatch::Handled
    });

    client.announce_ready().unwrap();
    host.pump().unwrap();

    host.send_msg(&focus(1)).unwrap();
    client.pump().unwrap();
    assert_eq!(*calls.lock(), vec!["override"]);

    override_sub.unsubscribe();
    host.send_msg(&focus(2)).unwrap();
    client.pump().unwrap();
    assert_eq!(*calls.lock(), vec!["override", "default"]);
}

#[test]
fn test_compose_tears_down_all_handlers() {
    let (_host, client) = connected();
    let subs = compose([
        client.on(MessageKind::RequestFocusElement, |_| Dispatch::Pass),
        client.on(MessageKind::RequestDeleteElement, |_| Dispatch::Pass),
        client.on(MessageKind::RequestDeleteElement, |_| Dispatch::Pass),
    ]);
    assert_eq!(client.handler_count(MessageKind::RequestDeleteElement), 2);

    subs.unsubscribe();
    assert_eq!(client.handler_count(MessageKind::RequestFocusElement), 0);
    assert_eq!(client.handler_count(MessageKind::RequestDeleteElement), 0);
}

#[tokio::test]
async fn test_request_round_trip() {
    let (host, client) = connected();
    let _ = client.on_msg(|req: RequestSceneObjectPropValue| {
        assert_eq!(req.prop_name, "visible");
        Dispatch::reply(&PropValue {
            value: Some(json!(true)),
        })
    });
    client.announce_ready().unwrap();
    host.pump().unwrap();

    let reply = host
        .request_msg(&RequestSceneObjectPropValue {
            location: Location::new("/scene.tsx", 10, 4),
            prop_name: "visible".into(),
        })
        .unwrap();
    client.pump().unwrap();
    host.pump().unwrap();

    assert_eq!(reply.await.unwrap().value, Some(json!(true)));
    assert_eq!(host.pending_replies(), 0);
}

#[tokio::test]
async fn test_handled_request_replies_null() {
    let (host, client) = connected();
    let _ = client.on(MessageKind::RequestSceneObjectPropValue, |_| Dispatch::Handled);
    client.announce_ready().unwrap();
    host.pump().unwrap();

    let reply = host
        .request::<Value>(MessageKind::RequestSceneObjectPropValue, &Value::Null)
        .unwrap();
    client.pump().unwrap();
    host.pump().unwrap();

    assert_eq!(reply.await.unwrap(), Value::Null);
}

#[tokio::test]
async fn test_requests_before_ready_are_queued_too() {
    let (host, client) = connected();
    let _ = client.on(MessageKind::RequestSceneObjectPropValue, |_| Dispatch::Reply(json!(5)));

    let reply = host
        .request::<u32>(MessageKind::RequestSceneObjectPropValue, &Value::Null)
        .unwrap();
    assert_eq!(host.queued(), 1);

    client.announce_ready().unwrap();
    host.pump().unwrap();
    client.pump().unwrap();
    host.pump().unwrap();

    assert_eq!(reply.await.unwrap(), 5);
}

/// Replies are matched by id, so answering R2 first must not resolve R1.
#[tokio::test]
async fn test_out_of_order_replies_resolve_by_id() {
    let (host_port, mut remote) = channel::pair();
    let host = Bridge::with_gate(Role::Host, host_port, false);

    let mut r1 = host
        .request::<u32>(MessageKind::RequestSceneObjectPropValue, &json!({"n": 1}))
        .unwrap();
    let r2 = host
        .request::<u32>(MessageKind::RequestSceneObjectPropValue, &json!({"n": 2}))
        .unwrap();

    let first = Envelope::decode(&remote.poll().unwrap().unwrap()).unwrap();
    let second = Envelope::decode(&remote.poll().unwrap().unwrap()).unwrap();
    assert_ne!(first.correlation_id, second.correlation_id);

    let answer = |request: &Envelope, value: u32| {
        Envelope::response(request.kind, json!(value), request.correlation_id.clone().unwrap())
            .encode()
            .unwrap()
    };
    remote.post(answer(&second, 2)).unwrap();
    host.pump().unwrap();

    assert_eq!(r2.await.unwrap(), 2);
    assert!(
        tokio::time::timeout(Duration::from_millis(20), &mut r1)
            .await
            .is_err(),
        "r1 must still be pending"
    );

    remote.post(answer(&first, 1)).unwrap();
    host.pump().unwrap();
    assert_eq!(r1.await.unwrap(), 1);
}

#[test]
fn test_unknown_correlation_id_is_ignored() {
    let (host_port, mut remote) = channel::pair();
    let host = Bridge::new(Role::Host, host_port);

    let stray = Envelope::response(MessageKind::RequestSceneObjectPropValue, json!(1), "host-42".into());
    remote.post(stray.encode().unwrap()).unwrap();
    remote.post("{not json".into()).unwrap();

    assert_eq!(host.pump().unwrap(), 2);
}

#[test]
fn test_requests_from_both_sides_do_not_collide() {
    let (host, client) = connected();
    let _ = host.on(MessageKind::Error, |_| Dispatch::Reply(json!("host answer")));
    let _ = client.on(MessageKind::RequestSceneObjectPropValue, |_| Dispatch::Reply(json!("client answer")));
    client.announce_ready().unwrap();
    host.pump().unwrap();

    let from_host = host
        .request::<String>(MessageKind::RequestSceneObjectPropValue, &Value::Null)
        .unwrap();
    let from_client = client.request::<String>(MessageKind::Error, &Value::Null).unwrap();

    client.pump().unwrap();
    host.pump().unwrap();
    client.pump().unwrap();

    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    assert_eq!(runtime.block_on(from_host).unwrap(), "client answer");
    assert_eq!(runtime.block_on(from_client).unwrap(), "host answer");
}

#[tokio::test]
async fn test_reconnect_drops_pending_and_recloses_gate() {
    let (host, client) = connected();
    client.announce_ready().unwrap();
    host.pump().unwrap();
    assert!(host.is_ready());

    let reply = host
        .request::<Value>(MessageKind::RequestSceneObjectPropValue, &Value::Null)
        .unwrap();
    drop(client);

    let (fresh_host, fresh_client): (MemoryPort, MemoryPort) = channel::pair();
    host.reconnect(fresh_host);

    assert!(!host.is_ready());
    assert!(matches!(reply.await, Err(BridgeError::Disconnected)));

    host.send_msg(&focus(9)).unwrap();
    assert_eq!(host.queued(), 1);
    drop(fresh_client);
}

#[test]
fn test_closed_channel_surfaces_after_draining() {
    let (host, client) = connected();
    let seen = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&seen);
    let _ = host.on(MessageKind::Ready, move |_| {
        *sink.lock() += 1;
        Dispatch::Pass
    });

    client.announce_ready().unwrap();
    drop(client);

    assert!(matches!(
        host.pump(),
        Err(BridgeError::Channel(ChannelError::Closed))
    ));
    assert_eq!(*seen.lock(), 1);
}

#[test]
fn test_handler_may_send_from_inside_dispatch() {
    let (host, client) = connected();
    let echo = client.clone();
    let _ = client.on_msg(move |msg: RequestFocusElement| {
        echo.send_msg(&crate::protocol::ElementFocused {
            location: msg.location,
        })
        .unwrap();
        Dispatch::Handled
    });
    let focused = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&focused);
    let _ = host.on_msg(move |msg: crate::protocol::ElementFocused| {
        *sink.lock() = Some(msg.location);
        Dispatch::Handled
    });

    client.announce_ready().unwrap();
    host.pump().unwrap();
    host.send_msg(&focus(7)).unwrap();
    client.pump().unwrap();
    host.pump().unwrap();

    assert_eq!(*focused.lock(), Some(Location::new("/scene.tsx", 7, 4)));
}

#[test]
fn test_failed_reply_does_not_drop_later_frames() {
    let (host, client) = connected();
    let _ = host.on_msg(|_: RequestSceneObjectPropValue| {
        Dispatch::reply(&PropValue {
            value: Some(json!(1)),
        })
    });
    let seen = record_focus(&host);

    let _reply = client
        .request_msg(&RequestSceneObjectPropValue {
            location: Location::new("/scene.tsx", 3, 4),
            prop_name: "visible".into(),
        })
        .unwrap();
    client.send_msg(&focus(9)).unwrap();
    drop(client);

    // The reply has nowhere to go, but the focus behind it still lands
    assert!(matches!(
        host.pump(),
        Err(BridgeError::Channel(ChannelError::Closed))
    ));
    assert_eq!(*seen.lock(), vec![9]);
}

#[test]
fn test_failed_flush_still_runs_ready_handlers() {
    let (host, client) = connected();
    let readies = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&readies);
    let _ = host.on(MessageKind::Ready, move |_| {
        *sink.lock() += 1;
        Dispatch::Pass
    });
    let seen = record_focus(&host);

    host.send_msg(&focus(1)).unwrap();
    assert_eq!(host.queued(), 1);

    client.announce_ready().unwrap();
    client.send_msg(&focus(5)).unwrap();
    drop(client);

    assert!(matches!(
        host.pump(),
        Err(BridgeError::Channel(ChannelError::Closed))
    ));
    assert!(host.is_ready());
    assert_eq!(*readies.lock(), 1);
    assert_eq!(*seen.lock(), vec![5]);
}
