//! 分发管线集成测试：过滤、授权、限流、投递和反馈

mod common;

use andromeda::notification::filter::DropReason;
use andromeda::{
    BridgeConfig, Delivery, DispatchOutcome, Dispatcher, HistoryStore, InboundEvent, MemoryTransport,
    PageOutcome, Priority,
};
use common::{config, ScriptedBackend};
use std::sync::Arc;
use std::time::Duration;

const REALM: &str = "ATHENA.MIT.EDU";

fn from(name: &str) -> String {
    format!("{}@{}", name, REALM)
}

/// 发到 alice 个人房间、给桥的事件
fn to_bridge(sender: &str, body: &str) -> InboundEvent {
    InboundEvent::new(from(sender), "alice", "andromeda").with_body(body)
}

fn setup(config: BridgeConfig, backend: ScriptedBackend) -> (Dispatcher, Arc<ScriptedBackend>, Arc<MemoryTransport>) {
    let backend = Arc::new(backend);
    let transport = MemoryTransport::new();
    let dispatcher = Dispatcher::new(Arc::new(config), backend.clone(), transport.clone())
        .with_remark_delay(Duration::ZERO);
    (dispatcher, backend, transport)
}

#[tokio::test]
async fn test_untrusted_events_are_silently_dropped() {
    let (mut dispatcher, backend, transport) = setup(config(), ScriptedBackend::new());

    let cases = [
        (
            InboundEvent::new("bob@EVIL.ORG", "alice", "andromeda").with_body("hi"),
            DropReason::ForeignRealm,
        ),
        (to_bridge("bob", "hi").with_auth(false), DropReason::Unauthenticated),
        (to_bridge("bob", "hi").with_opcode("auto"), DropReason::Loopback),
        (to_bridge("bob", "hi").with_opcode("page.AUTO"), DropReason::Loopback),
        (InboundEvent::new("bob", "alice", "andromeda").with_body("hi"), DropReason::MalformedSender),
        (InboundEvent::new(from("bob"), "alice", "andromeda"), DropReason::NoBody),
        (InboundEvent::new(from("bob"), "help", "andromeda").with_body("hi"), DropReason::Unrouted),
        (InboundEvent::new(from("bob"), "alice", "personal").with_body("hi"), DropReason::Unrouted),
    ];

    for (event, expected) in cases {
        match dispatcher.handle(&event).await {
            DispatchOutcome::Dropped(reason) => assert_eq!(reason, expected, "event {:?}", event),
            other => panic!("expected drop for {:?}, got {}", event, other.as_str()),
        }
    }

    assert!(backend.submitted().is_empty());
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_normal_notification_and_feedback() {
    let (mut dispatcher, backend, transport) = setup(config(), ScriptedBackend::new());

    let outcome = dispatcher.handle(&to_bridge("bob", "lunch?")).await;
    assert!(matches!(outcome, DispatchOutcome::Delivered(Delivery::Sent)));

    let submitted = backend.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].message, "bob-andromeda: lunch?");
    assert_eq!(submitted[0].priority, Priority::Normal);

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].class, "alice");
    assert_eq!(sent[0].instance, "andromeda");
    assert_eq!(sent[0].sender, "andromeda");
    assert_eq!(sent[0].opcode, "auto");
    assert_eq!(sent[0].fields.len(), 2);
    assert_eq!(sent[0].text(), "notification sent to alice");
}

#[tokio::test]
async fn test_feedback_does_not_loop_back() {
    let (mut dispatcher, backend, transport) = setup(config(), ScriptedBackend::new());
    dispatcher.handle(&to_bridge("bob", "lunch?")).await;

    // 反馈消息回流到订阅里
    let echoed = transport.sent()[0].clone();
    let event = InboundEvent {
        sender: from(&echoed.sender),
        class: echoed.class,
        instance: echoed.instance,
        opcode: echoed.opcode,
        auth: true,
        fields: echoed.fields,
    };

    assert!(matches!(
        dispatcher.handle(&event).await,
        DispatchOutcome::Dropped(DropReason::Loopback)
    ));
    assert_eq!(backend.submitted().len(), 1);
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn test_blocked_sender_gets_one_feedback_and_no_push() {
    let (mut dispatcher, backend, transport) = setup(config(), ScriptedBackend::new());

    let outcome = dispatcher.handle(&to_bridge("mallory", "spam").with_opcode("page")).await;
    assert!(matches!(outcome, DispatchOutcome::Blocked));

    assert!(backend.submitted().is_empty());
    assert_eq!(
        transport.texts(),
        vec!["mallory: you are blocked from sending notifications to alice".to_string()]
    );
}

#[tokio::test]
async fn test_blocked_sender_does_not_consume_rate_limit() {
    let (mut dispatcher, backend, _transport) = setup(config(), ScriptedBackend::new());

    dispatcher.handle(&to_bridge("mallory", "spam")).await;
    let outcome = dispatcher.handle(&to_bridge("bob", "lunch?")).await;

    assert!(matches!(outcome, DispatchOutcome::Delivered(Delivery::Sent)));
    assert_eq!(backend.submitted().len(), 1);
}

#[tokio::test]
async fn test_second_notification_within_interval_is_rate_limited() {
    let (mut dispatcher, backend, transport) = setup(config(), ScriptedBackend::new());

    let first = dispatcher.handle(&to_bridge("bob", "one")).await;
    let second = dispatcher.handle(&to_bridge("carol", "two").with_opcode("urgent")).await;

    assert!(matches!(first, DispatchOutcome::Delivered(Delivery::Sent)));
    assert!(matches!(second, DispatchOutcome::RateLimited));
    assert_eq!(backend.submitted().len(), 1);
    assert_eq!(
        transport.texts(),
        vec![
            "notification sent to alice".to_string(),
            "alice could not be notified; try again later".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_urgent_notification() {
    let (mut dispatcher, backend, transport) = setup(config(), ScriptedBackend::new());

    let outcome = dispatcher.handle(&to_bridge("bob", "fire drill").with_opcode("URGENT")).await;
    assert!(matches!(outcome, DispatchOutcome::Delivered(Delivery::Sent)));

    assert_eq!(backend.submitted()[0].priority, Priority::Urgent);
    assert_eq!(transport.texts(), vec!["urgent notification sent to alice".to_string()]);
}

#[tokio::test]
async fn test_priority_disabled() {
    let config = BridgeConfig {
        priority_enabled: false,
        ..config()
    };
    let (mut dispatcher, backend, transport) = setup(config, ScriptedBackend::new());

    let urgent = dispatcher.handle(&to_bridge("bob", "now").with_opcode("urgent")).await;
    let page = dispatcher.handle(&to_bridge("bob", "NOW").with_opcode("page")).await;

    assert!(matches!(urgent, DispatchOutcome::PriorityDisabled(Priority::Urgent)));
    assert!(matches!(page, DispatchOutcome::PriorityDisabled(Priority::Page)));
    assert!(backend.submitted().is_empty());
    assert_eq!(
        transport.texts(),
        vec![
            "urgent notifications are disabled for alice".to_string(),
            "paging is disabled for alice".to_string(),
        ]
    );

    // 普通通知不受影响，且没有被前面的拒绝占用限流名额
    let normal = dispatcher.handle(&to_bridge("bob", "whenever")).await;
    assert!(matches!(normal, DispatchOutcome::Delivered(Delivery::Sent)));
}

#[tokio::test]
async fn test_large_room_formatting() {
    let config = BridgeConfig {
        rate_interval: 0,
        ..config()
    };
    let (mut dispatcher, backend, transport) = setup(config, ScriptedBackend::new());

    let own = InboundEvent::new(from("alice"), "lunch-crew", "tacos").with_body("leaving now");
    let other = InboundEvent::new(from("bob"), "lunch-crew", "tacos").with_body("wait for me");
    dispatcher.handle(&own).await;
    dispatcher.handle(&other).await;

    let messages: Vec<String> = backend.submitted().into_iter().map(|m| m.message).collect();
    assert_eq!(messages, vec!["tacos: leaving now".to_string(), "bob-tacos: wait for me".to_string()]);

    // 反馈回到来源房间
    assert!(transport.sent().iter().all(|m| m.class == "lunch-crew" && m.instance == "tacos"));
}

#[tokio::test]
async fn test_backend_rejections() {
    let config = BridgeConfig {
        rate_interval: 0,
        ..config()
    };
    let backend = ScriptedBackend::new()
        .reply_submit(429, r#"{"status":0,"errors":["rate limited"]}"#)
        .reply_submit(401, r#"{"status":0,"errors":["application token is invalid"]}"#)
        .reply_submit(503, "Service Unavailable")
        .fail_submit("connection reset");
    let (mut dispatcher, _backend, transport) = setup(config, backend);

    let mut outcomes = Vec::new();
    for body in ["a", "b", "c", "d"] {
        outcomes.push(dispatcher.handle(&to_bridge("bob", body)).await);
    }

    assert!(matches!(outcomes[0], DispatchOutcome::Delivered(Delivery::RejectedTransient)));
    assert!(matches!(outcomes[1], DispatchOutcome::Delivered(Delivery::RejectedPermanent)));
    assert!(matches!(outcomes[2], DispatchOutcome::Delivered(Delivery::RejectedTransient)));
    assert!(matches!(outcomes[3], DispatchOutcome::Delivered(Delivery::RejectedTransient)));
    assert_eq!(
        transport.texts(),
        vec![
            "alice could not be notified; try again later".to_string(),
            "alice could not be notified; do not try again".to_string(),
            "alice could not be notified; try again later".to_string(),
            "alice could not be notified; try again later".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_backend_throttling_is_temporary() {
    let backend = ScriptedBackend::new().reply_submit(429, r#"{"status":0,"errors":["too many requests"]}"#);
    let (mut dispatcher, _backend, transport) = setup(config(), backend);

    let outcome = dispatcher.handle(&to_bridge("bob", "lunch?")).await;
    assert!(matches!(outcome, DispatchOutcome::Delivered(Delivery::RejectedTransient)));
    assert_eq!(transport.texts(), vec!["alice could not be notified; try again later".to_string()]);
}

#[tokio::test]
async fn test_feedback_transport_failure_is_not_fatal() {
    let (mut dispatcher, backend, transport) = setup(config(), ScriptedBackend::new());
    transport.set_failing(true);

    let outcome = dispatcher.handle(&to_bridge("bob", "lunch?")).await;
    assert!(matches!(outcome, DispatchOutcome::Delivered(Delivery::Sent)));
    assert_eq!(backend.submitted().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_page_bypasses_rate_limit() {
    let backend = ScriptedBackend::new().reply_receipt(200, common::ACKED);
    let (mut dispatcher, backend, transport) = setup(config(), backend);

    dispatcher.handle(&to_bridge("bob", "one")).await;
    let outcome = dispatcher.handle(&to_bridge("bob", "help!").with_opcode("page")).await;

    let handle = match outcome {
        DispatchOutcome::Paging(handle) => handle,
        other => panic!("expected page to start, got {}", other.as_str()),
    };
    assert_eq!(handle.outcome().await, PageOutcome::Acknowledged);

    let submitted = backend.submitted();
    assert_eq!(submitted.len(), 2);
    assert_eq!(submitted[1].priority, Priority::Page);
    assert_eq!(submitted[1].message, "bob-andromeda: help!");
    assert_eq!(submitted[1].retry, Some(30));
    assert_eq!(submitted[1].expire, Some(600));
    assert!(transport.texts().contains(&"page acknowledged by alice".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_page_is_refused() {
    let backend = ScriptedBackend::new()
        .reply_receipt(200, common::PENDING)
        .reply_receipt(200, common::ACKED);
    let (mut dispatcher, backend, transport) = setup(config(), backend);

    let first = dispatcher.handle(&to_bridge("bob", "help!").with_opcode("page")).await;
    let second = dispatcher.handle(&to_bridge("carol", "me too").with_opcode("page")).await;

    let handle = match first {
        DispatchOutcome::Paging(handle) => handle,
        other => panic!("expected page to start, got {}", other.as_str()),
    };
    assert!(matches!(second, DispatchOutcome::PagingBusy));
    assert!(dispatcher.pager().is_busy());

    assert_eq!(handle.outcome().await, PageOutcome::Acknowledged);
    assert_eq!(backend.submitted().len(), 1);
    assert!(!dispatcher.pager().is_busy());

    let texts = transport.texts();
    assert!(texts.contains(&"alice is already being paged; try again later".to_string()));
    assert!(texts.contains(&"paging alice; waiting for acknowledgment".to_string()));
    assert_eq!(texts.last().map(String::as_str), Some("page acknowledged by alice"));

    // 确认之后可以再次 page
    let third = dispatcher.handle(&to_bridge("carol", "now?").with_opcode("page")).await;
    assert!(matches!(third, DispatchOutcome::Paging(_)));
}

#[tokio::test]
async fn test_remark_gets_a_reply() {
    let (mut dispatcher, backend, transport) = setup(config(), ScriptedBackend::new());

    let remark = InboundEvent::new(from("alice"), "alice", "thoughts").with_body("I should really sleep");
    let outcome = dispatcher.handle(&remark).await;
    assert!(matches!(outcome, DispatchOutcome::Remark { replied: true }));

    let sandbox = InboundEvent::new(from("alice"), "SANDBOX", "x").with_body("lunch plans?");
    let outcome = dispatcher.handle(&sandbox).await;
    assert!(matches!(outcome, DispatchOutcome::Remark { replied: false }));

    assert!(backend.submitted().is_empty());
    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].instance, "thoughts");
    assert_eq!(sent[0].text(), "Sleep!");
}

#[tokio::test]
async fn test_remarks_can_be_disabled() {
    let config = BridgeConfig {
        remarks: false,
        ..config()
    };
    let (mut dispatcher, _backend, transport) = setup(config, ScriptedBackend::new());

    let remark = InboundEvent::new(from("alice"), "alice", "thoughts").with_body("I should really sleep");
    assert!(matches!(
        dispatcher.handle(&remark).await,
        DispatchOutcome::Dropped(DropReason::Unrouted)
    ));
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_subscribe_registers_rooms() {
    let (dispatcher, _backend, transport) = setup(config(), ScriptedBackend::new());
    dispatcher.subscribe(transport.as_ref()).await.unwrap();

    let classes: Vec<String> = transport.subscriptions().into_iter().map(|s| s.class).collect();
    assert_eq!(classes, vec!["alice", "lunch-crew", "SANDBOX"]);
}

#[tokio::test]
async fn test_history_records_outcomes() {
    let dir = tempfile::tempdir().unwrap();
    let store = HistoryStore::new(dir.path().join("history.jsonl"));
    let (dispatcher, _backend, _transport) = setup(config(), ScriptedBackend::new());
    let mut dispatcher = dispatcher.with_history(store.clone());

    dispatcher.handle(&to_bridge("bob", "one")).await;
    dispatcher.handle(&to_bridge("mallory", "spam")).await;
    dispatcher.handle(&to_bridge("carol", "two")).await;
    // 丢弃的事件不记录
    dispatcher.handle(&to_bridge("dave", "x").with_auth(false)).await;

    let outcomes: Vec<(String, String)> = store
        .read_recent(10)
        .into_iter()
        .map(|r| (r.sender, r.outcome))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            ("bob".to_string(), "sent".to_string()),
            ("mallory".to_string(), "blocked".to_string()),
            ("carol".to_string(), "rate_limited".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_run_drains_channel() {
    let (dispatcher, backend, transport) = setup(config(), ScriptedBackend::new());
    let (tx, rx) = tokio::sync::mpsc::channel(8);

    tx.send(to_bridge("bob", "lunch?")).await.unwrap();
    tx.send(to_bridge("bob", "hi").with_opcode("auto")).await.unwrap();
    drop(tx);

    dispatcher.run(rx).await.unwrap();
    assert_eq!(backend.submitted().len(), 1);
    assert_eq!(transport.texts(), vec!["notification sent to alice".to_string()]);
}
