//! Queue construction choices and ordering disciplines, driven through
//! the session where it matters.

mod common;

use bytes::Bytes;
use common::{attach_session, broker, declare_arguments};
use stratus::protocol::{
    AcceptMode, AcquireMode, Frame, MessageProperties, Method, SequenceNumber,
};
use stratus::queue::{QueueKind, QueueSettings};

fn transfer_with_headers(
    routing_key: &str,
    headers: &[(&str, &str)],
    priority: u8,
) -> Vec<Frame> {
    let method = Method::MessageTransfer {
        destination: String::new(),
        accept_mode: AcceptMode::None,
        acquire_mode: AcquireMode::PreAcquired,
    };
    let mut properties = MessageProperties {
        routing_key: routing_key.to_string(),
        priority,
        ..MessageProperties::default()
    };
    for (k, v) in headers {
        properties.headers.insert((*k).to_string(), (*v).to_string());
    }
    vec![
        Frame::transfer(method, false),
        Frame::header(properties),
        Frame::content_end(Bytes::from_static(b"payload")),
    ]
}

#[test]
fn lvq_supersedes_by_key() {
    let broker = broker();
    let mut test = attach_session(&broker, "s1");
    test.session
        .handle_in(Frame::method(Method::QueueDeclare {
            queue: "last-value".into(),
            durable: false,
            arguments: declare_arguments(&[("lvqKey", "k")]),
        }))
        .unwrap();

    for headers in [&[("k", "A")], &[("k", "A")], &[("k", "B")]] {
        for frame in transfer_with_headers("last-value", headers, 0) {
            test.session.handle_in(frame).unwrap();
        }
    }

    let queue = broker.queues().get("last-value").unwrap();
    assert_eq!(queue.kind(), QueueKind::Lvq);
    assert_eq!(queue.message_count(), 2, "A was superseded once");

    let first = queue.consume("c").unwrap();
    assert_eq!(first.message.header("k").as_deref(), Some("A"));
    // The surviving A is the second one published (command id 2; the
    // declare took id 0).
    assert_eq!(first.message.command_id(), SequenceNumber::new(2));
    let second = queue.consume("c").unwrap();
    assert_eq!(second.message.header("k").as_deref(), Some("B"));
    assert!(queue.consume("c").is_none());
}

#[test]
fn priority_queue_orders_by_band() {
    let broker = broker();
    let mut test = attach_session(&broker, "s1");
    test.session
        .handle_in(Frame::method(Method::QueueDeclare {
            queue: "ranked".into(),
            durable: false,
            arguments: declare_arguments(&[("priorities", "10")]),
        }))
        .unwrap();

    for (priority, key) in [(1u8, "low"), (9, "high"), (5, "mid")] {
        for frame in transfer_with_headers("ranked", &[("tag", key)], priority) {
            test.session.handle_in(frame).unwrap();
        }
    }

    let queue = broker.queues().get("ranked").unwrap();
    let order: Vec<String> = std::iter::from_fn(|| queue.consume("c"))
        .map(|entry| entry.message.header("tag").unwrap())
        .collect();
    assert_eq!(order, vec!["high", "mid", "low"]);
}

#[test]
fn fairshare_alternates_bands() {
    let broker = broker();
    let mut test = attach_session(&broker, "s1");
    test.session
        .handle_in(Frame::method(Method::QueueDeclare {
            queue: "shared".into(),
            durable: false,
            arguments: declare_arguments(&[("priorities", "2"), ("fairshare", "2,1")]),
        }))
        .unwrap();

    let queue = broker.queues().get("shared").unwrap();
    for (priority, tag) in [(1u8, "h1"), (1, "h2"), (1, "h3"), (0, "l1")] {
        for frame in transfer_with_headers("shared", &[("tag", tag)], priority) {
            test.session.handle_in(frame).unwrap();
        }
    }

    let order: Vec<String> = std::iter::from_fn(|| queue.consume("c"))
        .map(|entry| entry.message.header("tag").unwrap())
        .collect();
    // The high band spends its two credits, the low band gets a turn,
    // then the high band resumes.
    assert_eq!(order, vec!["h1", "h2", "l1", "h3"]);
}

#[test]
fn message_groups_pin_to_their_consumer() {
    let broker = broker();
    let mut test = attach_session(&broker, "s1");
    test.session
        .handle_in(Frame::method(Method::QueueDeclare {
            queue: "grouped".into(),
            durable: false,
            arguments: declare_arguments(&[("groupKey", "region")]),
        }))
        .unwrap();

    for region in ["emea", "emea", "apac"] {
        for frame in transfer_with_headers("grouped", &[("region", region)], 0) {
            test.session.handle_in(frame).unwrap();
        }
    }

    let queue = broker.queues().get("grouped").unwrap();
    let first = queue.consume("c1").unwrap();
    assert_eq!(first.message.header("region").as_deref(), Some("emea"));

    // Group "emea" is owned by c1 now, so c2 skips ahead to "apac".
    let second = queue.consume("c2").unwrap();
    assert_eq!(second.message.header("region").as_deref(), Some("apac"));

    let third = queue.consume("c1").unwrap();
    assert_eq!(third.message.header("region").as_deref(), Some("emea"));
}

#[test]
fn ring_queue_discards_oldest() {
    let broker = broker();
    let mut test = attach_session(&broker, "s1");
    test.session
        .handle_in(Frame::method(Method::QueueDeclare {
            queue: "ring".into(),
            durable: false,
            arguments: declare_arguments(&[
                ("dropMessagesAtLimit", "1"),
                ("qpid.max_count", "2"),
            ]),
        }))
        .unwrap();

    for tag in ["a", "b", "c", "d"] {
        for frame in transfer_with_headers("ring", &[("tag", tag)], 0) {
            test.session.handle_in(frame).unwrap();
        }
    }

    let queue = broker.queues().get("ring").unwrap();
    assert_eq!(queue.kind(), QueueKind::Lossy);
    assert_eq!(queue.message_count(), 2);
    let order: Vec<String> = std::iter::from_fn(|| queue.consume("c"))
        .map(|entry| entry.message.header("tag").unwrap())
        .collect();
    assert_eq!(order, vec!["c", "d"]);
}

#[test]
fn purge_and_delete_through_methods() {
    let broker = broker();
    let mut test = attach_session(&broker, "s1");
    test.session
        .handle_in(Frame::method(Method::QueueDeclare {
            queue: "scratch".into(),
            durable: false,
            arguments: declare_arguments(&[]),
        }))
        .unwrap();
    for frame in transfer_with_headers("scratch", &[], 0) {
        test.session.handle_in(frame).unwrap();
    }
    assert_eq!(broker.queues().get("scratch").unwrap().message_count(), 1);

    test.session
        .handle_in(Frame::method(Method::QueuePurge {
            queue: "scratch".into(),
        }))
        .unwrap();
    assert_eq!(broker.queues().get("scratch").unwrap().message_count(), 0);

    test.session
        .handle_in(Frame::method(Method::QueueDelete {
            queue: "scratch".into(),
        }))
        .unwrap();
    assert!(broker.queues().get("scratch").is_none());
}

#[test]
fn exchange_bindings_route_transfers() {
    let broker = broker();
    let mut test = attach_session(&broker, "s1");
    test.session
        .handle_in(Frame::method(Method::ExchangeDeclare {
            exchange: "amq.direct".into(),
            kind: "direct".into(),
        }))
        .unwrap();
    test.session
        .handle_in(Frame::method(Method::QueueDeclare {
            queue: "bound".into(),
            durable: false,
            arguments: declare_arguments(&[]),
        }))
        .unwrap();
    test.session
        .handle_in(Frame::method(Method::ExchangeBind {
            exchange: "amq.direct".into(),
            queue: "bound".into(),
            binding_key: "k".into(),
        }))
        .unwrap();

    let method = Method::MessageTransfer {
        destination: "amq.direct".into(),
        accept_mode: AcceptMode::None,
        acquire_mode: AcquireMode::PreAcquired,
    };
    let frames = vec![
        Frame::transfer(method, false),
        Frame::header(MessageProperties {
            routing_key: "k".into(),
            ..MessageProperties::default()
        }),
        Frame::content_end(Bytes::from_static(b"routed")),
    ];
    for frame in frames {
        test.session.handle_in(frame).unwrap();
    }
    assert_eq!(broker.queues().get("bound").unwrap().message_count(), 1);
}

#[test]
fn contradictory_settings_never_build_a_queue() {
    let settings = QueueSettings {
        drop_messages_at_limit: true,
        lvq_key: "k".into(),
        ..QueueSettings::default()
    };
    let broker = broker();
    assert!(broker
        .queues()
        .declare(broker.queue_factory(), "never", settings)
        .is_err());
    assert!(broker.queues().get("never").is_none());
}
