//! End-to-end exercises of the inbound session pipeline: completion
//! bookkeeping, deferred execution.sync, asynchronous ingress, and the
//! management method surface.

mod common;

use bytes::Bytes;
use common::{attach_session, broker, broker_with_store, declare_arguments, CollectingHandler, FrameLog, TestStore};
use std::collections::HashMap;
use stratus::mgmt::{MethodStatus, SessionMethod};
use stratus::protocol::{
    AcceptMode, AcquireMode, Control, Frame, MessageProperties, Method, SequenceNumber,
    SequenceSet,
};
use stratus::session::{CompletionWakeup, SessionError};

fn declare(queue: &str) -> Method {
    Method::QueueDeclare {
        queue: queue.to_string(),
        durable: false,
        arguments: HashMap::new(),
    }
}

fn declare_durable(queue: &str) -> Method {
    Method::QueueDeclare {
        queue: queue.to_string(),
        durable: true,
        arguments: HashMap::new(),
    }
}

fn transfer_frames(routing_key: &str, accept_mode: AcceptMode, sync: bool) -> Vec<Frame> {
    let method = Method::MessageTransfer {
        destination: String::new(),
        accept_mode,
        acquire_mode: AcquireMode::PreAcquired,
    };
    vec![
        Frame::transfer(method, sync),
        Frame::header(MessageProperties {
            routing_key: routing_key.to_string(),
            ..MessageProperties::default()
        }),
        Frame::content_end(Bytes::from_static(b"payload")),
    ]
}

fn completed_sets(log: &FrameLog) -> Vec<SequenceSet> {
    log.controls()
        .into_iter()
        .filter_map(|control| match control {
            Control::ExecutionCompleted { commands } => Some(commands),
            _ => None,
        })
        .collect()
}

fn accept_sets(log: &FrameLog) -> Vec<SequenceSet> {
    log.controls()
        .into_iter()
        .filter_map(|control| match control {
            Control::MessageAccept { transfers } => Some(transfers),
            _ => None,
        })
        .collect()
}

#[test]
fn basic_completion_flushes_once_on_sync() {
    let broker = broker();
    let mut test = attach_session(&broker, "s1");

    test.session.handle_in(Frame::method(declare("q1"))).unwrap();
    test.session.handle_in(Frame::method(declare("q2"))).unwrap();
    assert!(test.log.controls().is_empty(), "no flush before the sync bit");

    test.session
        .handle_in(Frame::method_sync(declare("q3")))
        .unwrap();

    let completed = completed_sets(&test.log);
    assert_eq!(completed.len(), 1, "exactly one completion frame");
    let ids: Vec<u32> = completed[0].iter().map(SequenceNumber::value).collect();
    assert_eq!(ids, vec![0, 1, 2]);
}

#[test]
fn transfer_without_holders_completes_on_the_spot() {
    let broker = broker();
    let mut test = attach_session(&broker, "s1");
    test.session.handle_in(Frame::method(declare("inbox"))).unwrap();

    for frame in transfer_frames("inbox", AcceptMode::Explicit, true) {
        test.session.handle_in(frame).unwrap();
    }

    // Sync transfer with no asynchronous holders: accept + completion
    // arrive without any I/O-loop hop.
    let accepts = accept_sets(&test.log);
    assert_eq!(accepts.len(), 1);
    assert!(accepts[0].contains(SequenceNumber::new(1)));
    let completed = completed_sets(&test.log);
    assert!(completed.last().unwrap().contains(SequenceNumber::new(1)));
    assert_eq!(broker.queues().get("inbox").unwrap().message_count(), 1);
}

#[test]
fn deferred_sync_waits_for_async_ingress() {
    let store = TestStore::new();
    let broker = broker_with_store(store.clone());
    let mut test = attach_session(&broker, "s1");

    // id 0: declare a durable queue; id 1: transfer held by the store;
    // id 2: execution.sync barrier.
    test.session
        .handle_in(Frame::method(declare_durable("dq")))
        .unwrap();
    for frame in transfer_frames("dq", AcceptMode::Explicit, false) {
        test.session.handle_in(frame).unwrap();
    }
    assert_eq!(store.held_count(), 1, "store holds the write");

    test.session
        .handle_in(Frame::method_sync(Method::ExecutionSync))
        .unwrap();
    assert!(
        completed_sets(&test.log).is_empty(),
        "sync must not complete ahead of the transfer"
    );
    assert_eq!(test.session.pending_sync_count(), 1);

    // The barrier forced the pending write to flush; the completion
    // comes back through the completer on the I/O loop.
    assert_eq!(store.flushed_ids(), vec![1]);
    test.drain_completions();

    let accepts = accept_sets(&test.log);
    assert_eq!(accepts.len(), 1);
    assert!(accepts[0].contains(SequenceNumber::new(1)));
    let completed = completed_sets(&test.log);
    assert_eq!(completed.len(), 1);
    for id in [0, 1, 2] {
        assert!(completed[0].contains(SequenceNumber::new(id)));
    }
    assert_eq!(test.session.pending_sync_count(), 0);
}

#[test]
fn async_completion_from_worker_thread() {
    let store = TestStore::new();
    let broker = broker_with_store(store.clone());
    let mut test = attach_session(&broker, "s1");

    test.session
        .handle_in(Frame::method(declare_durable("dq")))
        .unwrap();
    for frame in transfer_frames("dq", AcceptMode::Explicit, false) {
        test.session.handle_in(frame).unwrap();
    }

    let worker_store = store.clone();
    let worker = std::thread::spawn(move || worker_store.complete_next(true));
    worker.join().unwrap();

    assert!(completed_sets(&test.log).is_empty());
    test.drain_completions();
    assert!(test
        .session
        .completed_commands()
        .contains(SequenceNumber::new(1)));
}

#[test]
fn failed_ingress_completes_but_is_rejected() {
    let store = TestStore::new();
    let broker = broker_with_store(store.clone());
    let mut test = attach_session(&broker, "s1");

    test.session
        .handle_in(Frame::method(declare_durable("dq")))
        .unwrap();
    for frame in transfer_frames("dq", AcceptMode::Explicit, false) {
        test.session.handle_in(frame).unwrap();
    }
    store.complete_next(false);
    test.drain_completions();

    // The sequence still advances past the failed transfer.
    assert!(test
        .session
        .completed_commands()
        .contains(SequenceNumber::new(1)));
    assert!(test
        .session
        .rejected_commands()
        .contains(SequenceNumber::new(1)));

    // A later sync flushes completion state; the failed transfer is
    // never reported accepted.
    test.session
        .handle_in(Frame::method_sync(Method::ExecutionSync))
        .unwrap();
    assert!(accept_sets(&test.log).is_empty());
    let completed = completed_sets(&test.log);
    assert!(completed.last().unwrap().contains(SequenceNumber::new(1)));
}

#[test]
fn cancelled_completer_drops_late_completions() {
    let store = TestStore::new();
    let broker = broker_with_store(store.clone());
    let mut test = attach_session(&broker, "s1");

    test.session
        .handle_in(Frame::method(declare_durable("dq")))
        .unwrap();
    for frame in transfer_frames("dq", AcceptMode::None, false) {
        test.session.handle_in(frame).unwrap();
    }
    let frames_before = test.log.len();

    // Destroy the session with the write still in flight, then let the
    // worker finish late.
    drop(test.session);
    store.complete_all(true);

    assert_eq!(test.log.len(), frames_before, "no frames after destroy");
}

#[test]
fn send_completion_is_idempotent_between_receipts() {
    let broker = broker();
    let mut test = attach_session(&broker, "s1");
    test.session.handle_in(Frame::method(declare("q"))).unwrap();

    test.session.send_completion().unwrap();
    test.session.send_completion().unwrap();
    let completed = completed_sets(&test.log);
    assert_eq!(completed.len(), 2);
    assert_eq!(completed[0], completed[1]);
}

#[test]
fn unknown_method_fails_without_killing_the_session() {
    let broker = broker();
    let mut test = attach_session(&broker, "s1");

    let err = test
        .session
        .handle_in(Frame::method(Method::ExchangeDelete {
            exchange: "amq.direct".into(),
        }))
        .unwrap_err();
    assert!(matches!(err, SessionError::NotImplemented(_)));
    assert!(!err.is_fatal());

    // The unknown command still completed, and the session keeps going.
    test.session
        .handle_in(Frame::method_sync(declare("q")))
        .unwrap();
    let completed = completed_sets(&test.log);
    let ids: Vec<u32> = completed[0].iter().map(SequenceNumber::value).collect();
    assert_eq!(ids, vec![0, 1]);
}

#[test]
fn multi_frame_method_segment_is_fatal() {
    let broker = broker();
    let mut test = attach_session(&broker, "s1");

    let mut frame = Frame::method(Method::ExecutionSync);
    frame.eof = false;
    frame.eos = false;
    let err = test.session.handle_in(frame).unwrap_err();
    assert!(matches!(err, SessionError::InternalError(_)));
    assert!(err.is_fatal());
}

#[test]
fn detach_attach_replays_identically() {
    let inbound = |routing_key: &str| {
        let mut frames = vec![
            Frame::method(declare("mirror")),
        ];
        frames.extend(transfer_frames(routing_key, AcceptMode::None, false));
        frames.push(Frame::method_sync(Method::ExecutionSync));
        frames
    };

    // Straight-through run.
    let broker_a = broker();
    let mut straight = attach_session(&broker_a, "s1");
    for frame in inbound("mirror") {
        straight.session.handle_in(frame).unwrap();
    }

    // Same inbound stream with a detach/attach between commands.
    let broker_b = broker();
    let mut interrupted = attach_session(&broker_b, "s1");
    let frames = inbound("mirror");
    interrupted.session.handle_in(frames[0].clone()).unwrap();
    interrupted.session.detach();
    let (wakeup, _wakeups) = CompletionWakeup::channel();
    interrupted.session.attach(
        Box::new(CollectingHandler::new(interrupted.log.clone(), 1)),
        wakeup,
    );
    for frame in frames.into_iter().skip(1) {
        interrupted.session.handle_in(frame).unwrap();
    }

    assert_eq!(straight.log.frames(), interrupted.log.frames());
}

#[test]
fn detached_session_refuses_output() {
    let broker = broker();
    let mut test = attach_session(&broker, "s1");
    test.session.detach();
    let err = test
        .session
        .handle_out(Frame::method(Method::ExecutionSync))
        .unwrap_err();
    assert!(matches!(err, SessionError::Detached));
}

#[test]
fn query_returns_execution_result() {
    let broker = broker();
    let mut test = attach_session(&broker, "s1");
    test.session.handle_in(Frame::method(declare("depth"))).unwrap();
    for frame in transfer_frames("depth", AcceptMode::None, false) {
        test.session.handle_in(frame).unwrap();
    }
    test.session
        .handle_in(Frame::method(Method::QueueQuery {
            queue: "depth".into(),
        }))
        .unwrap();

    let results: Vec<_> = test
        .log
        .controls()
        .into_iter()
        .filter_map(|control| match control {
            Control::ExecutionResult { command_id, value } => Some((command_id, value)),
            _ => None,
        })
        .collect();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, SequenceNumber::new(2));
    let stratus::protocol::ResultValue::QueueQuery(query) = &results[0].1;
    assert_eq!(query.queue, "depth");
    assert_eq!(query.message_count, 1);
}

#[test]
fn deliveries_are_replayed_until_confirmed() {
    let broker = broker();
    let mut test = attach_session(&broker, "s1");
    let id = test
        .session
        .deliver(
            "sub",
            MessageProperties::default(),
            Bytes::from_static(b"out"),
            false,
        )
        .unwrap();
    assert_eq!(id, SequenceNumber::new(0));
    assert_eq!(test.session.replay_depth(), 1);
    assert_eq!(test.session.replay_frames().len(), 3);
    assert_eq!(test.session.mgmt().unacked_messages(), 1);

    let mut confirmed = SequenceSet::new();
    confirmed.add(id);
    test.session.sender_completed(&confirmed);
    assert_eq!(test.session.replay_depth(), 0);
    assert_eq!(test.session.mgmt().unacked_messages(), 0);
}

#[test]
fn management_methods() {
    let broker = broker();
    let mut test = attach_session(&broker, "s1");

    assert_eq!(
        test.session.management_method(SessionMethod::Close, true),
        MethodStatus::NotImplemented
    );
    assert_eq!(
        test.session
            .management_method(SessionMethod::SolicitAck, true),
        MethodStatus::NotImplemented
    );
    assert_eq!(
        test.session.management_method(SessionMethod::Detach, false),
        MethodStatus::Forbidden
    );
    assert!(test.session.is_attached());

    assert_eq!(
        test.session.management_method(SessionMethod::Detach, true),
        MethodStatus::Ok
    );
    assert!(!test.session.is_attached());
    let detached = test
        .log
        .controls()
        .into_iter()
        .any(|control| matches!(control, Control::SessionDetach { .. }));
    assert!(detached);
}

#[test]
fn publisher_and_timestamp_are_stamped() {
    let config = common::timestamping_config();
    let broker = stratus::core::broker::Broker::new(
        &config,
        stratus::core::time::SystemClock,
        None,
    );
    let mut test = attach_session(&broker, "s1");
    test.session.handle_in(Frame::method(declare("stamped"))).unwrap();
    for frame in transfer_frames("stamped", AcceptMode::None, false) {
        test.session.handle_in(frame).unwrap();
    }
    let queued = broker.queues().get("stamped").unwrap().consume("c").unwrap();
    assert_eq!(queued.message.publisher().as_deref(), Some("test-connection"));
    assert!(queued.message.timestamp().is_some());
}

#[test]
fn session_destroy_marks_management_object() {
    let broker = broker();
    let test = attach_session(&broker, "s1");
    let mgmt = test.session.mgmt().clone();
    drop(test.session);
    assert!(mgmt.is_destroyed());
    assert!(broker.agent().session("s1").is_some());
}

#[test]
fn invalid_declare_arguments_are_rejected() {
    let broker = broker();
    let mut test = attach_session(&broker, "s1");
    let err = test
        .session
        .handle_in(Frame::method(Method::QueueDeclare {
            queue: "bad".into(),
            durable: false,
            arguments: declare_arguments(&[("dropMessagesAtLimit", "1"), ("lvqKey", "k")]),
        }))
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidArgument(_)));
    assert!(!err.is_fatal());
    assert!(broker.queues().get("bad").is_none());
}
