// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::unbounded;

use crate::config::{parse_config, ConfigFormat};
use crate::errors::FlowError;
use crate::push::{filters, AggregatedNotificator, ConcurrentBridge, Notificator, Vote, VotingNotificator};
use crate::traits::{ArrowReceiver, ArrowSender, EventId};

#[test]
fn test_graph_of_filters_delivers_in_order() {
    let source = Notificator::<i32>::new("source");
    let skip = filters::skip::<i32>("skip_first", 1);
    let distinct = filters::distinct::<i32>("distinct");
    let square = filters::map("square", |n: &i32| n * n);

    source.send_to(skip.clone());
    skip.send_to(distinct.clone());
    distinct.send_to(square.clone());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    square.on_notification(move |event_id, n: &i32| {
        sink.lock().unwrap().push((event_id, *n));
        Ok(())
    });

    for n in [9, 1, 2, 1, 3, 2] {
        source.push(&n);
    }

    assert_eq!(*seen.lock().unwrap(), vec![(2, 1), (3, 4), (5, 9)]);
}

#[test]
fn test_fault_in_one_branch_does_not_starve_sibling() {
    let source = Notificator::<&'static str>::new("source");
    let parse = filters::try_map("parse", |s: &&'static str| Ok(s.parse::<u8>()?));
    let length = filters::map("length", |s: &&'static str| s.len());
    source.send_to(parse.clone());
    source.send_to(length.clone());

    let faults = Arc::new(Mutex::new(Vec::new()));
    let sink = faults.clone();
    parse.on_exception(move |sender, event_id, fault| {
        sink.lock().unwrap().push((sender.to_string(), event_id, fault.origin().to_string()));
    });
    let lengths = Arc::new(Mutex::new(Vec::new()));
    let sink = lengths.clone();
    length.on_notification(move |_, n: &usize| {
        sink.lock().unwrap().push(*n);
        Ok(())
    });

    source.push(&"12");
    source.push(&"abc");
    source.push(&"7");

    assert_eq!(*lengths.lock().unwrap(), vec![2, 3, 1]);
    assert_eq!(
        *faults.lock().unwrap(),
        vec![("parse".to_string(), 2, "parse".to_string())]
    );
}

#[test]
fn test_exceptions_and_completion_flow_downstream() {
    let source = Notificator::<u32>::new("source");
    let doubled = filters::map("double", |n: &u32| n * 2);
    source.send_to(doubled.clone());

    let (tx, rx) = unbounded();
    let on_fault = tx.clone();
    doubled.on_exception(move |_, event_id, fault| {
        let _ = on_fault.send(format!("fault {} from {}", event_id, fault.origin()));
    });
    doubled.on_completed(move |sender, event_id, message: Option<&u32>| {
        let _ = tx.send(format!("completed {} by {} {:?}", event_id, sender, message));
    });

    source.fail(anyhow::anyhow!("sensor offline"));
    source.complete_with(Some(&4));

    assert_eq!(rx.try_recv().unwrap(), "fault 1 from source");
    assert_eq!(rx.try_recv().unwrap(), "completed 2 by double None");
}

#[test]
fn test_bridge_preserves_enqueue_order_across_producers() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 200;

    let bridge = ConcurrentBridge::<(usize, usize), (usize, usize)>::passthrough("fifo").unwrap();
    let (tx, rx) = unbounded();
    bridge.on_notification(move |_, message: &(usize, usize)| {
        tx.send(*message)?;
        Ok(())
    });

    let enqueue_order = Mutex::new(Vec::new());
    let barrier = Barrier::new(PRODUCERS);
    thread::scope(|scope| {
        for producer in 0..PRODUCERS {
            let bridge = &bridge;
            let enqueue_order = &enqueue_order;
            let barrier = &barrier;
            scope.spawn(move || {
                barrier.wait();
                for seq in 0..PER_PRODUCER {
                    let message = (producer, seq);
                    // Record and enqueue atomically so the recorded order is the queue order
                    let mut order = enqueue_order.lock().unwrap();
                    bridge.process_arrow(order.len() as EventId, &message).unwrap();
                    order.push(message);
                }
            });
        }
    });
    bridge.shutdown();

    let delivered: Vec<_> = rx.try_iter().collect();
    assert_eq!(delivered.len(), PRODUCERS * PER_PRODUCER);
    assert_eq!(delivered, enqueue_order.into_inner().unwrap());
}

#[test]
fn test_bridge_feeds_synchronous_graph_on_worker_thread() {
    let source = Notificator::<u64>::new("source");
    let bridge = ConcurrentBridge::<u64, u64>::passthrough("offload").unwrap();
    let evens = filters::filter("evens", |n: &u64| n % 2 == 0);
    source.send_to(bridge.clone());
    bridge.send_to(evens.clone());

    let caller = thread::current().id();
    let (tx, rx) = unbounded();
    evens.on_notification(move |_, n: &u64| {
        tx.send((*n, thread::current().id()))?;
        Ok(())
    });

    for n in 1..=6 {
        source.push(&n);
    }
    source.complete();
    bridge.shutdown();

    let delivered: Vec<_> = rx.try_iter().collect();
    assert_eq!(delivered.iter().map(|(n, _)| *n).collect::<Vec<_>>(), vec![2, 4, 6]);
    assert!(delivered.iter().all(|(_, id)| *id != caller));
}

#[test]
fn test_voting_gate_controls_forwarding() {
    let gate = Arc::new(VotingNotificator::<String, bool>::new("publish_gate", true));
    gate.add_voter(|_, title: &String, vote: &mut Vote<bool>| {
        if title.trim().is_empty() {
            vote.set(false);
        }
        Ok(())
    });
    gate.add_voter(|_, title: &String, vote: &mut Vote<bool>| {
        vote.update(|ok| *ok && title.len() <= 10);
        Ok(())
    });

    let source = Notificator::<String>::new("titles");
    let accepted = Arc::new(Mutex::new(Vec::new()));
    let voter_gate = gate.clone();
    let sink = accepted.clone();
    source.on_notification(move |_, title: &String| {
        if voter_gate.push(title) {
            sink.lock().unwrap().push(title.clone());
        }
        Ok(())
    });

    for title in ["short", " ", "far too long a title", "ok"] {
        source.push(&title.to_string());
    }

    assert_eq!(*accepted.lock().unwrap(), vec!["short", "ok"]);
}

#[test]
fn test_aggregator_batches_bridge_output() {
    let config = parse_config(
        "bridge:\n  max_queue_size: 16\naggregator:\n  debounce_ms: 30\n",
        ConfigFormat::Yaml,
    )
    .unwrap();

    let bridge = ConcurrentBridge::<u16, u16>::with_config(
        "to_batches",
        &config.bridge,
        crate::push::FnProcessor::new(|n: &u16| -> anyhow::Result<Option<u16>> { Ok(Some(n + 1)) }),
    )
    .unwrap();
    let aggregator = Arc::new(AggregatedNotificator::<u16>::with_config("batches", &config.aggregator).unwrap());
    bridge.send_to(aggregator.clone());

    let (tx, rx) = unbounded();
    aggregator.on_notification(move |_, batch: &Vec<u16>| {
        tx.send(batch.clone())?;
        Ok(())
    });

    for n in 0..10 {
        bridge.enqueue(n as EventId, n).unwrap();
    }
    bridge.shutdown();

    let mut received = Vec::new();
    while received.len() < 10 {
        let batch = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        received.extend(batch);
    }
    assert_eq!(received, (1..=10).collect::<Vec<u16>>());
}

#[test]
fn test_closed_bridge_fault_reaches_sender_exception_channel() {
    let source = Notificator::<u8>::new("source");
    let bridge = ConcurrentBridge::<u8, u8>::passthrough("closed").unwrap();
    source.send_to(bridge.clone());
    bridge.shutdown();

    let (tx, rx) = unbounded();
    source.on_exception(move |_, _, fault| {
        let closed = matches!(
            fault,
            FlowError::ArrowProcessing { source, .. }
                if matches!(source.downcast_ref::<FlowError>(), Some(FlowError::Closed { .. }))
        );
        let _ = tx.send(closed);
    });

    source.push(&1);
    assert!(rx.try_recv().unwrap());
}
