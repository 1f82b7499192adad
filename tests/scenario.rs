//! Periodic producers feeding a printer task through a traced queue

mod common;

use std::collections::HashMap;
use std::thread;

use common::{enter_task, HostKernel, HostTracer, TracedQueue};
use rtmon::trace::parse::{parse_line, ParsedLine};
use rtmon::trace::report::Monitor;
use rtmon::trace::{QueueEventKind, TaskEventKind, TraceRecord};
use rtmon::{OsError, TraceCategory, TIMEOUT_NONE};

const QUEUE_DEPTH: usize = 10;
const QUEUE_ID: u32 = 0x3FFB_0000;

/// (period in ticks, messages) per producer; 100/200/300 ms scaled down
const PRODUCERS: [(u32, u32); 3] = [(10, 12), (20, 6), (30, 4)];

#[test]
fn test_producers_and_printer() {
    let kernel = HostKernel::new();
    let tracer: HostTracer<'_> = HostTracer::new(&kernel);
    tracer.init().unwrap();

    let monitor = kernel.create_task(1);
    let printer = kernel.create_task(3);
    let producers: Vec<u32> = PRODUCERS.iter().map(|_| kernel.create_task(2)).collect();
    tracer.set_monitor_task(monitor).unwrap();

    let queue = TracedQueue::new(QUEUE_ID, QUEUE_DEPTH, &tracer);
    let total: u32 = PRODUCERS.iter().map(|(_, n)| n).sum();

    let received = thread::scope(|s| {
        for (i, (&task, &(period, count))) in producers.iter().zip(PRODUCERS.iter()).enumerate() {
            let queue = &queue;
            let tracer = &tracer;
            let kernel = &kernel;
            tracer.task_create(task);
            s.spawn(move || {
                enter_task(task);
                for seq in 0..count {
                    let msg = format!("producer {} message {}", i, seq);
                    // retry on a full queue so no message is lost
                    while queue.send(msg.clone(), TIMEOUT_NONE).is_err() {
                        kernel.delay(1);
                    }
                    tracer.task_delay(period);
                    kernel.delay(period);
                }
            });
        }

        let consumer = s.spawn(|| {
            enter_task(printer);
            let mut lines = Vec::new();
            while lines.len() < total as usize {
                if let Ok(msg) = queue.receive(1_000) {
                    lines.push(msg);
                }
            }
            lines
        });
        consumer.join().unwrap()
    });

    // per producer: complete, ordered, no duplicates
    let mut streams: HashMap<usize, Vec<u32>> = HashMap::new();
    for line in &received {
        let words: Vec<&str> = line.split_whitespace().collect();
        let producer: usize = words[1].parse().unwrap();
        let seq: u32 = words[3].parse().unwrap();
        streams.entry(producer).or_default().push(seq);
    }
    for (i, &(_, count)) in PRODUCERS.iter().enumerate() {
        let expected: Vec<u32> = (0..count).collect();
        assert_eq!(streams[&i], expected);
    }

    // every successful send and receive is in the queue trace
    let successes = |kind: QueueEventKind| {
        tracer
            .queue_events()
            .iter()
            .filter(|e| e.kind == kind && e.queue == QUEUE_ID)
            .count()
    };
    assert_eq!(successes(QueueEventKind::Send), total as usize);
    assert_eq!(successes(QueueEventKind::Receive), total as usize);

    let creates = tracer
        .task_events()
        .iter()
        .filter(|e| e.kind == TaskEventKind::Create)
        .count();
    assert_eq!(creates, producers.len());
    assert_eq!(tracer.error_flags(), 0);

    // the monitor's dump is parseable and complete
    let mut out = String::new();
    enter_task(monitor);
    Monitor::new(&tracer)
        .with_names(&[(printer, "printer")])
        .run_once(&mut out, |_| {})
        .unwrap();
    let dumped = out
        .lines()
        .filter_map(|l| parse_line(l).unwrap())
        .filter(|l| matches!(l, ParsedLine::Record(_)))
        .count();
    let recorded: usize = TraceCategory::ALL.iter().map(|c| tracer.len(*c)).sum();
    assert_eq!(dumped, recorded);
}

#[test]
fn test_backpressure_is_traced() {
    let kernel = HostKernel::new();
    let tracer: HostTracer<'_> = HostTracer::new(&kernel);
    tracer.init().unwrap();
    tracer.set_monitor_task(kernel.create_task(1)).unwrap();

    let producer = kernel.create_task(2);
    enter_task(producer);

    let queue = TracedQueue::new(QUEUE_ID, QUEUE_DEPTH, &tracer);
    for i in 0..QUEUE_DEPTH {
        queue.send(i, TIMEOUT_NONE).unwrap();
    }
    assert_eq!(queue.send(99, TIMEOUT_NONE), Err(OsError::Timeout));
    assert_eq!(queue.send(99, 5), Err(OsError::Timeout));
    assert_eq!(queue.send_from_isr(99), Err(OsError::Timeout));
    assert_eq!(queue.len(), QUEUE_DEPTH);

    let failures: Vec<(QueueEventKind, u32)> = tracer
        .queue_events()
        .iter()
        .filter(|e| e.kind.is_failure())
        .map(|e| (e.kind, e.ticks_to_wait))
        .collect();
    assert_eq!(
        failures,
        [
            (QueueEventKind::SendFailed, 0),
            (QueueEventKind::SendFailed, 5),
            (QueueEventKind::SendFromIsrFailed, 0),
        ]
    );
    assert!(tracer
        .queue_events()
        .iter()
        .all(|e| e.task == producer && e.queue == QUEUE_ID));

    // draining frees room again
    assert_eq!(queue.receive(TIMEOUT_NONE), Ok(0));
    queue.send(10, TIMEOUT_NONE).unwrap();
    let last = tracer.queue_events().iter().last().map(TraceRecord::from);
    assert!(matches!(last, Some(TraceRecord::Queue(e)) if e.kind == QueueEventKind::Send));
}
