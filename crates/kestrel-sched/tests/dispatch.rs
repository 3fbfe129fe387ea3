//! Mailbox backpressure and ordering.

use std::sync::{Arc, Mutex};

use kestrel_sched::{
    Message, MessageId, Scheduler, SchedulerBuilder, SchedulerConfig, SchedulerError, TaskId,
    task_fn,
};
use proptest::prelude::*;

type Log = Arc<Mutex<Vec<(u16, u16)>>>;

fn logging_scheduler(tasks: &[u16], capacity: usize) -> (Scheduler, Log) {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut builder = SchedulerBuilder::new(SchedulerConfig {
        max_tasks: 8,
        mailbox_capacity: capacity,
    });
    for &id in tasks {
        let log = Arc::clone(&log);
        builder
            .register_task(
                TaskId(id),
                Box::new(task_fn("logger", move |ctx, msg| {
                    log.lock().unwrap().push((ctx.task_id().0, msg.id.0));
                })),
            )
            .unwrap();
    }
    (builder.build(), log)
}

#[test]
fn one_past_capacity_is_queue_full_and_order_is_kept() {
    const CAPACITY: usize = 4;
    let (mut sched, log) = logging_scheduler(&[1], CAPACITY);

    for i in 0..CAPACITY as u16 {
        sched
            .post_message(TaskId(1), Message::new(MessageId(i), vec![i as u8]))
            .unwrap();
    }
    assert_eq!(
        sched.post_message(TaskId(1), Message::empty(MessageId(99))),
        Err(SchedulerError::QueueFull(TaskId(1)))
    );

    assert_eq!(sched.run_until_idle(), CAPACITY);
    let delivered: Vec<u16> = log.lock().unwrap().iter().map(|(_, m)| *m).collect();
    assert_eq!(delivered, vec![0, 1, 2, 3]);

    // Room again once drained.
    sched
        .post_message(TaskId(1), Message::empty(MessageId(99)))
        .unwrap();
}

#[test]
fn per_task_capacity_override() {
    let mut builder = Scheduler::builder();
    builder
        .register_task_with_capacity(TaskId(5), Box::new(task_fn("tiny", |_, _| {})), 1)
        .unwrap();
    let sched = builder.build();
    sched.post_message(TaskId(5), Message::empty(MessageId(1))).unwrap();
    assert_eq!(
        sched.post_message(TaskId(5), Message::empty(MessageId(2))),
        Err(SchedulerError::QueueFull(TaskId(5)))
    );
}

#[test]
fn posting_from_other_threads() {
    let (mut sched, log) = logging_scheduler(&[1, 2], 64);
    let workers: Vec<_> = [1u16, 2]
        .into_iter()
        .map(|task| {
            let handle = sched.handle();
            std::thread::spawn(move || {
                for i in 0..16 {
                    handle
                        .post_message(TaskId(task), Message::empty(MessageId(i)))
                        .unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    sched.run_until_idle();
    let log = log.lock().unwrap();
    for task in [1u16, 2] {
        let seen: Vec<u16> = log.iter().filter(|(t, _)| *t == task).map(|(_, m)| *m).collect();
        assert_eq!(seen, (0..16).collect::<Vec<_>>());
    }
}

#[test]
fn timer_thread_kicks_background_until_stop() {
    use kestrel_sched::{Context, Task};

    struct Counter {
        runs: u32,
        limit: u32,
        seen: Arc<Mutex<u32>>,
    }

    impl Task for Counter {
        fn handle(&mut self, _ctx: &mut Context<'_>, _message: Message) {}

        fn background(&mut self, ctx: &mut Context<'_>) {
            self.runs += 1;
            *self.seen.lock().unwrap() = self.runs;
            if self.runs == self.limit {
                ctx.request_stop();
            }
        }
    }

    let seen = Arc::new(Mutex::new(0));
    let mut builder = Scheduler::builder();
    builder
        .register_task(
            TaskId(1),
            Box::new(Counter {
                runs: 0,
                limit: 3,
                seen: Arc::clone(&seen),
            }),
        )
        .unwrap();
    let mut sched = builder.build();
    let handle = sched.handle();
    let timer = std::thread::spawn(move || {
        while !handle.is_stopping() {
            let _ = handle.raise_bg_int(TaskId(1));
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    });
    sched.run_forever();
    // The loop clears the stop flag on return; stop the timer explicitly.
    sched.stop();
    timer.join().unwrap();
    assert_eq!(*seen.lock().unwrap(), 3);
}

proptest! {
    #[test]
    fn fifo_per_task_under_interleaving(posts in proptest::collection::vec((1u16..=3, any::<u16>()), 0..60)) {
        let (mut sched, log) = logging_scheduler(&[1, 2, 3], 64);
        for (task, msg) in &posts {
            sched.post_message(TaskId(*task), Message::empty(MessageId(*msg))).unwrap();
        }
        prop_assert_eq!(sched.run_until_idle(), posts.len());
        let log = log.lock().unwrap();
        for task in 1u16..=3 {
            let sent: Vec<u16> = posts.iter().filter(|(t, _)| *t == task).map(|(_, m)| *m).collect();
            let got: Vec<u16> = log.iter().filter(|(t, _)| *t == task).map(|(_, m)| *m).collect();
            prop_assert_eq!(sent, got);
        }
    }
}
