//! Task dispatcher
//!
//! Ordered, deduplicated queue of assigned tasks with single-flight
//! processing. A fixed-interval poll pulls new assignments from the task
//! source; ticks that land while a task is in flight are skipped.
//!
//! The busy flag lives in a `watch` channel: claiming it is a
//! compare-and-set through `send_if_modified`, and `wait_until_idle` can
//! subscribe to its transitions. After a run, remaining work is picked up by
//! a spawned continuation rather than a recursive call.

use crate::ledger::TaskSource;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tqv_common::Task;

/// Runs one task to a terminal outcome, reporting its own errors
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    async fn process(&self, task: Task);
}

/// Result of one poll tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A task was in flight; nothing fetched
    Skipped,
    /// The task source could not be reached
    FetchFailed,
    /// Fetched and merged `added` new tasks; `started` if processing was triggered
    Polled { added: usize, started: bool },
}

/// Task dispatcher service
pub struct TaskDispatcher {
    source: Arc<dyn TaskSource>,
    processor: Arc<dyn TaskProcessor>,
    queue: Mutex<VecDeque<Task>>,
    busy: watch::Sender<bool>,
}

impl TaskDispatcher {
    pub fn new(source: Arc<dyn TaskSource>, processor: Arc<dyn TaskProcessor>) -> Arc<Self> {
        let (busy, _) = watch::channel(false);
        Arc::new(Self {
            source,
            processor,
            queue: Mutex::new(VecDeque::new()),
            busy,
        })
    }

    /// Append tasks whose id is not already queued, keeping arrival order
    ///
    /// Returns the number of tasks added.
    pub fn enqueue(&self, tasks: Vec<Task>) -> usize {
        let mut queue = self.lock_queue();
        let mut added = 0;
        for task in tasks {
            if queue.iter().any(|queued| queued.id == task.id) {
                tracing::debug!(task_id = %task.id, "Task already queued");
                continue;
            }
            queue.push_back(task);
            added += 1;
        }
        added
    }

    pub fn queue_len(&self) -> usize {
        self.lock_queue().len()
    }

    pub fn is_busy(&self) -> bool {
        *self.busy.borrow()
    }

    /// One poll tick: fetch new assignments and start processing if idle
    pub async fn poll(self: &Arc<Self>) -> PollOutcome {
        if self.is_busy() {
            tracing::debug!("Task in flight, skipping poll");
            return PollOutcome::Skipped;
        }

        let tasks = match self.source.fetch_assigned().await {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch assigned tasks");
                return PollOutcome::FetchFailed;
            }
        };

        let fetched = tasks.len();
        let added = self.enqueue(tasks);
        if added > 0 {
            tracing::info!(fetched, added, queued = self.queue_len(), "New tasks queued");
        }

        let started = self.queue_len() > 0 && !self.is_busy();
        if started {
            self.spawn_next();
        }
        PollOutcome::Polled { added, started }
    }

    /// Pop the head of the queue and run it to completion
    ///
    /// Returns `false` without doing anything when another run holds the
    /// busy flag or the queue is empty.
    pub async fn process_next(self: Arc<Self>) -> bool {
        let claimed = self.busy.send_if_modified(|busy| {
            if *busy {
                false
            } else {
                *busy = true;
                true
            }
        });
        if !claimed {
            return false;
        }

        let Some(task) = self.lock_queue().pop_front() else {
            self.busy.send_modify(|busy| *busy = false);
            return false;
        };

        let task_id = task.id.clone();
        tracing::debug!(task_id = %task_id, remaining = self.queue_len(), "Processing task");

        // A panicking run must still release the busy flag
        let processor = Arc::clone(&self.processor);
        if let Err(e) = tokio::spawn(async move { processor.process(task).await }).await {
            tracing::error!(task_id = %task_id, error = %e, "Task run aborted");
        }

        self.busy.send_modify(|busy| *busy = false);

        if self.queue_len() > 0 {
            self.spawn_next();
        }
        true
    }

    /// Deferred continuation: schedule `process_next` on the runtime
    fn spawn_next(self: &Arc<Self>) {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            dispatcher.process_next().await;
        });
    }

    /// Resolve once nothing is in flight and the queue is empty
    pub async fn wait_until_idle(&self) {
        let mut busy = self.busy.subscribe();
        loop {
            if !*busy.borrow_and_update() && self.queue_len() == 0 {
                return;
            }
            if busy.changed().await.is_err() {
                return;
            }
        }
    }

    /// Poll every `poll_interval` until `shutdown` resolves, then let the
    /// in-flight task finish
    pub async fn run(self: Arc<Self>, poll_interval: Duration, shutdown: impl Future<Output = ()>) {
        tracing::info!(interval_secs = poll_interval.as_secs_f64(), "Task dispatcher started");

        let mut timer = tokio::time::interval(poll_interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.poll().await;
                }
                _ = &mut shutdown => {
                    tracing::info!("Task dispatcher stopping");
                    break;
                }
            }
        }

        let mut busy = self.busy.subscribe();
        while *busy.borrow_and_update() {
            tracing::info!("Waiting for in-flight task to finish");
            if busy.changed().await.is_err() {
                break;
            }
        }
        tracing::info!(dropped = self.queue_len(), "Task dispatcher stopped");
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Task>> {
        // Queue operations never panic while holding the lock
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;
    use tqv_common::model::markers_from_seconds;

    fn task(id: &str) -> Task {
        Task {
            id: id.to_string(),
            source_locator: "src".to_string(),
            candidate_locator: "cand".to_string(),
            markers: vec![],
            sample_markers: markers_from_seconds(&[0.0]).unwrap(),
            verifiers: vec![],
            role: Default::default(),
        }
    }

    struct ListSource {
        tasks: Vec<Task>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TaskSource for ListSource {
        async fn fetch_assigned(&self) -> Result<Vec<Task>, LedgerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.tasks.clone())
        }
    }

    /// Records task order and holds each run until a permit is released
    struct GatedProcessor {
        gate: Semaphore,
        order: Mutex<Vec<String>>,
        running: AtomicUsize,
        max_running: AtomicUsize,
    }

    impl GatedProcessor {
        fn new(open: bool) -> Self {
            Self {
                gate: Semaphore::new(if open { Semaphore::MAX_PERMITS } else { 0 }),
                order: Mutex::new(vec![]),
                running: AtomicUsize::new(0),
                max_running: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TaskProcessor for GatedProcessor {
        async fn process(&self, task: Task) {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            self.order.lock().unwrap().push(task.id);
            self.gate.acquire().await.unwrap().forget();
            self.running.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn dispatcher(tasks: Vec<Task>, processor: Arc<GatedProcessor>) -> (Arc<TaskDispatcher>, Arc<ListSource>) {
        let source = Arc::new(ListSource {
            tasks,
            calls: AtomicUsize::new(0),
        });
        (TaskDispatcher::new(source.clone(), processor), source)
    }

    #[tokio::test]
    async fn test_enqueue_deduplicates_by_id() {
        let (d, _) = dispatcher(vec![], Arc::new(GatedProcessor::new(true)));
        assert_eq!(d.enqueue(vec![task("a"), task("b")]), 2);
        assert_eq!(d.enqueue(vec![task("b"), task("c"), task("a")]), 1);
        assert_eq!(d.enqueue(vec![task("d"), task("d")]), 1);
        assert_eq!(d.queue_len(), 4);
    }

    #[tokio::test]
    async fn test_tasks_processed_in_arrival_order() {
        let processor = Arc::new(GatedProcessor::new(true));
        let (d, _) = dispatcher(vec![task("t1"), task("t2"), task("t3")], processor.clone());

        assert_eq!(d.poll().await, PollOutcome::Polled { added: 3, started: true });
        tokio::time::timeout(Duration::from_secs(5), d.wait_until_idle())
            .await
            .unwrap();

        assert_eq!(*processor.order.lock().unwrap(), vec!["t1", "t2", "t3"]);
        assert!(!d.is_busy());
    }

    #[tokio::test]
    async fn test_polls_while_busy_are_skipped() {
        let processor = Arc::new(GatedProcessor::new(false));
        let (d, source) = dispatcher(vec![task("t1"), task("t2")], processor.clone());

        d.poll().await;
        // Let the spawned run claim the flag and block on the gate
        while !d.is_busy() {
            tokio::task::yield_now().await;
        }

        let polls: Vec<_> = (0..5).map(|_| {
            let d = Arc::clone(&d);
            tokio::spawn(async move { d.poll().await })
        }).collect();
        for p in polls {
            assert_eq!(p.await.unwrap(), PollOutcome::Skipped);
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        // A direct second run cannot start either
        assert!(!Arc::clone(&d).process_next().await);

        processor.gate.add_permits(2);
        tokio::time::timeout(Duration::from_secs(5), d.wait_until_idle())
            .await
            .unwrap();

        assert_eq!(processor.max_running.load(Ordering::SeqCst), 1);
        assert_eq!(*processor.order.lock().unwrap(), vec!["t1", "t2"]);
    }

    #[tokio::test]
    async fn test_process_next_on_empty_queue_releases_flag() {
        let (d, _) = dispatcher(vec![], Arc::new(GatedProcessor::new(true)));
        assert!(!Arc::clone(&d).process_next().await);
        assert!(!d.is_busy());
    }
}
