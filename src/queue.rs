//! Job queue, compute worker, and progress notifier (C7).
//!
//! A single bounded FIFO holds every job from admission until it is fully
//! `Done`; the compute worker always processes the job at the front. A
//! second thread wakes each still-pending job's private condition variable
//! every couple of seconds so a duplex-mode handler can emit an
//! out-of-band progress frame without touching the worker.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::buffers::{Mask, ResultBuffer};
use crate::errors::{ErrorKind, Result};
use crate::graph::{EntityId, Graph};
use crate::setops::{self, OutofMarker};
use crate::pathfind;
use crate::traversal::fetch_files;
use crate::writer::{ReplyChannel, ResultWriter};

/// Bound on the number of jobs admitted but not yet `Done`.
pub const MAX_ITEM: usize = 1000;

/// How often the notifier wakes still-pending jobs.
pub const NOTIFIER_PERIOD: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    List,
    And,
    Not,
    Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobStatus {
    Waiting,
    Preprocess,
    Computing,
    Streaming,
    Done,
}

/// The validated parameters of one request, independent of its reply channel.
#[derive(Debug, Clone, Copy)]
pub struct JobParams {
    pub c1: EntityId,
    pub c2: EntityId,
    pub kind: JobKind,
    pub offset: usize,
    pub size: usize,
}

/// A queued computation: parameters, reply channel, status, and the
/// private signal the worker and notifier use to wake the handler that
/// owns it.
pub struct JobHandle {
    pub params: JobParams,
    status: Mutex<JobStatus>,
    condvar: Condvar,
    fnum_a: AtomicUsize,
    fnum_b: AtomicUsize,
    channel: Mutex<Box<dyn ReplyChannel>>,
}

impl JobHandle {
    pub fn new(params: JobParams, channel: Box<dyn ReplyChannel>) -> Arc<JobHandle> {
        Arc::new(JobHandle {
            params,
            status: Mutex::new(JobStatus::Waiting),
            condvar: Condvar::new(),
            fnum_a: AtomicUsize::new(0),
            fnum_b: AtomicUsize::new(0),
            channel: Mutex::new(channel),
        })
    }

    pub fn status(&self) -> JobStatus {
        *self.status.lock().unwrap()
    }

    fn set_status(&self, status: JobStatus) {
        let mut guard = self.status.lock().unwrap();
        *guard = status;
        self.condvar.notify_all();
    }

    pub fn progress(&self) -> (usize, usize) {
        (self.fnum_a.load(Ordering::Relaxed), self.fnum_b.load(Ordering::Relaxed))
    }

    fn set_progress(&self, a: usize, b: usize) {
        self.fnum_a.store(a, Ordering::Relaxed);
        self.fnum_b.store(b, Ordering::Relaxed);
    }

    pub fn supports_progress(&self) -> bool {
        self.channel.lock().unwrap().supports_progress()
    }

    pub fn with_channel<R>(&self, f: impl FnOnce(&mut dyn ReplyChannel) -> R) -> R {
        let mut guard = self.channel.lock().unwrap();
        f(&mut **guard)
    }

    /// Blocks the calling (handler) thread until the worker marks this job
    /// `Done`. Unlike the reference engine's double-mutex discipline, a
    /// single `Condvar::wait` on this job's own status mutex is race-free
    /// here: the condvar reacquires the lock atomically, so a wakeup can
    /// never be missed between the status check and going to sleep.
    pub fn wait_until_done(&self) {
        let mut guard = self.status.lock().unwrap();
        while *guard != JobStatus::Done {
            guard = self.condvar.wait(guard).unwrap();
        }
    }

    /// Blocks like [`JobHandle::wait_until_done`], but calls `on_wake` with
    /// the live status and progress counters on every notifier tick or
    /// worker transition, so a duplex-mode caller can emit `WAITING`/
    /// `WORKING` frames without polling.
    pub fn wait_with_progress(&self, mut on_wake: impl FnMut(JobStatus, usize, usize)) {
        let mut guard = self.status.lock().unwrap();
        while *guard != JobStatus::Done {
            let (a, b) = self.progress();
            on_wake(*guard, a, b);
            guard = self.condvar.wait(guard).unwrap();
        }
    }

    /// Test-only counterpart to [`JobHandle::wait_until_done`]: gives up
    /// after `timeout` instead of blocking forever, so a worker/notifier
    /// regression fails the one test driving it rather than hanging the
    /// whole suite. Never used outside `#[cfg(test)]` — production callers
    /// always want the unbounded wait, since spec §5 defines no
    /// cancellation or timeout for a job once it's enqueued.
    #[cfg(test)]
    fn wait_until_done_timeout(&self, timeout: Duration) -> bool {
        let guard = self.status.lock().unwrap();
        let (_guard, result) = self
            .condvar
            .wait_timeout_while(guard, timeout, |status| *status != JobStatus::Done)
            .unwrap();
        !result.timed_out()
    }

    /// Wakes whoever is parked in [`JobHandle::wait_with_progress`] without
    /// changing `status` — used by the progress notifier's periodic tick.
    fn notify_tick(&self) {
        let _guard = self.status.lock().unwrap();
        self.condvar.notify_all();
    }
}

/// Bounded FIFO of jobs from admission to completion, plus the worker loop
/// that drains it and the notifier loop that pokes everything still in it.
pub struct JobQueue {
    jobs: Mutex<VecDeque<Arc<JobHandle>>>,
    not_empty: Condvar,
    capacity: usize,
}

impl JobQueue {
    pub fn new(capacity: usize) -> JobQueue {
        JobQueue {
            jobs: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    /// Admits a job, returning how many jobs are already ahead of it.
    /// Rejects synchronously once `capacity` jobs are in flight.
    pub fn try_enqueue(&self, handle: Arc<JobHandle>) -> Result<usize> {
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.len() >= self.capacity {
            return Err(ErrorKind::QueueFull.into());
        }
        let ahead = jobs.len();
        jobs.push_back(handle);
        drop(jobs);
        self.not_empty.notify_one();
        Ok(ahead)
    }

    /// Number of jobs admitted but not yet `Done` (`tail - head`).
    pub fn depth(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    /// The status probe's one-line reply, reproduced byte for byte from the
    /// original server's `handleStatus`.
    pub fn status_probe(&self) -> String {
        format!("{} requests in the queue.\n", self.depth())
    }

    /// How many jobs are strictly ahead of `handle` in FIFO order, or `None`
    /// if it is no longer queued (already completed).
    pub fn position_of(&self, handle: &Arc<JobHandle>) -> Option<usize> {
        let jobs = self.jobs.lock().unwrap();
        jobs.iter().position(|j| Arc::ptr_eq(j, handle))
    }

    /// The worker's wait point: blocks until a job is at the front.
    fn wait_for_next(&self) -> Arc<JobHandle> {
        let mut jobs = self.jobs.lock().unwrap();
        loop {
            if let Some(front) = jobs.front() {
                return Arc::clone(front);
            }
            jobs = self.not_empty.wait(jobs).unwrap();
        }
    }

    /// Called by the worker once the front job reaches `Done`; advances `head`.
    fn complete_front(&self) {
        self.jobs.lock().unwrap().pop_front();
    }

    /// A snapshot of every job currently admitted, used by the notifier.
    fn snapshot(&self) -> Vec<Arc<JobHandle>> {
        self.jobs.lock().unwrap().iter().cloned().collect()
    }

    /// Runs forever, waking every still-admitted job's private condvar on a
    /// fixed period so duplex-mode handlers can emit `WAITING`/`WORKING`
    /// frames. Intended to be the body of the progress-notifier thread.
    pub fn run_notifier(self: &Arc<Self>) {
        loop {
            std::thread::sleep(NOTIFIER_PERIOD);
            for job in self.snapshot() {
                if job.supports_progress() {
                    job.notify_tick();
                }
            }
        }
    }
}

/// Owns the two result buffers and the visitation mask — the worker-exclusive
/// state of spec §3/§5. Never touched by any other thread.
pub struct Worker {
    graph: Arc<Graph>,
    queue: Arc<JobQueue>,
    buf_a: ResultBuffer,
    buf_b: ResultBuffer,
    mask: Mask,
}

impl Worker {
    pub fn new(graph: Arc<Graph>, queue: Arc<JobQueue>) -> Worker {
        let n = graph.len();
        Worker {
            graph,
            queue,
            buf_a: ResultBuffer::new(),
            buf_b: ResultBuffer::new(),
            mask: Mask::new(n),
        }
    }

    /// Runs forever, draining the queue in FIFO order. Intended to be the
    /// body of the single compute-worker thread.
    pub fn run(&mut self) {
        loop {
            self.process_one();
        }
    }

    /// Dequeues and fully processes exactly one job, blocking until one is
    /// available. Exposed separately from `run` so tests can drive the
    /// worker deterministically instead of spawning an infinite loop.
    pub fn process_one(&mut self) {
        let job = self.queue.wait_for_next();
        self.process(&job);
        job.set_status(JobStatus::Done);
        self.queue.complete_front();
    }

    fn process(&mut self, job: &Arc<JobHandle>) {
        if job.supports_progress() {
            job.with_channel(|ch| {
                let _ = ch.write_line("COMPUTE_START");
            });
        }
        job.set_status(JobStatus::Preprocess);
        self.buf_a.reset();
        self.buf_b.reset();
        job.set_progress(0, 0);

        let params = job.params;
        match params.kind {
            JobKind::List => {
                job.set_status(JobStatus::Computing);
                self.mask.reset();
                fetch_files(&self.graph, params.c1, &mut self.mask, &mut self.buf_a);
                job.set_progress(self.buf_a.len(), 0);
                job.set_status(JobStatus::Streaming);
                let buf_a = &mut self.buf_a;
                job.with_channel(|ch| {
                    let mut writer = ResultWriter::new(ch);
                    let outof = setops::list_unique(buf_a, params.offset, params.size, |id| writer.emit(id));
                    writer.finish(outof);
                });
            }
            JobKind::And | JobKind::Not => {
                job.set_status(JobStatus::Computing);
                self.mask.reset();
                fetch_files(&self.graph, params.c1, &mut self.mask, &mut self.buf_a);
                job.set_progress(self.buf_a.len(), 0);
                self.mask.reset();
                fetch_files(&self.graph, params.c2, &mut self.mask, &mut self.buf_b);
                job.set_progress(self.buf_a.len(), self.buf_b.len());
                job.set_status(JobStatus::Streaming);
                let buf_a = &mut self.buf_a;
                let buf_b = &mut self.buf_b;
                let kind = params.kind;
                job.with_channel(|ch| {
                    let mut writer = ResultWriter::new(ch);
                    let outof = if kind == JobKind::And {
                        setops::intersect(buf_a, buf_b, params.offset, params.size, |id| writer.emit(id))
                    } else {
                        setops::subtract(buf_a, buf_b, params.offset, params.size, |id| writer.emit(id))
                    };
                    writer.finish(outof);
                });
            }
            JobKind::Path => {
                self.mask.reset();
                job.set_status(JobStatus::Computing);
                match pathfind::find_path(&self.graph, params.c1, params.c2, &mut self.mask) {
                    Some(path) => {
                        job.set_status(JobStatus::Streaming);
                        job.with_channel(|ch| {
                            let mut writer = ResultWriter::new(ch);
                            for id in path {
                                writer.emit(id);
                            }
                            writer.finish(OutofMarker::Omitted);
                        });
                    }
                    None => {
                        job.with_channel(|ch| {
                            let writer = ResultWriter::new(ch);
                            writer.finish_nopath();
                        });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::sample_graph;
    use std::sync::Arc as StdArc;
    use std::thread;

    /// Upper bound on how long any single test is willing to block on a
    /// worker/notifier thread. Chosen generously relative to the work
    /// these tests do (a handful of nodes, no real I/O) so a regression
    /// that deadlocks fails fast instead of hanging the whole suite.
    const TEST_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

    #[derive(Default)]
    struct CollectingChannel {
        lines: StdArc<Mutex<Vec<String>>>,
    }

    impl ReplyChannel for CollectingChannel {
        fn write_line(&mut self, line: &str) -> std::io::Result<()> {
            self.lines.lock().unwrap().push(line.to_string());
            Ok(())
        }

        fn supports_progress(&self) -> bool {
            false
        }
    }

    fn run_one(graph: Arc<Graph>, params: JobParams) -> Vec<String> {
        let queue = Arc::new(JobQueue::new(MAX_ITEM));
        let lines = StdArc::new(Mutex::new(Vec::new()));
        let channel = CollectingChannel { lines: lines.clone() };
        let handle = JobHandle::new(params, Box::new(channel));
        queue.try_enqueue(Arc::clone(&handle)).unwrap();

        let worker_graph = Arc::clone(&graph);
        let worker_queue = Arc::clone(&queue);
        thread::spawn(move || {
            let mut w = Worker::new(worker_graph, worker_queue);
            w.process_one();
        });
        assert!(
            handle.wait_until_done_timeout(TEST_WAIT_TIMEOUT),
            "worker did not finish the job within the test timeout"
        );

        let out = lines.lock().unwrap().clone();
        out
    }

    #[test]
    fn list_job_streams_and_completes() {
        let graph = Arc::new(sample_graph());
        let params = JobParams {
            c1: 10,
            c2: 10,
            kind: JobKind::List,
            offset: 0,
            size: 100,
        };
        let lines = run_one(graph, params);
        assert_eq!(lines, vec!["RESULT 100|101|102|103|104".to_string(), "OUTOF 5".to_string()]);
    }

    #[test]
    fn admission_respects_capacity() {
        let queue = JobQueue::new(1);
        let params = JobParams {
            c1: 0,
            c2: 0,
            kind: JobKind::List,
            offset: 0,
            size: 10,
        };
        let h1 = JobHandle::new(params, Box::new(CollectingChannel::default()));
        let h2 = JobHandle::new(params, Box::new(CollectingChannel::default()));
        assert_eq!(queue.try_enqueue(h1).unwrap(), 0);
        assert!(queue.try_enqueue(h2).is_err());
    }

    #[test]
    fn status_probe_reports_queue_depth() {
        let queue = JobQueue::new(MAX_ITEM);
        assert_eq!(queue.status_probe(), "0 requests in the queue.\n");
        let params = JobParams {
            c1: 0,
            c2: 0,
            kind: JobKind::List,
            offset: 0,
            size: 10,
        };
        let h = JobHandle::new(params, Box::new(CollectingChannel::default()));
        queue.try_enqueue(h).unwrap();
        assert_eq!(queue.status_probe(), "1 requests in the queue.\n");
    }

    #[test]
    fn handler_wakes_on_status_transition() {
        let params = JobParams {
            c1: 0,
            c2: 0,
            kind: JobKind::List,
            offset: 0,
            size: 10,
        };
        let handle = JobHandle::new(params, Box::new(CollectingChannel::default()));
        let observed: StdArc<Mutex<Vec<JobStatus>>> = StdArc::new(Mutex::new(Vec::new()));

        let waiter_handle = Arc::clone(&handle);
        let waiter_observed = observed.clone();
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        thread::spawn(move || {
            waiter_handle.wait_with_progress(|status, _, _| {
                waiter_observed.lock().unwrap().push(status);
            });
            let _ = done_tx.send(());
        });

        // Give the waiter a moment to park on the condvar before transitioning.
        thread::sleep(Duration::from_millis(20));
        handle.set_status(JobStatus::Preprocess);
        handle.set_status(JobStatus::Done);
        done_rx
            .recv_timeout(TEST_WAIT_TIMEOUT)
            .expect("waiter did not observe Done within the test timeout");

        let seen = observed.lock().unwrap();
        assert!(seen.contains(&JobStatus::Waiting) || seen.contains(&JobStatus::Preprocess));
    }
}
