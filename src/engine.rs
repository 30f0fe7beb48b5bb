//! Wires the graph, job queue, compute worker, and progress notifier
//! together behind one entry point a transport layer can call into.
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::info;

use crate::errors::Result;
use crate::graph::Graph;
use crate::intake::{self, RequestParams};
use crate::queue::{JobHandle, JobQueue, Worker};
use crate::writer::ReplyChannel;

pub struct Engine {
    graph: Arc<Graph>,
    queue: Arc<JobQueue>,
}

impl Engine {
    pub fn new(graph: Graph, queue_capacity: usize) -> Engine {
        Engine {
            graph: Arc::new(graph),
            queue: Arc::new(JobQueue::new(queue_capacity)),
        }
    }

    /// Spawns the single compute-worker thread. The returned handle never
    /// finishes on its own — `Worker::run` loops forever.
    pub fn spawn_worker(&self) -> JoinHandle<()> {
        let graph = Arc::clone(&self.graph);
        let queue = Arc::clone(&self.queue);
        thread::Builder::new()
            .name("fastcci-worker".into())
            .spawn(move || {
                let mut worker = Worker::new(graph, queue);
                worker.run();
            })
            .expect("failed to spawn compute worker thread")
    }

    /// Spawns the progress-notifier thread.
    pub fn spawn_notifier(&self) -> JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        thread::Builder::new()
            .name("fastcci-notifier".into())
            .spawn(move || queue.run_notifier())
            .expect("failed to spawn progress notifier thread")
    }

    /// Validates and classifies a request, admits it to the queue, and (for
    /// channels that want progress frames) writes the `QUEUED <k>`
    /// acknowledgement before returning the handle for the caller to await.
    pub fn submit(&self, params: &dyn RequestParams, channel: Box<dyn ReplyChannel>) -> Result<Arc<JobHandle>> {
        let job_params = intake::build_job(params, &self.graph)?;
        let handle = JobHandle::new(job_params, channel);
        let ahead = self.queue.try_enqueue(Arc::clone(&handle))?;

        if handle.supports_progress() {
            handle.with_channel(|ch| {
                let _ = ch.write_line(&format!("QUEUED {}", ahead));
            });
        }

        info!(c1 = job_params.c1, c2 = job_params.c2, kind = ?job_params.kind, ahead, "job admitted");
        Ok(handle)
    }

    /// The status probe's reply line.
    pub fn status_probe(&self) -> String {
        self.queue.status_probe()
    }

    /// How many jobs are strictly ahead of `handle` in FIFO order, for a
    /// duplex-mode handler's `WAITING <k>` frame. `None` once the job is no
    /// longer queued.
    pub fn position_of(&self, handle: &Arc<JobHandle>) -> Option<usize> {
        self.queue.position_of(handle)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }
}
