//! Routed execution runtime.
//!
//! Traversal queries and ingestion have very different costs: a query reads
//! one snapshot and returns, while an ingestion run may commit thousands of
//! batches. This module runs them on separate bounded thread pools so a long
//! ingestion never delays reads, and so exactly one writer ever stages
//! batches against the store.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::debug;

use crate::config::{IngestConfig, QueryLimits, RuntimeConfig};
use crate::error::{ExecutionError, GraphError, GraphResult};
use crate::ingest::{IngestReport, Ingestor};
use crate::query::{Neighborhood, PathSet, QueryEngine, TraversalRequest};
use crate::record::RawRecord;
use crate::storage::GraphStore;

/// Execution path selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionPath {
    /// Traversal queries, served by the reader pool.
    Read,
    /// Ingestion runs, served by the single writer.
    Write,
}

impl ExecutionPath {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

enum Job {
    Neighborhood {
        request: TraversalRequest,
        reply: Sender<GraphResult<Neighborhood>>,
    },
    Paths {
        request: TraversalRequest,
        reply: Sender<GraphResult<PathSet>>,
    },
    Ingest {
        records: Vec<RawRecord>,
        reply: Sender<GraphResult<IngestReport>>,
    },

    #[cfg(test)]
    Block {
        started: Sender<()>,
        release: Receiver<()>,
    },
}

struct Services {
    queries: QueryEngine,
    ingestor: Ingestor,
}

impl Services {
    fn run(&self, job: Job) {
        match job {
            Job::Neighborhood { request, reply } => {
                let _ = reply.send(self.queries.neighborhood(&request));
            }
            Job::Paths { request, reply } => {
                let _ = reply.send(self.queries.paths(&request));
            }
            Job::Ingest { records, reply } => {
                let _ = reply.send(self.ingestor.ingest(records));
            }

            #[cfg(test)]
            Job::Block { started, release } => {
                let _ = started.send(());
                let _ = release.recv();
            }
        }
    }
}

struct WorkerPool {
    path: ExecutionPath,
    tx: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    queue_capacity: usize,
}

impl WorkerPool {
    fn start(
        path: ExecutionPath,
        workers: usize,
        queue_capacity: usize,
        services: &Arc<Services>,
    ) -> GraphResult<Self> {
        let (tx, rx) = bounded::<Job>(queue_capacity);

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Job> = rx.clone();
            let services = Arc::clone(services);
            let handle = thread::Builder::new()
                .name(format!("kgraph-{}-{idx}", path.as_str()))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        services.run(job);
                    }
                })
                .map_err(|e| GraphError::internal(format!("failed to spawn {} worker: {e}", path.as_str())))?;
            handles.push(handle);
        }

        Ok(Self {
            path,
            tx,
            workers: handles,
            queue_capacity,
        })
    }

    fn try_submit(&self, job: Job) -> GraphResult<()> {
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ExecutionError::QueueFull {
                path: self.path.as_str().to_string(),
                capacity: self.queue_capacity,
            }
            .into()),
            Err(TrySendError::Disconnected(_)) => Err(ExecutionError::Disconnected {
                path: self.path.as_str().to_string(),
            }
            .into()),
        }
    }

    fn shutdown(self) {
        // Closing the channel lets workers drain queued jobs and exit.
        drop(self.tx);
        for handle in self.workers {
            let _ = handle.join();
        }
    }
}

/// Handle to a submitted job.
pub struct ExecutionHandle<T> {
    path: ExecutionPath,
    rx: Receiver<GraphResult<T>>,
}

impl<T> ExecutionHandle<T> {
    /// Pool the job was routed to.
    #[must_use]
    pub const fn path(&self) -> ExecutionPath {
        self.path
    }

    /// Waits for the job to complete.
    ///
    /// # Errors
    /// - the job's own error
    /// - [`ExecutionError::Disconnected`] if the worker died without answering
    pub fn join(self) -> GraphResult<T> {
        self.rx.recv().map_err(|_| {
            GraphError::from(ExecutionError::Disconnected {
                path: self.path.as_str().to_string(),
            })
        })?
    }

    /// Waits for the job to complete, giving up after `timeout`.
    ///
    /// # Errors
    /// - the job's own error
    /// - [`ExecutionError::Timeout`] if no answer arrived in time
    /// - [`ExecutionError::Disconnected`] if the worker died without answering
    pub fn join_timeout(self, timeout: Duration) -> GraphResult<T> {
        self.rx.recv_timeout(timeout).map_err(|err| {
            GraphError::from(match err {
                RecvTimeoutError::Timeout => ExecutionError::Timeout {
                    duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                },
                RecvTimeoutError::Disconnected => ExecutionError::Disconnected {
                    path: self.path.as_str().to_string(),
                },
            })
        })?
    }
}

/// Thread-pool front end for queries and ingestion over one store.
pub struct GraphRuntime {
    services: Arc<Services>,
    readers: Option<WorkerPool>,
    writer: Option<WorkerPool>,
}

impl GraphRuntime {
    /// Starts the reader pool and the writer.
    ///
    /// # Errors
    /// - invalid configuration, including a merge policy that differs from
    ///   the store's
    /// - a worker thread could not be spawned
    pub fn new(
        store: Arc<dyn GraphStore>,
        config: RuntimeConfig,
        ingest: IngestConfig,
        limits: QueryLimits,
    ) -> GraphResult<Self> {
        let config = config.validate()?;
        let services = Arc::new(Services {
            queries: QueryEngine::new(Arc::clone(&store), limits)?,
            ingestor: Ingestor::new(store, ingest)?,
        });

        let readers = WorkerPool::start(
            ExecutionPath::Read,
            config.reader_workers,
            config.queue_capacity,
            &services,
        )?;
        let writer = WorkerPool::start(ExecutionPath::Write, 1, config.queue_capacity, &services)?;
        debug!(readers = config.reader_workers, queue = config.queue_capacity, "graph runtime started");

        Ok(Self {
            services,
            readers: Some(readers),
            writer: Some(writer),
        })
    }

    fn pool(&self, path: ExecutionPath) -> GraphResult<&WorkerPool> {
        let pool = match path {
            ExecutionPath::Read => self.readers.as_ref(),
            ExecutionPath::Write => self.writer.as_ref(),
        };
        pool.ok_or_else(|| {
            ExecutionError::Disconnected {
                path: path.as_str().to_string(),
            }
            .into()
        })
    }

    fn submit<T>(
        &self,
        path: ExecutionPath,
        job: impl FnOnce(Sender<GraphResult<T>>) -> Job,
    ) -> GraphResult<ExecutionHandle<T>> {
        let (tx, rx) = bounded::<GraphResult<T>>(1);
        self.pool(path)?.try_submit(job(tx))?;
        Ok(ExecutionHandle { path, rx })
    }

    /// Queues a neighborhood query on the reader pool.
    ///
    /// # Errors
    /// [`ExecutionError::QueueFull`] or [`ExecutionError::Disconnected`] if
    /// the job cannot be queued.
    pub fn neighborhood_async(&self, request: TraversalRequest) -> GraphResult<ExecutionHandle<Neighborhood>> {
        self.submit(ExecutionPath::Read, |reply| Job::Neighborhood { request, reply })
    }

    /// Queues a path query on the reader pool.
    ///
    /// # Errors
    /// See [`neighborhood_async`](Self::neighborhood_async).
    pub fn paths_async(&self, request: TraversalRequest) -> GraphResult<ExecutionHandle<PathSet>> {
        self.submit(ExecutionPath::Read, |reply| Job::Paths { request, reply })
    }

    /// Queues an ingestion run on the writer.
    ///
    /// # Errors
    /// See [`neighborhood_async`](Self::neighborhood_async).
    pub fn ingest_async(&self, records: Vec<RawRecord>) -> GraphResult<ExecutionHandle<IngestReport>> {
        self.submit(ExecutionPath::Write, |reply| Job::Ingest { records, reply })
    }

    /// Runs a neighborhood query on the reader pool and waits for it.
    ///
    /// # Errors
    /// Queueing failures, plus everything [`QueryEngine::neighborhood`]
    /// returns.
    pub fn neighborhood(&self, request: TraversalRequest) -> GraphResult<Neighborhood> {
        self.neighborhood_async(request)?.join()
    }

    /// Runs a path query on the reader pool and waits for it.
    ///
    /// # Errors
    /// Queueing failures, plus everything [`QueryEngine::paths`] returns.
    pub fn paths(&self, request: TraversalRequest) -> GraphResult<PathSet> {
        self.paths_async(request)?.join()
    }

    /// Runs an ingestion on the writer and waits for it.
    ///
    /// # Errors
    /// Queueing failures, plus everything [`Ingestor::ingest`] returns.
    pub fn ingest(&self, records: Vec<RawRecord>) -> GraphResult<IngestReport> {
        self.ingest_async(records)?.join()
    }

    /// The store both pools operate on.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn GraphStore> {
        self.services.ingestor.store()
    }

    #[cfg(test)]
    fn block(&self, path: ExecutionPath) -> GraphResult<(Receiver<()>, Sender<()>)> {
        let (started_tx, started_rx) = bounded::<()>(1);
        let (release_tx, release_rx) = bounded::<()>(1);
        self.pool(path)?.try_submit(Job::Block {
            started: started_tx,
            release: release_rx,
        })?;
        Ok((started_rx, release_tx))
    }
}

impl Drop for GraphRuntime {
    fn drop(&mut self) {
        if let Some(readers) = self.readers.take() {
            readers.shutdown();
        }
        if let Some(writer) = self.writer.take() {
            writer.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationship::MergePolicy;
    use crate::storage::InMemoryGraphStore;

    fn runtime(queue_capacity: usize) -> GraphRuntime {
        let store = Arc::new(InMemoryGraphStore::new(MergePolicy::Collapse));
        GraphRuntime::new(
            store,
            RuntimeConfig {
                reader_workers: 1,
                queue_capacity,
            },
            IngestConfig::default(),
            QueryLimits::default(),
        )
        .unwrap()
    }

    fn wing() -> Vec<RawRecord> {
        vec![RawRecord::triple("wing", "Component", "part_of", "aircraft", "System")]
    }

    #[test]
    fn reads_are_not_blocked_by_a_busy_writer() {
        let rt = runtime(16);
        rt.ingest(wing()).unwrap();

        let (started, release) = rt.block(ExecutionPath::Write).unwrap();
        started.recv_timeout(Duration::from_secs(1)).unwrap();

        let handle = rt.neighborhood_async(TraversalRequest::new("wing")).unwrap();
        assert_eq!(handle.path(), ExecutionPath::Read);
        let n = handle.join_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(n.edges.len(), 1);

        release.send(()).unwrap();
    }

    #[test]
    fn full_writer_queue_fails_fast() {
        let rt = runtime(1);
        let (started, release_first) = rt.block(ExecutionPath::Write).unwrap();
        started.recv_timeout(Duration::from_secs(1)).unwrap();
        let (_queued, release_second) = rt.block(ExecutionPath::Write).unwrap();

        let err = rt.ingest_async(wing()).err().unwrap();
        assert!(matches!(
            err,
            GraphError::Execution(ExecutionError::QueueFull { ref path, capacity: 1 }) if path == "write"
        ));
        assert!(err.is_retryable());

        release_first.send(()).unwrap();
        release_second.send(()).unwrap();
    }

    #[test]
    fn join_timeout_reports_timeout() {
        let rt = runtime(4);
        let (started, release) = rt.block(ExecutionPath::Write).unwrap();
        started.recv_timeout(Duration::from_secs(1)).unwrap();

        let handle = rt.ingest_async(wing()).unwrap();
        let err = handle.join_timeout(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(
            err,
            GraphError::Execution(ExecutionError::Timeout { duration_ms: 20 })
        ));

        release.send(()).unwrap();
    }

    #[test]
    fn join_reports_disconnected_when_reply_sender_dropped() {
        let (tx, rx) = bounded::<GraphResult<Neighborhood>>(1);
        drop(tx);

        let handle = ExecutionHandle {
            path: ExecutionPath::Read,
            rx,
        };
        let err = handle.join().unwrap_err();
        let GraphError::Execution(ExecutionError::Disconnected { path }) = err else {
            panic!("expected Disconnected, got {err:?}");
        };
        assert_eq!(path, "read");
    }

    #[test]
    fn drop_drains_queued_ingestion() {
        let store = Arc::new(InMemoryGraphStore::new(MergePolicy::Collapse));
        {
            let rt = GraphRuntime::new(
                store.clone(),
                RuntimeConfig::default(),
                IngestConfig::default(),
                QueryLimits::default(),
            )
            .unwrap();
            let _handle = rt.ingest_async(wing()).unwrap();
        }
        assert_eq!(store.summary().unwrap().relationships, 1);
    }
}
