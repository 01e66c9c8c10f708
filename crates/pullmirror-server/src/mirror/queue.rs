//! Bounded task queue drained by a fixed pool of workers.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// The queue no longer accepts tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("task queue is closed")]
pub struct QueueClosed;

type Slot<T> = (T, OwnedSemaphorePermit);

/// Producer side of a [`TaskQueue`].
///
/// A slot is held from [`enqueue`](Self::enqueue) until a worker has finished
/// the task, so at most `concurrency` tasks are queued or running at once and
/// further producers wait.
pub struct TaskSender<T> {
    tx: mpsc::Sender<Slot<T>>,
    slots: Arc<Semaphore>,
}

impl<T> Clone for TaskSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<T: Send + 'static> TaskSender<T> {
    /// Enqueues `task`, waiting for a free slot.
    pub async fn enqueue(&self, task: T) -> Result<(), QueueClosed> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| QueueClosed)?;
        self.tx
            .send((task, permit))
            .await
            .map_err(|_| QueueClosed)
    }
}

/// A fixed pool of workers consuming tasks in FIFO order.
pub struct TaskQueue<T> {
    sender: TaskSender<T>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> TaskQueue<T> {
    /// Spawns `concurrency` workers running `handler` for every task.
    pub fn start<H, Fut>(concurrency: usize, handler: H) -> Self
    where
        H: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let concurrency = concurrency.max(1);
        let (tx, rx) = mpsc::channel::<Slot<T>>(concurrency);
        let rx = Arc::new(Mutex::new(rx));
        let handler = Arc::new(handler);

        let workers = (0..concurrency)
            .map(|id| {
                let rx = Arc::clone(&rx);
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    debug!(worker = id, "worker started");
                    loop {
                        let next = rx.lock().await.recv().await;
                        let Some((task, permit)) = next else {
                            break;
                        };
                        handler(task).await;
                        drop(permit);
                    }
                    debug!(worker = id, "worker stopped");
                })
            })
            .collect();

        Self {
            sender: TaskSender {
                tx,
                slots: Arc::new(Semaphore::new(concurrency)),
            },
            workers,
        }
    }

    /// Returns a producer handle.
    pub fn sender(&self) -> TaskSender<T> {
        self.sender.clone()
    }

    /// Stops accepting tasks and waits for the workers to drain the queue.
    ///
    /// Workers exit once every [`TaskSender`] is dropped and the queue is
    /// empty.
    pub async fn close(self) {
        drop(self.sender);
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!("worker terminated abnormally: {e}");
            }
        }
    }
}
