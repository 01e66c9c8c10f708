//! The mirroring runtime: registry, worker pool and server lifecycle.

mod manager;
mod queue;
mod server;
mod task;

pub use manager::{Registry, RepositoryManager};
pub use queue::{QueueClosed, TaskQueue, TaskSender};
pub use server::{MirrorServer, ServerStatus};
pub use task::{Task, UPDATE_ALL_ID};
