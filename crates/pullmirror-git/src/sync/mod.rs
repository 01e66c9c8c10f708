//! Retry policy and per-mirror bookkeeping.

mod backoff;
mod state;

pub use backoff::PushBackoff;
pub use state::{MirrorState, MirrorStatus};
