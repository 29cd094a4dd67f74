mod engine;
mod status;

pub use engine::{DownloadEngine, DEFAULT_CONCURRENCY};
pub use status::{ProgressSnapshot, TaskState, TaskStatus};
