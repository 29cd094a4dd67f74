use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, Ordering};
use std::sync::OnceLock;

/// Lifecycle of one download task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    Running,
    Completed,
    Failed,
}

impl TaskState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => TaskState::Queued,
            1 => TaskState::Running,
            2 => TaskState::Completed,
            _ => TaskState::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

/// A consistent `(downloaded, expected_length)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub downloaded: u64,
    pub expected_length: u64,
}

/// Progress record shared between a worker and any observer.
#[derive(Debug)]
pub struct TaskStatus {
    url: String,
    downloaded: AtomicU64,
    /// `-1` while the length is unknown.
    expected_length: AtomicI64,
    state: AtomicU8,
    failure: OnceLock<String>,
}

impl TaskStatus {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            downloaded: AtomicU64::new(0),
            expected_length: AtomicI64::new(-1),
            state: AtomicU8::new(TaskState::Queued as u8),
            failure: OnceLock::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    /// Failure text, only once the task has actually failed.
    pub fn failure(&self) -> Option<&str> {
        match self.state() {
            TaskState::Failed => self.failure.get().map(String::as_str),
            _ => None,
        }
    }

    pub(crate) fn set_expected_length(&self, length: Option<u64>) {
        let raw = length.and_then(|l| i64::try_from(l).ok()).unwrap_or(-1);
        self.expected_length.store(raw, Ordering::Release);
    }

    pub(crate) fn add_downloaded(&self, bytes: u64) {
        self.downloaded.fetch_add(bytes, Ordering::AcqRel);
    }

    fn transition(&self, from: TaskState, to: TaskState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn mark_running(&self) -> bool {
        self.transition(TaskState::Queued, TaskState::Running)
    }

    pub(crate) fn mark_completed(&self) -> bool {
        self.transition(TaskState::Running, TaskState::Completed)
    }

    /// Moves any non-terminal task to `Failed`. Returns `false` if the task
    /// had already finished.
    pub(crate) fn mark_failed(&self, reason: impl Into<String>) -> bool {
        let _ = self.failure.set(reason.into());
        self.transition(TaskState::Queued, TaskState::Failed)
            || self.transition(TaskState::Running, TaskState::Failed)
    }

    /// While running, an unknown length reads as one byte more than what has
    /// arrived. Finished tasks report the bytes actually observed, so a
    /// failed partial download never looks complete.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let done = self.is_done();
        let downloaded = self.downloaded.load(Ordering::Acquire);
        let expected = self.expected_length.load(Ordering::Acquire);

        let expected_length = if done {
            downloaded
        } else if expected < 0 {
            downloaded + 1
        } else {
            (expected as u64).max(downloaded)
        };

        ProgressSnapshot {
            downloaded,
            expected_length,
        }
    }
}
