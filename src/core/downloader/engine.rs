// ─── Download Engine ───
// Bounded concurrent downloads with per-task progress, integrity checks and
// cooperative shutdown. Completed tasks are handed back in finishing order.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::TryStreamExt;
use reqwest::Client;
use tokio::io::{AsyncRead, AsyncWriteExt, ReadBuf};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::status::TaskStatus;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http;
use crate::core::sources::Artifact;

pub const DEFAULT_CONCURRENCY: usize = 5;

/// Highest value reported before every task has been polled.
const PROGRESS_CEILING: f64 = 1.0 - f64::EPSILON;

struct Completion {
    url: String,
    result: LauncherResult<()>,
}

pub struct DownloadEngine {
    client: Client,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    tasks: Vec<Arc<TaskStatus>>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    polled: usize,
    /// Bits of the highest progress value reported so far.
    high_water: AtomicU64,
}

impl DownloadEngine {
    pub fn new(client: Client, concurrency: usize) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            client,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
            completions_tx,
            completions_rx,
            polled: 0,
            high_water: AtomicU64::new(0f64.to_bits()),
        }
    }

    /// Starts downloading `artifact` right away, subject to the concurrency bound.
    pub fn queue(&mut self, artifact: Artifact) -> LauncherResult<Arc<TaskStatus>> {
        let url = artifact
            .url
            .clone()
            .ok_or_else(|| LauncherError::MissingLocalArtifact(artifact.path.clone()))?;

        let status = Arc::new(TaskStatus::new(url.clone()));
        self.tasks.push(status.clone());

        let client = self.client.clone();
        let permits = self.permits.clone();
        let cancel = self.cancel.clone();
        let tx = self.completions_tx.clone();
        let worker_status = status.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(LauncherError::Interrupted { url: url.clone() }),
                result = run_task(&client, &permits, &artifact, &worker_status) => result,
            };

            match &result {
                Ok(()) => {
                    worker_status.mark_completed();
                }
                Err(e) => {
                    remove_if_present(&artifact.temp_path()).await;
                    remove_if_present(&artifact.path).await;
                    worker_status.mark_failed(e.to_string());
                }
            }
            // The receiver is gone once the engine is dropped.
            let _ = tx.send(Completion { url, result });
        });

        Ok(status)
    }

    /// Waits up to `timeout` (forever if `None`) for the next finished task.
    /// Returns its URL, or the failure it recorded.
    pub async fn poll_result(&mut self, timeout: Option<Duration>) -> LauncherResult<Option<String>> {
        if self.is_done() {
            return Ok(None);
        }

        let next = match timeout {
            Some(limit) => match tokio::time::timeout(limit, self.completions_rx.recv()).await {
                Ok(next) => next,
                Err(_) => return Ok(None),
            },
            None => self.completions_rx.recv().await,
        };

        let Some(completion) = next else {
            return Ok(None);
        };
        self.polled += 1;
        completion.result.map(|()| Some(completion.url))
    }

    /// True once every queued task has been returned by [`DownloadEngine::poll_result`].
    pub fn is_done(&self) -> bool {
        self.polled == self.tasks.len()
    }

    pub fn tasks(&self) -> &[Arc<TaskStatus>] {
        &self.tasks
    }

    /// Fraction of work done in `[0, 1]`. Never decreases, and reaches 1.0
    /// only when [`DownloadEngine::is_done`] holds.
    pub fn aggregate_progress(&self) -> f64 {
        if self.tasks.is_empty() {
            return 1.0;
        }
        let value = if self.is_done() {
            1.0
        } else {
            self.raw_progress().min(PROGRESS_CEILING)
        };
        // Non-negative floats order the same as their bit patterns.
        let previous = self.high_water.fetch_max(value.to_bits(), Ordering::AcqRel);
        f64::from_bits(previous.max(value.to_bits()))
    }

    fn raw_progress(&self) -> f64 {
        let total = self.tasks.len();
        if total == 0 {
            return 0.0;
        }

        let mut finished = 0usize;
        let mut downloaded = 0u64;
        let mut expected = 0u64;
        for task in &self.tasks {
            if task.is_done() {
                finished += 1;
                continue;
            }
            let snapshot = task.snapshot();
            downloaded += snapshot.downloaded;
            expected += snapshot.expected_length;
        }

        let in_flight = if expected == 0 {
            0.0
        } else {
            downloaded as f64 / expected as f64
        };
        ((finished as f64 + in_flight) / total as f64).clamp(0.0, 1.0)
    }

    /// Stops every worker and fails whatever hasn't finished. Safe to call
    /// more than once.
    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            info!("Shutting down download engine");
        }
        self.cancel.cancel();
        for task in &self.tasks {
            if task.mark_failed(format!("Download of {} was interrupted", task.url())) {
                debug!("Interrupted download of {}", task.url());
            }
        }
    }
}

impl Drop for DownloadEngine {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Worker ──────────────────────────────────────────────

async fn run_task(
    client: &Client,
    permits: &Semaphore,
    artifact: &Artifact,
    status: &Arc<TaskStatus>,
) -> LauncherResult<()> {
    let url = artifact.url.as_deref().unwrap_or_default();
    let _permit = permits
        .acquire()
        .await
        .map_err(|_| LauncherError::Interrupted { url: url.to_string() })?;
    if !status.mark_running() {
        return Err(LauncherError::Interrupted { url: url.to_string() });
    }

    if let Some(parent) = artifact.path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| LauncherError::io(parent, e))?;
    }

    let response = http::get_binary(client, url).await?;
    status.set_expected_length(response.content_length());

    let body = Box::pin(
        response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e)),
    );
    let reader = ProgressReader {
        inner: StreamReader::new(body),
        status: status.clone(),
    };

    let temp_path = artifact.temp_path();
    let mut file = tokio::fs::File::create(&temp_path)
        .await
        .map_err(|e| LauncherError::io(&temp_path, e))?;

    match &artifact.verifier {
        Some(verifier) => {
            let mut verifying = verifier.wrap(reader);
            tokio::io::copy(&mut verifying, &mut file)
                .await
                .map_err(|e| LauncherError::io(&temp_path, e))?;
            if let Err(e) = verifying.close() {
                warn!("Integrity check failed for {}: {}", url, e);
                return Err(e);
            }
        }
        None => {
            let mut reader = reader;
            tokio::io::copy(&mut reader, &mut file)
                .await
                .map_err(|e| LauncherError::io(&temp_path, e))?;
        }
    }

    file.flush()
        .await
        .map_err(|e| LauncherError::io(&temp_path, e))?;
    drop(file);

    tokio::fs::rename(&temp_path, &artifact.path)
        .await
        .map_err(|e| LauncherError::io(&artifact.path, e))?;
    debug!("Downloaded {} -> {:?}", url, artifact.path);
    Ok(())
}

async fn remove_if_present(path: &std::path::Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed {:?}", path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {:?}: {}", path, e),
    }
}

/// Counts bytes into the task's status as they are read.
struct ProgressReader<R> {
    inner: R,
    status: Arc<TaskStatus>,
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            this.status.add_downloaded((buf.filled().len() - before) as u64);
        }
        poll
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::core::downloader::TaskState;
    use crate::core::http::build_http_client;
    use crate::core::verify::HashVerifier;

    const HELLO_SHA1: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

    fn artifact(url: String, path: &Path, sha1: Option<&str>) -> Artifact {
        let verifier = sha1.map(|s| HashVerifier::sha1(s, url.clone()).unwrap());
        Artifact::remote(url, path.to_path_buf(), verifier, "test jar")
    }

    /// Accepts connections and never answers them.
    async fn silent_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{addr}")
    }

    async fn drain(engine: &mut DownloadEngine) -> Vec<LauncherResult<Option<String>>> {
        let mut results = Vec::new();
        while !engine.is_done() {
            let result = engine.poll_result(Some(Duration::from_secs(10))).await;
            if !matches!(result, Ok(None)) {
                results.push(result);
            }
        }
        results
    }

    #[tokio::test]
    async fn downloads_land_at_their_destination() {
        let mut server = mockito::Server::new_async().await;
        let _a = server.mock("GET", "/a.jar").with_body("hello").create_async().await;
        let _b = server.mock("GET", "/b.jar").with_body("world").create_async().await;
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("libs/a.jar");
        let b = dir.path().join("libs/nested/b.jar");

        let mut engine = DownloadEngine::new(build_http_client().unwrap(), DEFAULT_CONCURRENCY);
        engine.queue(artifact(format!("{}/a.jar", server.url()), &a, Some(HELLO_SHA1))).unwrap();
        engine.queue(artifact(format!("{}/b.jar", server.url()), &b, None)).unwrap();
        assert!(!engine.is_done());

        let results = drain(&mut engine).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_ok()));

        assert_eq!(std::fs::read_to_string(&a).unwrap(), "hello");
        assert_eq!(std::fs::read_to_string(&b).unwrap(), "world");
        assert!(!dir.path().join("libs/a.jar.tmp").exists());
        assert_eq!(engine.aggregate_progress(), 1.0);
        assert!(engine.tasks().iter().all(|t| t.state() == TaskState::Completed));
        assert_eq!(engine.tasks()[0].snapshot().downloaded, 5);
    }

    #[tokio::test]
    async fn corrupted_body_leaves_nothing_behind() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("GET", "/a.jar").with_body("hellp").create_async().await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.jar");

        let mut engine = DownloadEngine::new(build_http_client().unwrap(), DEFAULT_CONCURRENCY);
        engine.queue(artifact(format!("{}/a.jar", server.url()), &dest, Some(HELLO_SHA1))).unwrap();

        let results = drain(&mut engine).await;
        match &results[..] {
            [Err(LauncherError::HashMismatch { url, expected, .. })] => {
                assert!(url.ends_with("/a.jar"));
                assert_eq!(expected, HELLO_SHA1);
            }
            other => panic!("expected a hash mismatch, got {other:?}"),
        }
        assert!(!dest.exists());
        assert!(!dir.path().join("a.jar.tmp").exists());
        assert_eq!(engine.tasks()[0].state(), TaskState::Failed);
    }

    #[tokio::test]
    async fn http_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("GET", "/gone.jar").with_status(404).create_async().await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("gone.jar");

        let mut engine = DownloadEngine::new(build_http_client().unwrap(), DEFAULT_CONCURRENCY);
        engine.queue(artifact(format!("{}/gone.jar", server.url()), &dest, None)).unwrap();

        let results = drain(&mut engine).await;
        assert!(matches!(
            &results[..],
            [Err(LauncherError::DownloadFailed { status: 404, .. })]
        ));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn shutdown_fails_every_unfinished_task() {
        let base = silent_server().await;
        let dir = tempfile::tempdir().unwrap();

        let mut engine = DownloadEngine::new(build_http_client().unwrap(), 1);
        let running = engine
            .queue(artifact(format!("{base}/slow.jar"), &dir.path().join("slow.jar"), None))
            .unwrap();
        let waiting = engine
            .queue(artifact(format!("{base}/next.jar"), &dir.path().join("next.jar"), None))
            .unwrap();

        assert!(matches!(engine.poll_result(Some(Duration::from_millis(200))).await, Ok(None)));
        let before = engine.aggregate_progress();
        assert!(before < 1.0);

        engine.shutdown();
        engine.shutdown();
        assert_eq!(running.state(), TaskState::Failed);
        assert_eq!(waiting.state(), TaskState::Failed);
        assert!(running.failure().unwrap().contains("interrupted"));

        let results = drain(&mut engine).await;
        assert_eq!(results.len(), 2);
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(LauncherError::Interrupted { .. }))));
        assert!(engine.tasks().iter().all(|t| t.state() != TaskState::Completed));
        assert!(engine.aggregate_progress() >= before);
    }

    #[tokio::test]
    async fn progress_never_decreases_and_tops_out_when_done() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", mockito::Matcher::Regex("^/lib/.*\\.jar$".into()))
            .with_body("hello")
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();

        let mut engine = DownloadEngine::new(build_http_client().unwrap(), 2);
        assert!(engine.is_done());
        for i in 0..6 {
            let dest = dir.path().join(format!("lib{i}.jar"));
            engine
                .queue(artifact(format!("{}/lib/{i}.jar", server.url()), &dest, Some(HELLO_SHA1)))
                .unwrap();
        }

        let mut last = 0.0;
        while !engine.is_done() {
            let progress = engine.aggregate_progress();
            assert!(progress >= last);
            assert!(progress < 1.0);
            last = progress;
            engine.poll_result(Some(Duration::from_millis(50))).await.unwrap();
        }
        assert_eq!(engine.aggregate_progress(), 1.0);
    }
}
