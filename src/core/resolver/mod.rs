// ─── Resolver ───
// Runs every configured source, checks what's already on disk, downloads the
// rest and hands back the classpath entries plus the entry point.

mod progress;

pub use progress::{LogProgressSink, ProgressSink};

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;
use tracing::{error, info, warn};

use crate::core::cache::{MetadataCache, CACHE_DIR_NAME};
use crate::core::downloader::{DownloadEngine, DEFAULT_CONCURRENCY};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::sources::{self, Artifact, Endpoints, ResolutionContext, ResolutionResult, Source};

pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Final output handed to the launch step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLaunch {
    /// Every artifact's local path, in source order.
    pub paths: Vec<PathBuf>,
    pub main_class: String,
}

/// Outcome of the local pass: every path, and what still has to be fetched.
#[derive(Debug, Default)]
pub struct Reconciliation {
    pub paths: Vec<PathBuf>,
    pub pending: Vec<Artifact>,
}

pub struct Resolver {
    client: Client,
    endpoints: Endpoints,
    concurrency: usize,
    poll_interval: Duration,
}

impl Resolver {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            endpoints: Endpoints::default(),
            concurrency: DEFAULT_CONCURRENCY,
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Full pipeline: metadata, local pass, downloads.
    pub async fn resolve(
        &self,
        ctx: &mut ResolutionContext,
        sink: &mut dyn ProgressSink,
    ) -> LauncherResult<ResolvedLaunch> {
        let results = self.process_metadata(ctx).await?;
        let main_class = select_main_class(ctx.config.override_main_class.as_deref(), &results)?;

        let Reconciliation { paths, pending } = self.reconcile(&results).await?;
        self.download(pending, sink).await?;

        info!("Resolved {} jars, main class {}", paths.len(), main_class);
        Ok(ResolvedLaunch { paths, main_class })
    }

    /// Resolve each configured source in order against the metadata cache.
    pub async fn process_metadata(
        &self,
        ctx: &mut ResolutionContext,
    ) -> LauncherResult<Vec<ResolutionResult>> {
        let cache_root = ctx.environment.local_dir().join(CACHE_DIR_NAME);
        let mut cache = MetadataCache::load(&cache_root, sources::key_decoder).await?;

        let source_ids = ctx.config.sources.clone();
        let mut results = Vec::with_capacity(source_ids.len());
        for id in &source_ids {
            let source = Source::from_id(id, self.client.clone(), &self.endpoints)?;
            let key = source.invalidation_key(ctx)?;
            info!("Resolving jars from source {}", id);
            let mut view = cache.view(id, key);
            results.push(source.resolve(&mut view, ctx).await?);
        }
        Ok(results)
    }

    /// Check every artifact against the disk, then run the gates of the ones
    /// that need downloading. No network traffic happens before all local
    /// checks pass.
    pub async fn reconcile(&self, results: &[ResolutionResult]) -> LauncherResult<Reconciliation> {
        let mut reconciliation = Reconciliation::default();

        for artifact in results.iter().flat_map(|r| r.artifacts.iter()) {
            reconciliation.paths.push(artifact.path.clone());
            if !needs_download(artifact).await? {
                info!("Found JAR: {:?}", artifact.path);
                continue;
            }
            reconciliation.pending.push(artifact.clone());
        }

        for artifact in &reconciliation.pending {
            if let Some(gate) = &artifact.gate {
                gate.check().await?;
            }
            info!("Queueing download: {}", artifact.friendly_name);
        }

        Ok(reconciliation)
    }

    /// Download `pending` and wait for all of it. Any failure stops the
    /// remaining downloads.
    pub async fn download(
        &self,
        pending: Vec<Artifact>,
        sink: &mut dyn ProgressSink,
    ) -> LauncherResult<()> {
        if pending.is_empty() {
            sink.report_complete();
            return Ok(());
        }

        let mut engine = DownloadEngine::new(self.client.clone(), self.concurrency);
        for artifact in pending {
            engine.queue(artifact)?;
        }

        while !engine.is_done() {
            if sink.close_requested() {
                warn!("Download window closed! Shutting down...");
                engine.shutdown();
                return Err(LauncherError::Cancelled);
            }
            sink.report_progress(engine.aggregate_progress());

            match engine.poll_result(Some(self.poll_interval)).await {
                Ok(Some(url)) => info!("Downloaded successfully: {}", url),
                Ok(None) => {}
                Err(e) => {
                    engine.shutdown();
                    if let LauncherError::HashMismatch { url, expected, actual } = &e {
                        error!(
                            "Hash mismatch for {}: expected {} but found {}. Is your internet connection working?",
                            url, expected, actual
                        );
                    }
                    return Err(e);
                }
            }
        }

        engine.shutdown();
        sink.report_progress(engine.aggregate_progress());
        sink.report_complete();
        Ok(())
    }
}

/// Decides whether an artifact has to be fetched.
///
/// A leftover `.tmp` sidecar means a previous download may not have finished
/// cleanly. With a verifier the existing file is re-hashed; without one it is
/// fetched again.
async fn needs_download(artifact: &Artifact) -> LauncherResult<bool> {
    let exists = tokio::fs::try_exists(&artifact.path)
        .await
        .map_err(|e| LauncherError::io(&artifact.path, e))?;

    if !exists {
        return match artifact.url {
            Some(_) => Ok(true),
            None => Err(LauncherError::MissingLocalArtifact(artifact.path.clone())),
        };
    }
    if artifact.url.is_none() {
        return Ok(false);
    }

    let temp_path = artifact.temp_path();
    let has_sidecar = tokio::fs::try_exists(&temp_path)
        .await
        .map_err(|e| LauncherError::io(&temp_path, e))?;
    if !has_sidecar {
        return Ok(false);
    }

    let Some(verifier) = &artifact.verifier else {
        info!("Found leftover {:?} with nothing to verify against, downloading again", temp_path);
        return Ok(true);
    };
    match verifier.verify_file(&artifact.path).await {
        Ok(()) => {
            tokio::fs::remove_file(&temp_path)
                .await
                .map_err(|e| LauncherError::io(&temp_path, e))?;
            Ok(false)
        }
        Err(e) => {
            warn!("Existing {:?} failed verification ({}), downloading again", artifact.path, e);
            Ok(true)
        }
    }
}

/// Configured override first, then the last source that named one.
fn select_main_class(
    override_main_class: Option<&str>,
    results: &[ResolutionResult],
) -> LauncherResult<String> {
    if let Some(main_class) = override_main_class {
        return Ok(main_class.to_string());
    }
    results
        .iter()
        .rev()
        .find_map(|r| r.main_class.clone())
        .ok_or(LauncherError::MissingEntryPoint)
}
