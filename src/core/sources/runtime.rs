// ─── Runtime Source ───
// Resolves the game jar for one version and side, plus the libraries its
// version document lists for the current OS.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    Artifact, ArtifactSource, AuthTokenCheck, CachedLibrary, Endpoints, ResolutionContext,
    ResolutionResult, RUNTIME_SOURCE_ID,
};
use crate::core::cache::{CacheView, RuntimeKey, SourceKey};
use crate::core::environment::Side;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http;
use crate::core::verify::HashVerifier;
use crate::core::version::{LibraryEntry, VersionJson, VersionManifest};

pub const SERVER_MAIN_CLASS: &str = "net.minecraft.server.Main";

const METADATA_BLOB: &str = "minecraft.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameJar {
    version: String,
    side: Side,
    url: String,
    sha1: String,
}

/// What gets cached between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuntimeMetadata {
    game_jar: GameJar,
    main_class_client: String,
    libraries: Vec<CachedLibrary>,
}

pub struct RuntimeSource {
    client: reqwest::Client,
    endpoints: Endpoints,
}

impl RuntimeSource {
    pub fn new(client: reqwest::Client, endpoints: Endpoints) -> Self {
        Self { client, endpoints }
    }

    async fn fetch_metadata(&self, version: &str, side: Side, os: &str) -> LauncherResult<RuntimeMetadata> {
        let manifest = VersionManifest::fetch(&self.client, &self.endpoints.version_manifest).await?;
        if manifest.versions.is_empty() {
            return Err(LauncherError::resolution(RUNTIME_SOURCE_ID, "version manifest is empty"));
        }
        let entry = manifest.find_version(version).ok_or_else(|| {
            LauncherError::resolution(
                RUNTIME_SOURCE_ID,
                format!("invalid Minecraft version {version}, not found in manifest"),
            )
        })?;

        let version_json: VersionJson = http::get_json(&self.client, &entry.url).await?;
        let download = version_json
            .downloads
            .as_ref()
            .and_then(|d| d.for_side(side))
            .ok_or_else(|| {
                LauncherError::resolution(
                    RUNTIME_SOURCE_ID,
                    format!("version {version} has no {side} download"),
                )
            })?;

        let mut libraries = Vec::with_capacity(version_json.libraries.len());
        for lib in &version_json.libraries {
            if !lib.is_allowed_for_os(os) {
                debug!("Skipping library {} (not allowed on {})", lib.name, os);
                continue;
            }
            if let Some(library) = library_for_os(lib, os)? {
                libraries.push(library);
            }
        }

        info!(
            "Resolved Minecraft {} {} with {} libraries",
            side,
            version,
            libraries.len()
        );

        Ok(RuntimeMetadata {
            game_jar: GameJar {
                version: version.to_string(),
                side,
                url: download.url.clone(),
                sha1: download.sha1.clone(),
            },
            main_class_client: version_json.main_class,
            libraries,
        })
    }
}

/// Picks the jar to fetch for a library entry. Native libraries use the
/// classifier for `os`, and are skipped when `os` has none.
fn library_for_os(lib: &LibraryEntry, os: &str) -> LauncherResult<Option<CachedLibrary>> {
    let missing = |what: &str| {
        LauncherError::resolution(RUNTIME_SOURCE_ID, format!("library {} has no {what}", lib.name))
    };
    let downloads = lib.downloads.as_ref().ok_or_else(|| missing("downloads"))?;

    if lib.natives.is_some() {
        let Some(classifier) = lib.native_classifier_for_os(os) else {
            debug!("Skipping natives {} (none for {})", lib.name, os);
            return Ok(None);
        };
        let native = downloads
            .classifiers
            .as_ref()
            .and_then(|c| c.get(&classifier))
            .ok_or_else(|| missing(&format!("natives for classifier {classifier}")))?;
        return Ok(Some(CachedLibrary {
            coordinate: format!("{}:{}", lib.name, classifier),
            url: native.url.clone(),
            sha1: native.sha1.clone(),
        }));
    }

    let artifact = downloads.artifact.as_ref().ok_or_else(|| missing("artifact download"))?;
    Ok(Some(CachedLibrary {
        coordinate: lib.name.clone(),
        url: artifact.url.clone(),
        sha1: artifact.sha1.clone(),
    }))
}

#[async_trait]
impl ArtifactSource for RuntimeSource {
    fn id(&self) -> &'static str {
        RUNTIME_SOURCE_ID
    }

    fn invalidation_key(&self, ctx: &ResolutionContext) -> LauncherResult<SourceKey> {
        Ok(SourceKey::Runtime(RuntimeKey {
            game_version: ctx.loading_version()?,
            side: ctx.loading_side(),
            os: ctx.environment.os.clone(),
        }))
    }

    async fn resolve(
        &self,
        cache: &mut CacheView<'_>,
        ctx: &mut ResolutionContext,
    ) -> LauncherResult<ResolutionResult> {
        let version = ctx.loading_version()?;
        let side = ctx.loading_side();
        let os = ctx.environment.os.clone();

        let meta: RuntimeMetadata = cache
            .get_object(METADATA_BLOB, || self.fetch_metadata(&version, side, &os))
            .await?;

        let jar = &meta.game_jar;
        let friendly_name = format!("Minecraft {} {}", jar.side, jar.version);
        let mut game_jar = Artifact::remote(
            jar.url.clone(),
            ctx.environment.storage.game_artifact_path(&jar.version, jar.side)?,
            Some(HashVerifier::sha1(&jar.sha1, jar.url.clone())?),
            friendly_name.clone(),
        );
        if side == Side::Client {
            game_jar = game_jar.with_gate(Arc::new(AuthTokenCheck::new(
                self.client.clone(),
                self.endpoints.auth_validate.clone(),
                ctx.arguments.access_token.clone(),
                friendly_name,
            )));
        }

        let mut artifacts = vec![game_jar];
        for lib in meta.libraries {
            artifacts.push(lib.into_artifact(RUNTIME_SOURCE_ID, ctx)?);
        }

        let main_class = match side {
            Side::Server => SERVER_MAIN_CLASS.to_string(),
            Side::Client => meta.main_class_client,
        };

        // Only a document that produced a full artifact list is committed.
        cache.complete_update().await?;
        Ok(ResolutionResult {
            artifacts,
            main_class: Some(main_class),
        })
    }
}
