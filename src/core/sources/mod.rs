mod artifact;
mod context;
pub mod folder;
pub mod loader;
pub mod runtime;

pub use artifact::{
    temp_path_for, Artifact, AuthTokenCheck, PreDownloadCheck, ResolutionResult,
    AUTH_VALIDATE_URL,
};
pub use context::ResolutionContext;
pub use folder::FolderSource;
pub use loader::{LoaderSource, LOADER_META_BASE};
pub use runtime::{RuntimeSource, SERVER_MAIN_CLASS};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::cache::{CacheView, FolderKey, KeyDecoder, LoaderKey, RuntimeKey, SourceKey};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::FABRIC_MAVEN;
use crate::core::verify::HashVerifier;
use crate::core::version::VERSION_MANIFEST_URL;

pub const RUNTIME_SOURCE_ID: &str = "minecraft";
pub const LOADER_SOURCE_ID: &str = "fabric";
pub const FOLDER_SOURCE_ID: &str = "folder";

/// Remote base URLs used by the shipped sources.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub version_manifest: String,
    pub auth_validate: String,
    pub loader_meta: String,
    pub loader_maven: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            version_manifest: VERSION_MANIFEST_URL.to_string(),
            auth_validate: AUTH_VALIDATE_URL.to_string(),
            loader_meta: LOADER_META_BASE.to_string(),
            loader_maven: FABRIC_MAVEN.to_string(),
        }
    }
}

impl Endpoints {
    /// Every endpoint under one base URL, as served by a mock server.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            version_manifest: format!("{base}/mc/game/version_manifest_v2.json"),
            auth_validate: format!("{base}/validate"),
            loader_meta: format!("{base}/v2"),
            loader_maven: format!("{base}/maven"),
        }
    }
}

#[async_trait]
pub trait ArtifactSource: Send + Sync {
    fn id(&self) -> &'static str;

    /// Pure function of the context; decides whether cached metadata is reused.
    fn invalidation_key(&self, ctx: &ResolutionContext) -> LauncherResult<SourceKey>;

    async fn resolve(
        &self,
        cache: &mut CacheView<'_>,
        ctx: &mut ResolutionContext,
    ) -> LauncherResult<ResolutionResult>;
}

/// Dispatcher over the shipped sources, without Box<dyn>.
pub enum Source {
    Runtime(RuntimeSource),
    Loader(LoaderSource),
    Folder(FolderSource),
}

impl Source {
    pub fn from_id(id: &str, client: reqwest::Client, endpoints: &Endpoints) -> LauncherResult<Self> {
        match id {
            RUNTIME_SOURCE_ID => Ok(Self::Runtime(RuntimeSource::new(client, endpoints.clone()))),
            LOADER_SOURCE_ID => Ok(Self::Loader(LoaderSource::new(client, endpoints.clone()))),
            FOLDER_SOURCE_ID => Ok(Self::Folder(FolderSource)),
            other => Err(LauncherError::UnknownSource(other.to_string())),
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Source::Runtime(s) => s.id(),
            Source::Loader(s) => s.id(),
            Source::Folder(s) => s.id(),
        }
    }

    pub fn invalidation_key(&self, ctx: &ResolutionContext) -> LauncherResult<SourceKey> {
        match self {
            Source::Runtime(s) => s.invalidation_key(ctx),
            Source::Loader(s) => s.invalidation_key(ctx),
            Source::Folder(s) => s.invalidation_key(ctx),
        }
    }

    pub async fn resolve(
        &self,
        cache: &mut CacheView<'_>,
        ctx: &mut ResolutionContext,
    ) -> LauncherResult<ResolutionResult> {
        match self {
            Source::Runtime(s) => s.resolve(cache, ctx).await,
            Source::Loader(s) => s.resolve(cache, ctx).await,
            Source::Folder(s) => s.resolve(cache, ctx).await,
        }
    }
}

// ── Key registry ────────────────────────────────────────

fn decode_runtime_key(value: serde_json::Value) -> serde_json::Result<SourceKey> {
    serde_json::from_value::<RuntimeKey>(value).map(SourceKey::Runtime)
}

fn decode_loader_key(value: serde_json::Value) -> serde_json::Result<SourceKey> {
    serde_json::from_value::<LoaderKey>(value).map(SourceKey::Loader)
}

fn decode_folder_key(value: serde_json::Value) -> serde_json::Result<SourceKey> {
    serde_json::from_value::<FolderKey>(value).map(SourceKey::Folder)
}

/// Source id → decoder for its persisted invalidation key.
pub fn key_decoder(source_id: &str) -> Option<KeyDecoder> {
    match source_id {
        RUNTIME_SOURCE_ID => Some(decode_runtime_key as KeyDecoder),
        LOADER_SOURCE_ID => Some(decode_loader_key as KeyDecoder),
        FOLDER_SOURCE_ID => Some(decode_folder_key as KeyDecoder),
        _ => None,
    }
}

// ── Shared metadata shapes ──────────────────────────────

/// A library as stored in a source's cached metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct CachedLibrary {
    pub coordinate: String,
    pub url: String,
    pub sha1: String,
}

impl CachedLibrary {
    /// Turn into a downloadable artifact under the active storage layout.
    fn into_artifact(self, source_id: &str, ctx: &ResolutionContext) -> LauncherResult<Artifact> {
        let path = ctx
            .environment
            .storage
            .library_path(&self.coordinate)
            .map_err(|e| LauncherError::resolution(source_id, e.to_string()))?;
        let verifier = HashVerifier::sha1(&self.sha1, self.url.clone())?;
        Ok(Artifact::remote(
            self.url,
            path,
            Some(verifier),
            format!("library {}", self.coordinate),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::environment::Side;

    #[test]
    fn unknown_source_ids_are_rejected() {
        let client = reqwest::Client::new();
        let endpoints = Endpoints::default();
        assert_eq!(
            Source::from_id("fabric", client.clone(), &endpoints).unwrap().id(),
            LOADER_SOURCE_ID
        );
        assert!(matches!(
            Source::from_id("quilt", client, &endpoints),
            Err(LauncherError::UnknownSource(id)) if id == "quilt"
        ));
    }

    #[test]
    fn registry_decodes_each_shipped_key() {
        let runtime = SourceKey::Runtime(RuntimeKey {
            game_version: "1.20".into(),
            side: Side::Client,
            os: "linux".into(),
        });
        let decoded = key_decoder(RUNTIME_SOURCE_ID).unwrap()(runtime.to_value().unwrap()).unwrap();
        assert_eq!(decoded, runtime);

        let folder = SourceKey::Folder(FolderKey {});
        let decoded = key_decoder(FOLDER_SOURCE_ID).unwrap()(folder.to_value().unwrap()).unwrap();
        assert_eq!(decoded, folder);

        assert!(key_decoder("nope").is_none());
    }
}
