// ─── Loader Source ───
// Resolves the Fabric loader, its intermediary mappings and the libraries
// listed in the loader's launcher metadata.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    ArtifactSource, CachedLibrary, Endpoints, ResolutionContext, ResolutionResult,
    LOADER_SOURCE_ID,
};
use crate::core::cache::{CacheView, LoaderKey, SourceKey};
use crate::core::environment::Side;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http;
use crate::core::maven::MavenArtifact;

pub const LOADER_META_BASE: &str = "https://meta.fabricmc.net/v2";

const METADATA_BLOB: &str = "fabric.json";

/// The server launcher already provides guava on the system classpath.
const SERVER_EXCLUDED_LIBRARY: &str = "com.google.guava:guava";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoaderBuild {
    loader: MavenRef,
    intermediary: MavenRef,
    launcher_meta: LauncherMeta,
}

#[derive(Debug, Deserialize)]
struct MavenRef {
    maven: String,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LauncherMeta {
    main_class: MainClass,
    #[serde(default)]
    libraries: LauncherLibraries,
}

/// Older loader builds publish one main class for both sides.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MainClass {
    PerSide { client: String, server: String },
    Shared(String),
}

impl MainClass {
    fn for_side(&self, side: Side) -> &str {
        match (self, side) {
            (MainClass::PerSide { client, .. }, Side::Client) => client,
            (MainClass::PerSide { server, .. }, Side::Server) => server,
            (MainClass::Shared(main_class), _) => main_class,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct LauncherLibraries {
    #[serde(default)]
    common: Vec<LibraryRef>,
    #[serde(default)]
    client: Vec<LibraryRef>,
    #[serde(default)]
    server: Vec<LibraryRef>,
}

#[derive(Debug, Clone, Deserialize)]
struct LibraryRef {
    name: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoaderMetadata {
    loader_version: Option<String>,
    main_class: String,
    libraries: Vec<CachedLibrary>,
}

pub struct LoaderSource {
    client: reqwest::Client,
    endpoints: Endpoints,
}

impl LoaderSource {
    pub fn new(client: reqwest::Client, endpoints: Endpoints) -> Self {
        Self { client, endpoints }
    }

    async fn fetch_build(&self, game_version: &str, pinned: Option<&str>) -> LauncherResult<LoaderBuild> {
        let base = self.endpoints.loader_meta.trim_end_matches('/');
        if let Some(pin) = pinned {
            let url = format!("{base}/versions/loader/{game_version}/{pin}");
            return http::get_json(&self.client, &url).await;
        }

        let url = format!("{base}/versions/loader/{game_version}");
        let builds: Vec<LoaderBuild> = http::get_json(&self.client, &url).await?;
        builds.into_iter().next().ok_or_else(|| {
            LauncherError::resolution(
                LOADER_SOURCE_ID,
                format!("no Fabric versions available for {game_version}"),
            )
        })
    }

    async fn fetch_metadata(
        &self,
        game_version: &str,
        side: Side,
        pinned: Option<&str>,
    ) -> LauncherResult<LoaderMetadata> {
        let build = self.fetch_build(game_version, pinned).await?;
        let default_repo = self.endpoints.loader_maven.as_str();

        let mut wanted = vec![
            LibraryRef {
                name: build.loader.maven.clone(),
                url: None,
            },
            LibraryRef {
                name: build.intermediary.maven.clone(),
                url: None,
            },
        ];
        let libs = &build.launcher_meta.libraries;
        wanted.extend(libs.common.iter().cloned());
        let side_libs = match side {
            Side::Client => &libs.client,
            Side::Server => &libs.server,
        };
        wanted.extend(
            side_libs
                .iter()
                .filter(|lib| !(side == Side::Server && lib.name.contains(SERVER_EXCLUDED_LIBRARY)))
                .cloned(),
        );

        let libraries: Vec<CachedLibrary> = stream::iter(wanted)
            .map(|lib| async move {
                let artifact = MavenArtifact::parse(&lib.name)
                    .map_err(|e| LauncherError::resolution(LOADER_SOURCE_ID, e.to_string()))?;
                let url = artifact.url(lib.url.as_deref().unwrap_or(default_repo));
                let sha1 = http::get_sha1_digest(&self.client, &url).await?;
                Ok::<_, LauncherError>(CachedLibrary {
                    coordinate: lib.name,
                    url,
                    sha1,
                })
            })
            .buffered(8)
            .try_collect()
            .await?;

        info!(
            "Resolved Fabric loader {} for {} {} with {} jars",
            build.loader.version.as_deref().unwrap_or("?"),
            side,
            game_version,
            libraries.len()
        );

        Ok(LoaderMetadata {
            loader_version: build.loader.version,
            main_class: build.launcher_meta.main_class.for_side(side).to_string(),
            libraries,
        })
    }
}

#[async_trait]
impl ArtifactSource for LoaderSource {
    fn id(&self) -> &'static str {
        LOADER_SOURCE_ID
    }

    fn invalidation_key(&self, ctx: &ResolutionContext) -> LauncherResult<SourceKey> {
        Ok(SourceKey::Loader(LoaderKey {
            game_version: ctx.loading_version()?,
            side: ctx.loading_side(),
            pinned_loader_version: ctx.config.pin_fabric_loader_version.clone(),
        }))
    }

    async fn resolve(
        &self,
        cache: &mut CacheView<'_>,
        ctx: &mut ResolutionContext,
    ) -> LauncherResult<ResolutionResult> {
        let version = ctx.loading_version()?;
        let side = ctx.loading_side();
        let pinned = ctx.config.pin_fabric_loader_version.clone();

        let meta: LoaderMetadata = cache
            .get_object(METADATA_BLOB, || {
                self.fetch_metadata(&version, side, pinned.as_deref())
            })
            .await?;

        let artifacts = meta
            .libraries
            .into_iter()
            .map(|lib| lib.into_artifact(LOADER_SOURCE_ID, ctx))
            .collect::<LauncherResult<Vec<_>>>()?;

        if pinned.is_none() {
            if let Some(chosen) = &meta.loader_version {
                info!("Pinning Fabric loader version {}", chosen);
                ctx.config.pin_fabric_loader_version = Some(chosen.clone());
                ctx.persist_config()?;
            }
        }
        cache.complete_update().await?;

        Ok(ResolutionResult {
            artifacts,
            main_class: Some(meta.main_class),
        })
    }
}
