use async_trait::async_trait;
use tracing::debug;
use walkdir::WalkDir;

use super::{Artifact, ArtifactSource, ResolutionContext, ResolutionResult, FOLDER_SOURCE_ID};
use crate::core::cache::{CacheView, FolderKey, SourceKey};
use crate::core::error::{LauncherError, LauncherResult};

const JAR_EXTENSION: &str = "jar";

/// Picks up every jar under a configured folder of the game directory.
#[derive(Debug, Default)]
pub struct FolderSource;

#[async_trait]
impl ArtifactSource for FolderSource {
    fn id(&self) -> &'static str {
        FOLDER_SOURCE_ID
    }

    fn invalidation_key(&self, _ctx: &ResolutionContext) -> LauncherResult<SourceKey> {
        Ok(SourceKey::Folder(FolderKey {}))
    }

    async fn resolve(
        &self,
        _cache: &mut CacheView<'_>,
        ctx: &mut ResolutionContext,
    ) -> LauncherResult<ResolutionResult> {
        let folder = ctx.config.load_jars_from_folder.as_deref().ok_or_else(|| {
            LauncherError::Config("the folder source requires loadJarsFromFolder to be set".into())
        })?;
        let root = ctx.environment.game_dir.join(folder);

        let mut artifacts = Vec::new();
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root.as_path()).to_path_buf();
                match e.into_io_error() {
                    Some(io) => LauncherError::io(path, io),
                    None => LauncherError::resolution(FOLDER_SOURCE_ID, "filesystem loop detected"),
                }
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            if path.extension().and_then(|e| e.to_str()) != Some(JAR_EXTENSION) {
                continue;
            }
            debug!("Found JAR {:?}", path);
            let friendly_name = format!("File {}", path.display());
            artifacts.push(Artifact::local(path, friendly_name));
        }

        Ok(ResolutionResult {
            artifacts,
            main_class: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::cache::MetadataCache;
    use crate::core::config::{LaunchArguments, NullConfigStore, ResolverConfig};
    use crate::core::environment::Environment;
    use crate::core::sources::key_decoder;

    async fn resolve_in(dir: &std::path::Path, folder: Option<&str>) -> LauncherResult<ResolutionResult> {
        let config = ResolverConfig {
            load_jars_from_folder: folder.map(Into::into),
            ..ResolverConfig::default()
        };
        let mut ctx = ResolutionContext::new(
            config,
            Environment::discover(dir).unwrap(),
            LaunchArguments::parse(Vec::<String>::new()),
            Arc::new(NullConfigStore),
        )
        .unwrap();
        let mut cache = MetadataCache::load(&dir.join("cache"), key_decoder).await.unwrap();
        let key = FolderSource.invalidation_key(&ctx).unwrap();
        FolderSource.resolve(&mut cache.view(FOLDER_SOURCE_ID, key), &mut ctx).await
    }

    #[tokio::test]
    async fn only_jar_files_are_collected() {
        let dir = tempfile::tempdir().unwrap();
        let jars = dir.path().join("jars");
        std::fs::create_dir_all(jars.join("nested")).unwrap();
        std::fs::write(jars.join("b.jar"), b"b").unwrap();
        std::fs::write(jars.join("a.jar"), b"a").unwrap();
        std::fs::write(jars.join("notes.txt"), b"n").unwrap();

        let result = resolve_in(dir.path(), Some("jars")).await.unwrap();
        let names: Vec<_> = result
            .artifacts
            .iter()
            .map(|a| a.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.jar", "b.jar"]);
        assert!(result.artifacts.iter().all(|a| a.url.is_none()));
        assert!(result.main_class.is_none());
    }

    #[tokio::test]
    async fn nested_jars_are_found() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("jars/deep/er");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("c.jar"), b"c").unwrap();

        let result = resolve_in(dir.path(), Some("jars")).await.unwrap();
        assert_eq!(result.artifacts.len(), 1);
        assert_eq!(result.artifacts[0].path, nested.join("c.jar"));
    }

    #[tokio::test]
    async fn unset_folder_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_in(dir.path(), None).await.unwrap_err();
        assert!(matches!(err, LauncherError::Config(_)));
    }

    #[tokio::test]
    async fn missing_folder_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_in(dir.path(), Some("absent")).await.unwrap_err();
        assert!(matches!(err, LauncherError::Io { .. }));
    }
}
