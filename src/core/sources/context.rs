use std::sync::Arc;

use crate::core::config::{ConfigStore, LaunchArguments, ResolverConfig};
use crate::core::environment::{Environment, Side};
use crate::core::error::{LauncherError, LauncherResult};

/// Everything a source may consult while resolving.
pub struct ResolutionContext {
    pub config: ResolverConfig,
    pub environment: Environment,
    pub arguments: LaunchArguments,
    config_store: Arc<dyn ConfigStore>,
}

impl ResolutionContext {
    /// Builds the context and makes sure the storage layout can host the
    /// side being loaded.
    pub fn new(
        config: ResolverConfig,
        mut environment: Environment,
        arguments: LaunchArguments,
        config_store: Arc<dyn ConfigStore>,
    ) -> LauncherResult<Self> {
        let side = config.game_side.unwrap_or(arguments.inferred_side);
        environment.storage.update_for_side(side)?;
        Ok(Self {
            config,
            environment,
            arguments,
            config_store,
        })
    }

    /// Configured side, or the one inferred from the launch target.
    pub fn loading_side(&self) -> Side {
        self.config.game_side.unwrap_or(self.arguments.inferred_side)
    }

    /// Configured game version, or the one passed on the command line.
    pub fn loading_version(&self) -> LauncherResult<String> {
        self.config
            .game_version_override()
            .or(self.arguments.game_version.as_deref())
            .map(str::to_string)
            .ok_or_else(|| {
                LauncherError::Config(
                    "no game version configured and none passed via --fml.mcVersion".into(),
                )
            })
    }

    /// Write the current config through the caller's store.
    pub fn persist_config(&self) -> LauncherResult<()> {
        self.config_store.persist(&self.config)
    }
}
