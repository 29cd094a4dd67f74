use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::environment::Side;
use crate::core::error::{LauncherError, LauncherResult};

pub const CONFIG_FILE_NAME: &str = "launchpad.json";
pub const CURRENT_CONFIG_VERSION: u32 = 2;

/// Placeholder meaning "take the value from the launch arguments".
const CURRENT: &str = "current";

/// Resolution settings, persisted as JSON by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverConfig {
    #[serde(default = "current_config_version")]
    pub config_version: u32,
    /// Source ids, in order. Later sources override earlier ones' main class.
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,
    #[serde(default = "current_game_version")]
    pub game_version: String,
    #[serde(default, with = "side_or_current")]
    pub game_side: Option<Side>,
    /// Folder (relative to the game dir) scanned by the `folder` source.
    #[serde(default)]
    pub load_jars_from_folder: Option<String>,
    #[serde(default)]
    pub override_main_class: Option<String>,
    /// Written back automatically after the first loader resolution.
    #[serde(default)]
    pub pin_fabric_loader_version: Option<String>,
}

fn default_sources() -> Vec<String> {
    vec!["minecraft".to_string(), "fabric".to_string()]
}

fn current_config_version() -> u32 {
    CURRENT_CONFIG_VERSION
}

fn current_game_version() -> String {
    CURRENT.to_string()
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            config_version: CURRENT_CONFIG_VERSION,
            sources: default_sources(),
            game_version: current_game_version(),
            game_side: None,
            load_jars_from_folder: None,
            override_main_class: None,
            pin_fabric_loader_version: None,
        }
    }
}

impl ResolverConfig {
    /// `None` when the game version should come from the launch arguments.
    pub fn game_version_override(&self) -> Option<&str> {
        match self.game_version.as_str() {
            CURRENT | "" => None,
            v => Some(v),
        }
    }

    pub fn is_legacy(&self) -> bool {
        self.config_version < CURRENT_CONFIG_VERSION
    }
}

mod side_or_current {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::CURRENT;
    use crate::core::environment::Side;

    pub fn serialize<S: Serializer>(side: &Option<Side>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(side.map(|side| side.as_str()).unwrap_or(CURRENT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Side>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        Ok(match raw.as_deref() {
            None | Some(CURRENT) => None,
            Some(name) => Some(Side::parse(name)),
        })
    }
}

/// Where configuration changes made during resolution are written.
pub trait ConfigStore: Send + Sync {
    fn persist(&self, config: &ResolverConfig) -> LauncherResult<()>;
}

/// Discards writes; for callers that manage persistence themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullConfigStore;

impl ConfigStore for NullConfigStore {
    fn persist(&self, _config: &ResolverConfig) -> LauncherResult<()> {
        Ok(())
    }
}

/// Pretty-printed JSON file, by default `<gameDir>/config/launchpad.json`.
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn for_game_dir(game_dir: &Path) -> Self {
        Self::new(game_dir.join("config").join(CONFIG_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the config. A missing or legacy file is replaced with defaults
    /// and written back immediately.
    pub fn load(&self) -> LauncherResult<ResolverConfig> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = ResolverConfig::default();
                self.persist(&config)?;
                return Ok(config);
            }
            Err(e) => return Err(LauncherError::io(&self.path, e)),
        };

        let parse_error =
            |e: serde_json::Error| LauncherError::Config(format!("cannot parse {:?}: {}", self.path, e));
        let value: serde_json::Value = serde_json::from_str(&raw).map_err(parse_error)?;
        // Files written by the 1.x format carry an `autoconfig` block.
        let has_autoconfig = value.get("autoconfig").is_some();
        let loaded: ResolverConfig = serde_json::from_value(value).map_err(parse_error)?;

        if has_autoconfig || loaded.is_legacy() {
            info!("Legacy config file detected at {:?}, settings have been reset", self.path);
            let config = ResolverConfig::default();
            self.persist(&config)?;
            return Ok(config);
        }

        Ok(loaded)
    }
}

impl ConfigStore for JsonConfigStore {
    fn persist(&self, config: &ResolverConfig) -> LauncherResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.path, json).map_err(|e| LauncherError::io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConfigStore::for_game_dir(dir.path());
        let config = store.load().unwrap();
        assert_eq!(config, ResolverConfig::default());
        assert!(store.path().is_file());

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(written["gameSide"], "current");
        assert_eq!(written["sources"], serde_json::json!(["minecraft", "fabric"]));
    }

    #[test]
    fn legacy_file_is_reset() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConfigStore::for_game_dir(dir.path());
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(
            store.path(),
            r#"{"autoconfig": {"enable": true, "handler": "fabric"}, "overrideMainClass": "x.Y"}"#,
        )
        .unwrap();

        let config = store.load().unwrap();
        assert_eq!(config.override_main_class, None);
        assert_eq!(config.config_version, CURRENT_CONFIG_VERSION);
    }

    #[test]
    fn explicit_values_survive_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConfigStore::for_game_dir(dir.path());
        let config = ResolverConfig {
            sources: vec!["minecraft".into(), "fabric".into(), "folder".into()],
            game_version: "1.20".into(),
            game_side: Some(Side::Server),
            load_jars_from_folder: Some("jars".into()),
            pin_fabric_loader_version: Some("0.15.11".into()),
            ..ResolverConfig::default()
        };
        store.persist(&config).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.game_version_override(), Some("1.20"));
    }

    #[test]
    fn current_placeholders_mean_no_override() {
        let config: ResolverConfig =
            serde_json::from_str(r#"{"configVersion": 2, "gameVersion": "current", "gameSide": "current"}"#)
                .unwrap();
        assert_eq!(config.game_version_override(), None);
        assert_eq!(config.game_side, None);
        assert!(!config.is_legacy());
    }
}
