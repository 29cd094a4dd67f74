use serde::{Deserialize, Serialize};

use crate::core::environment::Side;

/// Decides whether metadata cached under `previous` can still be trusted.
pub trait InvalidationKey {
    fn is_valid(&self, previous: &Self) -> bool;
}

/// Key for the game runtime source: any change of version, side or OS
/// changes the library set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeKey {
    pub game_version: String,
    pub side: Side,
    pub os: String,
}

impl InvalidationKey for RuntimeKey {
    fn is_valid(&self, previous: &Self) -> bool {
        self == previous
    }
}

/// Key for the loader source.
///
/// A previous resolution made without a pinned build is never reused: the
/// "latest" build it picked may have moved on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderKey {
    pub game_version: String,
    pub side: Side,
    pub pinned_loader_version: Option<String>,
}

impl InvalidationKey for LoaderKey {
    fn is_valid(&self, previous: &Self) -> bool {
        self == previous && previous.pinned_loader_version.is_some()
    }
}

/// The folder source caches nothing, so its key never invalidates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderKey {}

impl InvalidationKey for FolderKey {
    fn is_valid(&self, _previous: &Self) -> bool {
        true
    }
}

/// Tagged union of every shipped source's key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKey {
    Runtime(RuntimeKey),
    Loader(LoaderKey),
    Folder(FolderKey),
}

impl SourceKey {
    /// Keys of different sources never validate each other.
    pub fn is_valid(&self, previous: &SourceKey) -> bool {
        match (self, previous) {
            (SourceKey::Runtime(new), SourceKey::Runtime(old)) => new.is_valid(old),
            (SourceKey::Loader(new), SourceKey::Loader(old)) => new.is_valid(old),
            (SourceKey::Folder(new), SourceKey::Folder(old)) => new.is_valid(old),
            _ => false,
        }
    }

    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            SourceKey::Runtime(k) => serde_json::to_value(k),
            SourceKey::Loader(k) => serde_json::to_value(k),
            SourceKey::Folder(k) => serde_json::to_value(k),
        }
    }
}

/// Rebuilds a stored key from the persisted index.
pub type KeyDecoder = fn(serde_json::Value) -> serde_json::Result<SourceKey>;

#[cfg(test)]
mod tests {
    use super::*;

    fn loader(version: &str, pin: Option<&str>) -> LoaderKey {
        LoaderKey {
            game_version: version.into(),
            side: Side::Client,
            pinned_loader_version: pin.map(Into::into),
        }
    }

    #[test]
    fn runtime_key_requires_every_field_to_match() {
        let key = RuntimeKey {
            game_version: "1.20".into(),
            side: Side::Client,
            os: "linux".into(),
        };
        assert!(key.is_valid(&key.clone()));

        let mut other_os = key.clone();
        other_os.os = "windows".into();
        assert!(!key.is_valid(&other_os));

        let mut other_side = key.clone();
        other_side.side = Side::Server;
        assert!(!key.is_valid(&other_side));
    }

    #[test]
    fn loader_key_needs_a_previous_pin() {
        assert!(loader("1.20", Some("0.15.0")).is_valid(&loader("1.20", Some("0.15.0"))));
        assert!(!loader("1.20", None).is_valid(&loader("1.20", None)));
        assert!(!loader("1.20.1", Some("0.15.0")).is_valid(&loader("1.20", Some("0.15.0"))));
    }

    #[test]
    fn mismatched_variants_are_invalid() {
        let folder = SourceKey::Folder(FolderKey {});
        let loader = SourceKey::Loader(loader("1.20", Some("0.15.0")));
        assert!(folder.is_valid(&SourceKey::Folder(FolderKey {})));
        assert!(!folder.is_valid(&loader));
        assert!(!loader.is_valid(&folder));
    }
}
