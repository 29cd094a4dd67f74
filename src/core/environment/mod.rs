mod os;
mod side;
mod storage;

use std::path::{Path, PathBuf};

pub use os::{current_arch_bits, current_os_name};
pub use side::Side;
pub use storage::{
    FallbackLayout, InstallLayout, JarStorageLocation, LayoutProbe, StorageLocator,
    VanillaLayout, LAYOUT_PRIORITY, LOCAL_DIR_NAME,
};

use crate::core::error::LauncherResult;

/// What was discovered about the host: storage layout, game dir and OS.
#[derive(Debug)]
pub struct Environment {
    pub storage: StorageLocator,
    pub game_dir: PathBuf,
    /// Mojang OS name (`windows`, `osx`, `linux`).
    pub os: String,
}

impl Environment {
    pub fn discover(game_dir: &Path) -> LauncherResult<Self> {
        Ok(Self {
            storage: StorageLocator::discover(game_dir)?,
            game_dir: game_dir.to_path_buf(),
            os: current_os_name().to_string(),
        })
    }

    /// Same as [`Environment::discover`] with an explicit OS name.
    pub fn with_os(game_dir: &Path, os: &str) -> LauncherResult<Self> {
        let mut env = Self::discover(game_dir)?;
        env.os = os.to_string();
        Ok(env)
    }

    /// Root for this crate's own state (cache, fallback storage).
    pub fn local_dir(&self) -> PathBuf {
        self.game_dir.join(LOCAL_DIR_NAME)
    }
}
