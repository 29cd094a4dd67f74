// ─── Storage Layouts ───
// Decides where libraries and game jars live on disk. Several hosting
// layouts are probed in a fixed order and the first one that matches wins.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::info;

use super::side::Side;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::MavenArtifact;

/// Directory (under the game dir) owned by this crate.
pub const LOCAL_DIR_NAME: &str = ".launchpad";

/// One filesystem layout that can host libraries and game jars.
pub trait JarStorageLocation: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn libraries_dir(&self) -> &Path;

    /// Maps `group:artifact:version[:classifier]` to a path under the libraries root.
    fn library_path(&self, coord: &str) -> LauncherResult<PathBuf> {
        let artifact = MavenArtifact::parse(coord)?;
        Ok(self.libraries_dir().join(artifact.local_path()))
    }

    fn game_artifact_path(&self, version: &str, side: Side) -> LauncherResult<PathBuf>;

    fn compatible_with_side(&self, side: Side) -> bool;
}

/// Returns `Ok(None)` when the layout's marker directories are absent.
pub type LayoutProbe = fn(&Path) -> LauncherResult<Option<Box<dyn JarStorageLocation>>>;

/// Probe order. The fallback layout always matches, so it must stay last.
pub const LAYOUT_PRIORITY: [LayoutProbe; 3] = [
    InstallLayout::probe,
    VanillaLayout::probe,
    FallbackLayout::probe,
];

fn client_only_jar(
    layout: &'static str,
    versions_dir: &Path,
    version: &str,
    side: Side,
) -> LauncherResult<PathBuf> {
    if side != Side::Client {
        return Err(LauncherError::UnsupportedSide {
            layout,
            side: side.to_string(),
        });
    }
    Ok(versions_dir.join(version).join(format!("{}.jar", version)))
}

// ── Install layout ──────────────────────────────────────
// Third-party launchers that keep instances two levels below a shared
// `Install` directory holding `versions/` and `libraries/`.

#[derive(Debug)]
pub struct InstallLayout {
    versions_dir: PathBuf,
    libraries_dir: PathBuf,
}

impl InstallLayout {
    pub fn probe(game_dir: &Path) -> LauncherResult<Option<Box<dyn JarStorageLocation>>> {
        let install_dir = game_dir.join("..").join("..").join("Install");
        let versions_dir = install_dir.join("versions");
        let libraries_dir = install_dir.join("libraries");
        if !versions_dir.is_dir() || !libraries_dir.is_dir() {
            return Ok(None);
        }
        Ok(Some(Box::new(Self {
            versions_dir,
            libraries_dir,
        })))
    }
}

impl JarStorageLocation for InstallLayout {
    fn name(&self) -> &'static str {
        "install"
    }

    fn libraries_dir(&self) -> &Path {
        &self.libraries_dir
    }

    fn game_artifact_path(&self, version: &str, side: Side) -> LauncherResult<PathBuf> {
        client_only_jar(self.name(), &self.versions_dir, version, side)
    }

    fn compatible_with_side(&self, side: Side) -> bool {
        side == Side::Client
    }
}

// ── Vanilla layout ──────────────────────────────────────

#[derive(Debug)]
pub struct VanillaLayout {
    versions_dir: PathBuf,
    libraries_dir: PathBuf,
}

impl VanillaLayout {
    pub fn probe(game_dir: &Path) -> LauncherResult<Option<Box<dyn JarStorageLocation>>> {
        let versions_dir = game_dir.join("versions");
        let libraries_dir = game_dir.join("libraries");
        if !versions_dir.is_dir() || !libraries_dir.is_dir() {
            return Ok(None);
        }
        Ok(Some(Box::new(Self {
            versions_dir,
            libraries_dir,
        })))
    }
}

impl JarStorageLocation for VanillaLayout {
    fn name(&self) -> &'static str {
        "vanilla"
    }

    fn libraries_dir(&self) -> &Path {
        &self.libraries_dir
    }

    fn game_artifact_path(&self, version: &str, side: Side) -> LauncherResult<PathBuf> {
        client_only_jar(self.name(), &self.versions_dir, version, side)
    }

    fn compatible_with_side(&self, side: Side) -> bool {
        side == Side::Client
    }
}

// ── Fallback layout ─────────────────────────────────────

#[derive(Debug)]
pub struct FallbackLayout {
    versions_dir: PathBuf,
    libraries_dir: PathBuf,
}

impl FallbackLayout {
    pub fn probe(game_dir: &Path) -> LauncherResult<Option<Box<dyn JarStorageLocation>>> {
        let local_dir = game_dir.join(LOCAL_DIR_NAME);
        let versions_dir = local_dir.join("versions");
        let libraries_dir = local_dir.join("libraries");
        for dir in [&versions_dir, &libraries_dir] {
            std::fs::create_dir_all(dir).map_err(|e| LauncherError::io(dir, e))?;
        }
        Ok(Some(Box::new(Self {
            versions_dir,
            libraries_dir,
        })))
    }
}

impl JarStorageLocation for FallbackLayout {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn libraries_dir(&self) -> &Path {
        &self.libraries_dir
    }

    fn game_artifact_path(&self, version: &str, side: Side) -> LauncherResult<PathBuf> {
        Ok(self
            .versions_dir
            .join(side.as_str())
            .join(format!("{}.jar", version)))
    }

    fn compatible_with_side(&self, _side: Side) -> bool {
        true
    }
}

// ── Locator ─────────────────────────────────────────────

/// Holds the active layout for a game directory.
#[derive(Debug)]
pub struct StorageLocator {
    game_dir: PathBuf,
    active: Box<dyn JarStorageLocation>,
}

impl StorageLocator {
    /// Select the first layout in [`LAYOUT_PRIORITY`] that matches `game_dir`.
    pub fn discover(game_dir: &Path) -> LauncherResult<Self> {
        let active = probe_layouts(game_dir, None)?;
        info!("Detected storage layout '{}' in {:?}", active.name(), game_dir);
        Ok(Self {
            game_dir: game_dir.to_path_buf(),
            active,
        })
    }

    pub fn active(&self) -> &dyn JarStorageLocation {
        self.active.as_ref()
    }

    /// Re-probe if the active layout can't host `side`. Returns `true` on a switch.
    pub fn update_for_side(&mut self, side: Side) -> LauncherResult<bool> {
        if self.active.compatible_with_side(side) {
            return Ok(false);
        }
        let replacement = probe_layouts(&self.game_dir, Some(side))?;
        info!(
            "Storage layout '{}' is incompatible with side {}, switched to '{}'",
            self.active.name(),
            side,
            replacement.name()
        );
        self.active = replacement;
        Ok(true)
    }

    pub fn library_path(&self, coord: &str) -> LauncherResult<PathBuf> {
        self.active.library_path(coord)
    }

    pub fn game_artifact_path(&self, version: &str, side: Side) -> LauncherResult<PathBuf> {
        self.active.game_artifact_path(version, side)
    }
}

fn probe_layouts(
    game_dir: &Path,
    required_side: Option<Side>,
) -> LauncherResult<Box<dyn JarStorageLocation>> {
    for probe in LAYOUT_PRIORITY {
        if let Some(layout) = probe(game_dir)? {
            match required_side {
                Some(side) if !layout.compatible_with_side(side) => continue,
                _ => return Ok(layout),
            }
        }
    }
    Err(LauncherError::NoStorageLocation(game_dir.to_path_buf()))
}
