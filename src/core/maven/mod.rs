mod artifact;

pub use artifact::MavenArtifact;

/// Repositories the shipped sources resolve against.
pub const FABRIC_MAVEN: &str = "https://maven.fabricmc.net";
