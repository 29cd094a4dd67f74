// ─── Version File ───
// Parses a Mojang version JSON and evaluates OS rules for libraries.

use std::collections::HashMap;

use serde::Deserialize;

use crate::core::environment::{current_arch_bits, Side};

/// The parts of a Mojang version JSON needed to resolve jars.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionJson {
    pub id: Option<String>,
    pub main_class: String,
    #[serde(default)]
    pub libraries: Vec<LibraryEntry>,
    pub downloads: Option<VersionDownloads>,
}

#[derive(Debug, Deserialize)]
pub struct VersionDownloads {
    pub client: Option<DownloadArtifact>,
    pub server: Option<DownloadArtifact>,
}

impl VersionDownloads {
    pub fn for_side(&self, side: Side) -> Option<&DownloadArtifact> {
        match side {
            Side::Client => self.client.as_ref(),
            Side::Server => self.server.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadArtifact {
    pub sha1: String,
    #[serde(default)]
    pub size: Option<u64>,
    pub url: String,
}

// ─── Library Entry with Rules ───

#[derive(Debug, Deserialize)]
pub struct LibraryEntry {
    pub name: String,
    #[serde(default)]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default)]
    pub rules: Option<Vec<LibraryRule>>,
    /// OS name → native classifier (may contain `${arch}`).
    #[serde(default)]
    pub natives: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
pub struct LibraryDownloads {
    pub artifact: Option<LibDownloadArtifact>,
    #[serde(default)]
    pub classifiers: Option<HashMap<String, LibDownloadArtifact>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibDownloadArtifact {
    #[serde(default)]
    pub path: Option<String>,
    pub sha1: String,
    #[serde(default)]
    pub size: Option<u64>,
    pub url: String,
}

// ─── OS Rule Evaluation ───

#[derive(Debug, Deserialize)]
pub struct LibraryRule {
    pub action: RuleAction,
    #[serde(default)]
    pub os: Option<OsRule>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Deserialize)]
pub struct OsRule {
    #[serde(default)]
    pub name: Option<String>,
}

impl LibraryEntry {
    /// Evaluate whether this library should be included on `os`.
    ///
    /// Rules logic:
    /// - If no rules → allowed.
    /// - Process rules top-to-bottom. Start with "disallowed".
    /// - A rule without an `os` block matches everywhere; one with an `os`
    ///   block matches only when its name equals `os`.
    /// - Each matching rule sets the state.
    /// - The last matching rule wins.
    pub fn is_allowed_for_os(&self, os: &str) -> bool {
        let rules = match &self.rules {
            Some(r) => r,
            None => return true,
        };

        let mut allowed = false;
        for rule in rules {
            let os_matches = match &rule.os {
                None => true,
                Some(rule_os) => rule_os.name.as_deref() == Some(os),
            };

            if os_matches {
                allowed = rule.action == RuleAction::Allow;
            }
        }

        allowed
    }

    /// Native classifier for `os`, with `${arch}` substituted.
    pub fn native_classifier_for_os(&self, os: &str) -> Option<String> {
        let natives = self.natives.as_ref()?;
        natives
            .get(os)
            .map(|classifier| classifier.replace("${arch}", current_arch_bits()))
    }
}
