// src/manifest/mod.rs

//! Manifest model
//!
//! A manifest declares what a workstation should have: named install groups
//! of backend items, the filesystem paths each group owns (backed up before
//! removal), extra filesystem checks for the verifier, a small quick-check
//! set, workspace directories to scaffold, and user data directories.
//!
//! Manifests are immutable once loaded. The built-in catalog lives in
//! `catalog`; a JSON file with the same shape can replace it.

pub mod catalog;

use crate::backends::BackendKind;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One installable item. Identity is (backend, identifier).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallItem {
    pub backend: BackendKind,
    pub identifier: String,
    pub display_name: String,
    /// Absence is a verification failure rather than a warning
    #[serde(default)]
    pub critical: bool,
}

impl InstallItem {
    pub fn new(backend: BackendKind, identifier: &str, display_name: &str, critical: bool) -> Self {
        Self {
            backend,
            identifier: identifier.to_string(),
            display_name: display_name.to_string(),
            critical,
        }
    }

    pub fn primary(identifier: &str, display_name: &str, critical: bool) -> Self {
        Self::new(BackendKind::Primary, identifier, display_name, critical)
    }

    pub fn secondary(identifier: &str, display_name: &str, critical: bool) -> Self {
        Self::new(BackendKind::Secondary, identifier, display_name, critical)
    }

    pub fn key(&self) -> (BackendKind, &str) {
        (self.backend, &self.identifier)
    }
}

impl PartialEq for InstallItem {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for InstallItem {}

impl Hash for InstallItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// A named, ordered set of items forming one install/uninstall category
///
/// Order is kept for deterministic output only; items do not depend on
/// each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub items: Vec<InstallItem>,
    /// Filesystem paths archived before the group is removed
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

/// What a path check asserts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathCheckKind {
    Exists,
    Executable,
}

/// A filesystem assertion checked by the verifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathCheck {
    pub name: String,
    pub path: PathBuf,
    pub kind: PathCheckKind,
    #[serde(default)]
    pub critical: bool,
}

/// The full declaration for a workstation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub groups: Vec<Group>,
    #[serde(default)]
    pub path_checks: Vec<PathCheck>,
    /// Small fixed subset checked by `verify --quick`
    #[serde(default)]
    pub quick_checks: Vec<InstallItem>,
    /// Directories created by `install`
    #[serde(default)]
    pub workspace: Vec<PathBuf>,
    /// User data removed by `uninstall --purge-data`
    #[serde(default)]
    pub data_dirs: Vec<PathBuf>,
}

impl Manifest {
    /// The built-in small-business catalog
    pub fn builtin() -> Self {
        let mut manifest = catalog::builtin();
        manifest.expand_paths();
        manifest
    }

    /// Load a manifest from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Manifest(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    /// Parse, expand `~` in paths, and validate
    pub fn from_json(raw: &str) -> Result<Self> {
        let mut manifest: Manifest = serde_json::from_str(raw)
            .map_err(|e| Error::Manifest(format!("Invalid manifest JSON: {}", e)))?;
        manifest.expand_paths();
        manifest.validate()?;
        debug!("Loaded manifest with {} groups", manifest.groups.len());
        Ok(manifest)
    }

    /// Check structural invariants
    ///
    /// Group names are unique and non-empty, identifiers are non-empty, and an
    /// item appears at most once per group. The same item may appear in
    /// several groups.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for group in &self.groups {
            if group.name.trim().is_empty() {
                return Err(Error::Manifest("Group with empty name".to_string()));
            }
            if !names.insert(group.name.as_str()) {
                return Err(Error::Manifest(format!("Duplicate group name: {}", group.name)));
            }

            let mut seen = HashSet::new();
            for item in &group.items {
                if item.identifier.trim().is_empty() {
                    return Err(Error::Manifest(format!(
                        "Empty identifier in group {}",
                        group.name
                    )));
                }
                if !seen.insert(item.key()) {
                    return Err(Error::Manifest(format!(
                        "Duplicate item {} ({}) in group {}",
                        item.identifier, item.backend, group.name
                    )));
                }
            }
        }

        for item in &self.quick_checks {
            if item.identifier.trim().is_empty() {
                return Err(Error::Manifest("Empty identifier in quick checks".to_string()));
            }
        }

        Ok(())
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Resolve group names in the order given; unknown names are an error
    pub fn select(&self, names: &[String]) -> Result<Vec<&Group>> {
        names
            .iter()
            .map(|name| {
                self.group(name)
                    .ok_or_else(|| Error::NotFoundError(format!("No group named '{}'", name)))
            })
            .collect()
    }

    pub fn item_count(&self) -> usize {
        self.groups.iter().map(|g| g.items.len()).sum()
    }

    fn expand_paths(&mut self) {
        for group in &mut self.groups {
            for path in &mut group.paths {
                *path = expand_path(path);
            }
        }
        for check in &mut self.path_checks {
            check.path = expand_path(&check.path);
        }
        for path in self.workspace.iter_mut().chain(self.data_dirs.iter_mut()) {
            *path = expand_path(path);
        }
    }
}

/// Expand a leading `~` to the user's home directory
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_is_valid() {
        let manifest = Manifest::builtin();
        manifest.validate().unwrap();
        assert!(manifest.group("office").is_some());
        assert_eq!(manifest.quick_checks.len(), 5);
        assert!(manifest.quick_checks.iter().all(|i| i.critical));
    }

    #[test]
    fn test_builtin_paths_are_expanded() {
        let manifest = Manifest::builtin();
        for path in manifest.groups.iter().flat_map(|g| g.paths.iter()) {
            assert!(!path.to_string_lossy().starts_with('~'), "{}", path.display());
        }
    }

    #[test]
    fn test_item_identity_ignores_display_name() {
        let a = InstallItem::primary("vlc", "VLC", false);
        let b = InstallItem::primary("vlc", "VLC media player", true);
        let c = InstallItem::secondary("vlc", "VLC", false);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_from_json_minimal() {
        let manifest = Manifest::from_json(
            r#"{
                "groups": [
                    {
                        "name": "media",
                        "items": [
                            { "backend": "primary", "identifier": "vlc", "display_name": "VLC" },
                            { "backend": "secondary", "identifier": "org.audacityteam.Audacity", "display_name": "Audacity", "critical": true }
                        ],
                        "paths": ["~/.config/vlc"]
                    }
                ]
            }"#,
        )
        .unwrap();

        let group = manifest.group("media").unwrap();
        assert_eq!(group.items.len(), 2);
        assert!(!group.items[0].critical);
        assert!(group.items[1].critical);
        assert!(group.paths[0].ends_with(".config/vlc"));
        assert!(manifest.quick_checks.is_empty());
    }

    #[test]
    fn test_duplicate_group_rejected() {
        let result = Manifest::from_json(
            r#"{ "groups": [ { "name": "a", "items": [] }, { "name": "a", "items": [] } ] }"#,
        );
        assert!(matches!(result, Err(Error::Manifest(_))));
    }

    #[test]
    fn test_duplicate_item_in_group_rejected() {
        let result = Manifest::from_json(
            r#"{ "groups": [ { "name": "a", "items": [
                { "backend": "primary", "identifier": "vlc", "display_name": "VLC" },
                { "backend": "primary", "identifier": "vlc", "display_name": "VLC again" }
            ] } ] }"#,
        );
        assert!(matches!(result, Err(Error::Manifest(_))));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result = Manifest::from_json(
            r#"{ "groups": [ { "name": "a", "items": [
                { "backend": "snap", "identifier": "vlc", "display_name": "VLC" }
            ] } ] }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_select_preserves_order_and_reports_unknown() {
        let manifest = Manifest::builtin();
        let groups = manifest
            .select(&["security".to_string(), "office".to_string()])
            .unwrap();
        assert_eq!(groups[0].name, "security");
        assert_eq!(groups[1].name, "office");

        let err = manifest.select(&["games".to_string()]).unwrap_err();
        assert!(matches!(err, Error::NotFoundError(_)));
    }
}
