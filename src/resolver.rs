//! Dataset reference resolution.
//!
//! A request names a dataset either by a registered alias or by an explicit filename. Aliases
//! map to paths through a fixed table configured at startup. Explicit filenames are confined to
//! the configured data root: the requested path is normalised lexically and checked for
//! containment before any filesystem access, then re-checked after resolving symlinks. A
//! containment violation produces the same error whether or not the target exists.

use crate::error::GatewayError;

use hashbrown::HashMap;
use std::path::{Component, Path, PathBuf};

/// A dataset named by alias or by explicit filename.
#[derive(Clone, Debug, PartialEq)]
pub enum DataReference {
    /// A registered alias
    Alias(String),
    /// An explicit filename, relative to the data root
    Path(String),
}

/// An opaque reference to a dataset that has passed containment checks.
///
/// Downstream components treat the handle as ready for access and do not re-derive or
/// re-validate the path.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedHandle(PathBuf);

impl ResolvedHandle {
    /// Returns the resolved filesystem path.
    pub fn path(&self) -> &Path {
        &self.0
    }
}

/// Resolves dataset references against a data root and alias table.
pub struct DatasetResolver {
    /// Canonicalised data root
    root: PathBuf,
    /// Alias table, fixed at startup
    aliases: HashMap<String, PathBuf>,
}

impl DatasetResolver {
    /// Return a new DatasetResolver.
    ///
    /// The root must exist; it is canonicalised once so that later containment checks compare
    /// like with like. Relative alias targets are joined to the root.
    pub fn new(
        root: &Path,
        aliases: HashMap<String, PathBuf>,
    ) -> Result<Self, std::io::Error> {
        let root = root.canonicalize()?;
        let aliases = aliases
            .into_iter()
            .map(|(name, target)| {
                let target = if target.is_absolute() {
                    target
                } else {
                    root.join(target)
                };
                (name, target)
            })
            .collect();
        Ok(DatasetResolver { root, aliases })
    }

    /// Resolve a dataset reference to a handle.
    pub fn resolve(&self, reference: &DataReference) -> Result<ResolvedHandle, GatewayError> {
        match reference {
            DataReference::Alias(alias) => {
                let target =
                    self.aliases
                        .get(alias)
                        .ok_or_else(|| GatewayError::UnknownAlias {
                            alias: alias.clone(),
                        })?;
                Ok(ResolvedHandle(target.clone()))
            }
            DataReference::Path(requested) => self.resolve_path(requested),
        }
    }

    /// Resolve an explicit filename, confining it to the data root.
    fn resolve_path(&self, requested: &str) -> Result<ResolvedHandle, GatewayError> {
        let requested = Path::new(requested);
        let candidate = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.root.join(requested)
        };
        // Containment is checked lexically before touching the filesystem, so disallowed paths
        // are rejected without learning whether they exist.
        let normalised = lexical_normalise(&candidate).ok_or(GatewayError::PathNotAllowed)?;
        if !normalised.starts_with(&self.root) {
            return Err(GatewayError::PathNotAllowed);
        }
        // Re-check after resolving symlinks.
        match normalised.canonicalize() {
            Ok(real) => {
                if real.starts_with(&self.root) {
                    Ok(ResolvedHandle(real))
                } else {
                    Err(GatewayError::PathNotAllowed)
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(ResolvedHandle(normalised))
            }
            Err(_) => Err(GatewayError::PathNotAllowed),
        }
    }
}

/// Resolve `.` and `..` components without touching the filesystem.
///
/// Returns None when `..` would climb above the filesystem root.
fn lexical_normalise(path: &Path) -> Option<PathBuf> {
    let mut normalised = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalised.push(prefix.as_os_str()),
            Component::RootDir => normalised.push(component.as_os_str()),
            Component::CurDir => (),
            Component::ParentDir => {
                if !normalised.pop() {
                    return None;
                }
            }
            Component::Normal(part) => normalised.push(part),
        }
    }
    Some(normalised)
}

/// Load an alias table from a JSON file mapping alias names to paths.
pub fn load_alias_map(path: &Path) -> Result<HashMap<String, PathBuf>, std::io::Error> {
    let contents = std::fs::read_to_string(path)?;
    let aliases: std::collections::HashMap<String, String> = serde_json::from_str(&contents)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
    Ok(aliases
        .into_iter()
        .map(|(name, target)| (name, PathBuf::from(target)))
        .collect())
}
