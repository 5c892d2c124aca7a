//! Components: the independently analyzable units of a checkout.
//!
//! A multi-repository checkout is resolved into one component per nested git
//! work tree. A plain directory with no nested repositories is one component.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directories marking the top of a multi-repository checkout.
pub const ROOT_MARKERS: &[&str] = &[".repo"];

/// One independently analyzable source tree. Identity is `root`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Component {
    /// Absolute root directory
    pub root: PathBuf,
    /// Short name used for report destinations
    pub display_name: String,
    /// Path relative to the checkout root, `/`-separated
    pub relative_path: String,
    /// Repository identity used for links; `None` when not version-controlled
    pub git_identity: Option<String>,
}

impl Component {
    pub fn new(
        root: impl Into<PathBuf>,
        display_name: impl Into<String>,
        relative_path: impl Into<String>,
        git_identity: Option<String>,
    ) -> Self {
        Self {
            root: root.into(),
            display_name: display_name.into(),
            relative_path: relative_path.into(),
            git_identity,
        }
    }

    /// Build a component for `root`, found while scanning `target`.
    pub fn from_root(root: &Path, target: &Path) -> Self {
        let relative_path = project_relative_path(root, target);
        let display_name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| relative_path.clone());
        // The target itself has relative path "."; links need a real name.
        let git_identity = is_git_root(root).then(|| {
            if relative_path == "." {
                display_name.clone()
            } else {
                relative_path.clone()
            }
        });
        Self::new(root, display_name, relative_path, git_identity)
    }

    pub fn is_version_controlled(&self) -> bool {
        self.git_identity.is_some()
    }
}

fn is_git_root(dir: &Path) -> bool {
    dir.join(".git").exists()
}

/// Path of `root` relative to the nearest checkout-root marker, falling back
/// to `target`. The target itself is `"."`.
pub fn project_relative_path(root: &Path, target: &Path) -> String {
    let base = root
        .ancestors()
        .find(|dir| ROOT_MARKERS.iter().any(|m| dir.join(m).is_dir()))
        .unwrap_or(target);

    let relative = root
        .strip_prefix(base)
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|_| root.to_string_lossy().replace('\\', "/"));

    if relative.is_empty() {
        ".".to_string()
    } else {
        relative
    }
}

/// Resolve `target` into its components, ordered by path.
pub fn discover(target: &Path) -> anyhow::Result<Vec<Component>> {
    if is_git_root(target) {
        return Ok(vec![Component::from_root(target, target)]);
    }

    let mut components = Vec::new();
    let mut walker = WalkDir::new(target)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable path during discovery");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            walker.skip_current_dir();
            continue;
        }
        if is_git_root(entry.path()) {
            components.push(Component::from_root(entry.path(), target));
            // Nested repositories belong to their parent checkout.
            walker.skip_current_dir();
        }
    }

    if components.is_empty() {
        components.push(Component::from_root(target, target));
    }

    Ok(components)
}

/// Drop components whose root no longer exists.
pub fn retain_existing(components: Vec<Component>) -> Vec<Component> {
    components
        .into_iter()
        .filter(|c| {
            let exists = c.root.is_dir();
            if !exists {
                tracing::warn!(component = %c.relative_path, "component root missing, skipping");
            }
            exists
        })
        .collect()
}
