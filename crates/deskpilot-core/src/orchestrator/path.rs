//! PathResolver - single authority for path resolution.
//!
//! This is the ONLY place where user identities become absolute filesystem
//! paths. Planners and tools never combine a parent path with a child name;
//! they receive the finished absolute path. The WORKSPACE anchor is the
//! session cwd captured once at request entry, never a live process cwd.
//!
//! Paths are carried as strings so that drive-letter anchors resolve the
//! same way on every host; platform path semantics apply only inside the
//! file tools.

use crate::planner::is_absolute_path;
use crate::types::BaseAnchor;

/// A deterministically resolved path.
///
/// `base_anchor` is `None` iff the user supplied an absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Original identity from the user or provider.
    pub raw: String,
    /// Anchor the path was resolved against, or `INHERITED` for containment.
    pub base_anchor: Option<String>,
    /// The authoritative absolute path.
    pub absolute: String,
    /// True when the user provided the absolute path themselves.
    pub user_absolute: bool,
}

/// Resolves identities against base anchors and parent containers.
#[derive(Debug, Clone)]
pub struct PathResolver {
    workspace: String,
}

impl PathResolver {
    /// Create a resolver rooted at the session workspace.
    pub fn new(workspace: impl Into<String>) -> Self {
        Self {
            workspace: normalize(workspace.into()),
        }
    }

    /// Absolute base for an anchor.
    pub fn anchor_base(&self, anchor: &BaseAnchor) -> String {
        match anchor {
            BaseAnchor::Workspace => self.workspace.clone(),
            BaseAnchor::Drive(letter) => format!("{}:/", letter.to_ascii_uppercase()),
            BaseAnchor::Home => home_dir(&self.workspace),
            BaseAnchor::Desktop => join(&home_dir(&self.workspace), "Desktop"),
            BaseAnchor::Documents => join(&home_dir(&self.workspace), "Documents"),
            BaseAnchor::Downloads => join(&home_dir(&self.workspace), "Downloads"),
        }
    }

    /// Resolve an identity deterministically.
    ///
    /// Rules, in order:
    /// 1. an absolute identity passes through unchanged;
    /// 2. a containment parent's resolved path is inherited;
    /// 3. an explicit anchor provides the base;
    /// 4. otherwise the base is WORKSPACE.
    pub fn resolve(
        &self,
        raw: &str,
        anchor: Option<&BaseAnchor>,
        parent: Option<&str>,
    ) -> ResolvedPath {
        if is_absolute_path(raw) {
            tracing::debug!(raw = %raw, "identity is user-absolute");
            return ResolvedPath {
                raw: raw.to_string(),
                base_anchor: None,
                absolute: normalize(raw.to_string()),
                user_absolute: true,
            };
        }

        if let Some(parent) = parent {
            let absolute = join(parent, raw);
            tracing::debug!(raw = %raw, parent = %parent, absolute = %absolute, "identity inherits parent container");
            return ResolvedPath {
                raw: raw.to_string(),
                base_anchor: Some("INHERITED".to_string()),
                absolute,
                user_absolute: false,
            };
        }

        let (name, base) = match anchor {
            Some(anchor) => (anchor.name(), self.anchor_base(anchor)),
            None => ("WORKSPACE".to_string(), self.workspace.clone()),
        };
        let absolute = join(&base, raw);
        tracing::debug!(raw = %raw, anchor = %name, absolute = %absolute, "identity resolved against anchor");
        ResolvedPath {
            raw: raw.to_string(),
            base_anchor: Some(name),
            absolute,
            user_absolute: false,
        }
    }
}

fn normalize(path: String) -> String {
    let forward = path.replace('\\', "/");
    if forward.len() > 1 && forward.ends_with('/') && !forward.ends_with(":/") {
        forward.trim_end_matches('/').to_string()
    } else {
        forward
    }
}

fn join(base: &str, child: &str) -> String {
    let base = normalize(base.to_string());
    let child = child.trim_matches('/');
    if child.is_empty() {
        return base;
    }
    if base.ends_with('/') {
        format!("{base}{child}")
    } else {
        format!("{base}/{child}")
    }
}

fn home_dir(fallback: &str) -> String {
    dirs::home_dir()
        .map(|p| normalize(p.to_string_lossy().into_owned()))
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> PathResolver {
        PathResolver::new("/work/session")
    }

    #[test]
    fn test_user_absolute_passes_through() {
        let resolved = resolver().resolve("/tmp/data", None, None);
        assert!(resolved.user_absolute);
        assert_eq!(resolved.base_anchor, None);
        assert_eq!(resolved.absolute, "/tmp/data");
    }

    #[test]
    fn test_relative_defaults_to_workspace() {
        let resolved = resolver().resolve("notes.txt", None, None);
        assert_eq!(resolved.absolute, "/work/session/notes.txt");
        assert_eq!(resolved.base_anchor.as_deref(), Some("WORKSPACE"));
        assert!(!resolved.user_absolute);
    }

    #[test]
    fn test_drive_anchor_resolution() {
        let resolved = resolver().resolve("alex", Some(&BaseAnchor::Drive('D')), None);
        assert_eq!(resolved.absolute, "D:/alex");
        assert_eq!(resolved.base_anchor.as_deref(), Some("DRIVE_D"));
    }

    #[test]
    fn test_parent_inheritance_wins_over_default() {
        let resolved = resolver().resolve("presentation.pptx", None, Some("D:/alex"));
        assert_eq!(resolved.absolute, "D:/alex/presentation.pptx");
        assert_eq!(resolved.base_anchor.as_deref(), Some("INHERITED"));
    }

    #[test]
    fn test_empty_identity_resolves_to_base() {
        let resolved = resolver().resolve("", Some(&BaseAnchor::Drive('C')), None);
        assert_eq!(resolved.absolute, "C:/");
        let resolved = resolver().resolve("", None, None);
        assert_eq!(resolved.absolute, "/work/session");
    }

    #[test]
    fn test_backslashes_normalized() {
        let resolved = resolver().resolve("d:\\alex\\docs", None, None);
        assert!(resolved.user_absolute);
        assert_eq!(resolved.absolute, "d:/alex/docs");
    }
}
