//! Path resolution and sandbox containment.
//!
//! User-supplied path strings are turned into absolute, symlink-free paths
//! before anything else touches the filesystem. Two containment rules
//! apply:
//!
//! - with a sandbox root configured (and `MD2PDF_ALLOW_OUTSIDE_BASE` unset),
//!   every resolved path must stay under that root;
//! - otherwise only *relative* input strings are held to the current
//!   working directory. Absolute strings may point anywhere.

use std::collections::VecDeque;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::config::Config;
use crate::error::PathEscape;

/// Upper bound on symlink hops while resolving one path.
const MAX_SYMLINK_HOPS: u32 = 40;

/// An absolute, symlink-expanded path together with the string it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    original: String,
    path: PathBuf,
}

impl ResolvedPath {
    /// The string exactly as the user typed it.
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn as_path(&self) -> &Path {
        &self.path
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.path
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Resolve `raw` against the process working directory.
pub fn resolve_path(raw: &str, config: &Config) -> Result<ResolvedPath, PathEscape> {
    let cwd = std::env::current_dir().map_err(|source| PathEscape::WorkingDirectory { source })?;
    resolve_path_from(raw, config, &cwd)
}

/// Resolve `raw` against an explicit working directory.
pub fn resolve_path_from(raw: &str, config: &Config, cwd: &Path) -> Result<ResolvedPath, PathEscape> {
    let candidate = expand_home(raw);
    let cwd = resolve_symlinks(cwd);
    let path = resolve_symlinks(&cwd.join(&candidate));
    debug!(raw, resolved = %path.display(), "resolved path");

    if let Some(base) = config.enforced_base_dir() {
        if !path.starts_with(base) {
            debug!(raw, base = %base.display(), "path outside base directory");
            return Err(PathEscape::OutsideBase {
                original: raw.to_string(),
            });
        }
    } else if candidate.is_relative() && !path.starts_with(&cwd) {
        debug!(raw, cwd = %cwd.display(), "relative path escapes working directory");
        return Err(PathEscape::EscapesWorkingDirectory {
            original: raw.to_string(),
        });
    }

    Ok(ResolvedPath {
        original: raw.to_string(),
        path,
    })
}

/// Replace a leading `~` or `~/` with the user's home directory.
///
/// `~user` is left alone, as is everything when no home directory is known.
pub fn expand_home(raw: &str) -> PathBuf {
    let rest = if raw == "~" {
        Some("")
    } else {
        raw.strip_prefix("~/")
    };

    match (rest, dirs::home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() => home,
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(raw),
    }
}

/// Canonicalize an absolute path without requiring it to exist.
///
/// Every existing symlink along the way is followed, `.` is dropped and
/// `..` removes the component before it. Components that do not exist are
/// kept as written. Each component of `path` may expand through at most
/// [`MAX_SYMLINK_HOPS`] links before the rest of its chain is taken
/// literally, so a symlink loop cannot hang resolution.
pub fn resolve_symlinks(path: &Path) -> PathBuf {
    let mut pending: VecDeque<PathBuf> = components_of(path).into();
    let mut resolved = PathBuf::new();
    let mut hops = 0;
    // Link targets are queued in front, so the components of `path` itself
    // are always the last `own` entries.
    let mut own = pending.len();

    while let Some(part) = pending.pop_front() {
        if pending.len() < own {
            own = pending.len();
            hops = 0;
        }
        match part.components().next() {
            Some(Component::Prefix(_)) | Some(Component::RootDir) => resolved.push(&part),
            Some(Component::CurDir) | None => {}
            Some(Component::ParentDir) => {
                resolved.pop();
            }
            Some(Component::Normal(name)) => {
                let candidate = resolved.join(name);
                match fs::read_link(&candidate) {
                    Ok(target) if hops < MAX_SYMLINK_HOPS => {
                        hops += 1;
                        if target.has_root() {
                            resolved = PathBuf::new();
                        }
                        for (offset, piece) in components_of(&target).into_iter().enumerate() {
                            pending.insert(offset, piece);
                        }
                    }
                    _ => resolved = candidate,
                }
            }
        }
    }

    resolved
}

fn components_of(path: &Path) -> Vec<PathBuf> {
    path.components()
        .map(|c| PathBuf::from(c.as_os_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;

    fn canonical_tempdir() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        (dir, root)
    }

    #[test]
    fn test_relative_path_inside_cwd() {
        let (_dir, cwd) = canonical_tempdir();
        let resolved = resolve_path_from("notes.md", &Config::default(), &cwd).unwrap();
        assert_eq!(resolved.as_path(), cwd.join("notes.md"));
        assert_eq!(resolved.original(), "notes.md");
    }

    #[test]
    fn test_resolve_against_process_cwd() {
        let cwd = resolve_symlinks(&std::env::current_dir().unwrap());
        let resolved = resolve_path("Cargo.toml", &Config::default()).unwrap();
        assert_eq!(resolved.as_path(), cwd.join("Cargo.toml"));
        assert!(resolve_path("../../outside.md", &Config::default()).is_err());
    }

    #[test]
    fn test_dot_segments_are_normalized() {
        let (_dir, cwd) = canonical_tempdir();
        let resolved =
            resolve_path_from("./a/../b/./c.md", &Config::default(), &cwd).unwrap();
        assert_eq!(resolved.as_path(), cwd.join("b/c.md"));
    }

    #[test]
    fn test_relative_escape_without_sandbox() {
        let (_dir, cwd) = canonical_tempdir();
        fs::create_dir(cwd.join("work")).unwrap();
        let err =
            resolve_path_from("../outside.md", &Config::default(), &cwd.join("work")).unwrap_err();
        assert!(matches!(err, PathEscape::EscapesWorkingDirectory { .. }));
    }

    #[test]
    fn test_absolute_path_bypasses_cwd_check_without_sandbox() {
        // Absolute strings are not held to the working directory when no
        // sandbox is configured, unlike relative strings pointing at the
        // very same file.
        let (_dir, root) = canonical_tempdir();
        fs::create_dir(root.join("work")).unwrap();
        let cwd = root.join("work");
        let target = root.join("outside.md");

        let absolute = resolve_path_from(target.to_str().unwrap(), &Config::default(), &cwd);
        assert_eq!(absolute.unwrap().as_path(), target);

        let relative = resolve_path_from("../outside.md", &Config::default(), &cwd);
        assert!(matches!(relative, Err(PathEscape::EscapesWorkingDirectory { .. })));
    }

    #[test]
    fn test_sandbox_applies_to_absolute_paths() {
        let (_dir, root) = canonical_tempdir();
        let config = Config::default().with_base_dir(root.join("sandbox"));
        let outside = root.join("elsewhere/notes.md");

        let err = resolve_path_from(outside.to_str().unwrap(), &config, &root).unwrap_err();
        assert!(matches!(err, PathEscape::OutsideBase { .. }));
    }

    #[test]
    fn test_sandbox_root_itself_is_allowed() {
        let (_dir, root) = canonical_tempdir();
        let config = Config::default().with_base_dir(root.clone());
        let resolved = resolve_path_from(root.to_str().unwrap(), &config, &root).unwrap();
        assert_eq!(resolved.as_path(), root);
    }

    #[test]
    fn test_sandbox_is_component_wise() {
        let (_dir, root) = canonical_tempdir();
        let config = Config::default().with_base_dir(root.join("docs"));
        let sibling = root.join("docs-private/notes.md");
        let err = resolve_path_from(sibling.to_str().unwrap(), &config, &root).unwrap_err();
        assert!(matches!(err, PathEscape::OutsideBase { .. }));
    }

    #[test]
    fn test_relative_path_outside_cwd_allowed_inside_sandbox() {
        let (_dir, root) = canonical_tempdir();
        fs::create_dir_all(root.join("sandbox/work")).unwrap();
        let config = Config::default().with_base_dir(root.join("sandbox"));
        let resolved =
            resolve_path_from("../notes.md", &config, &root.join("sandbox/work")).unwrap();
        assert_eq!(resolved.as_path(), root.join("sandbox/notes.md"));
    }

    #[test]
    fn test_allow_outside_base_falls_back_to_cwd_rule() {
        let (_dir, root) = canonical_tempdir();
        fs::create_dir(root.join("work")).unwrap();
        let config = Config::default()
            .with_base_dir(root.join("sandbox"))
            .with_allow_outside_base(true);

        assert!(resolve_path_from("/etc/hosts.md", &config, &root).is_ok());
        let err = resolve_path_from("../escape.md", &config, &root.join("work")).unwrap_err();
        assert!(matches!(err, PathEscape::EscapesWorkingDirectory { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_out_of_sandbox_is_rejected() {
        let (_dir, root) = canonical_tempdir();
        fs::create_dir_all(root.join("sandbox")).unwrap();
        fs::create_dir_all(root.join("secret")).unwrap();
        std::os::unix::fs::symlink(root.join("secret"), root.join("sandbox/link")).unwrap();

        let config = Config::default().with_base_dir(root.join("sandbox"));
        let err = resolve_path_from("link/notes.md", &config, &root.join("sandbox")).unwrap_err();
        assert!(matches!(err, PathEscape::OutsideBase { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_symlink_is_followed() {
        let (_dir, root) = canonical_tempdir();
        fs::create_dir_all(root.join("real")).unwrap();
        std::os::unix::fs::symlink("real", root.join("alias")).unwrap();

        assert_eq!(resolve_symlinks(&root.join("alias/x.md")), root.join("real/x.md"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_terminates() {
        let (_dir, root) = canonical_tempdir();
        std::os::unix::fs::symlink(root.join("b"), root.join("a")).unwrap();
        std::os::unix::fs::symlink(root.join("a"), root.join("b")).unwrap();

        let resolved = resolve_symlinks(&root.join("a/notes.md"));
        assert!(resolved.starts_with(&root));
        assert!(resolved.ends_with("notes.md"));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("notes.md"), PathBuf::from("notes.md"));
        assert_eq!(expand_home("~other/notes.md"), PathBuf::from("~other/notes.md"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~"), home);
            assert_eq!(expand_home("~/docs/notes.md"), home.join("docs/notes.md"));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_budget_applies_per_component() {
        use std::os::unix::fs::symlink;

        // Two chains of 30 links each, 60 in total for the whole path.
        let (_dir, root) = canonical_tempdir();
        for i in 0..30 {
            symlink(format!("a{}", i + 1), root.join(format!("a{i}"))).unwrap();
        }
        fs::create_dir(root.join("a30")).unwrap();
        for i in 0..30 {
            symlink(format!("b{}", i + 1), root.join("a30").join(format!("b{i}"))).unwrap();
        }
        fs::write(root.join("a30/b30"), "# hi\n").unwrap();

        assert_eq!(resolve_symlinks(&root.join("a0/b0")), root.join("a30/b30"));

        let config = Config::default().with_base_dir(root.clone());
        let resolved = resolve_path_from("a0/b0", &config, &root).unwrap();
        assert_eq!(resolved.as_path(), root.join("a30/b30"));
    }

    #[test]
    fn test_home_paths_count_as_absolute() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let (_dir, cwd) = canonical_tempdir();
        let resolved = resolve_path_from("~/notes.md", &Config::default(), &cwd).unwrap();
        assert_eq!(resolved.as_path(), resolve_symlinks(&home).join("notes.md"));
    }

    fn segment() -> impl Strategy<Value = String> {
        "[a-z]{1,8}"
    }

    proptest! {
        #[test]
        fn prop_relative_escape_fails_without_sandbox(
            segments in prop::collection::vec(segment(), 1..5),
        ) {
            let (_dir, cwd) = canonical_tempdir();
            let depth = cwd.components().count();
            let raw = format!("{}{}", "../".repeat(depth), segments.join("/"));

            let result = resolve_path_from(&raw, &Config::default(), &cwd);
            let rejected = matches!(result, Err(PathEscape::EscapesWorkingDirectory { .. }));
            prop_assert!(rejected);
        }

        #[test]
        fn prop_paths_outside_sandbox_fail(
            segments in prop::collection::vec(segment(), 1..5),
        ) {
            let (_dir, root) = canonical_tempdir();
            let config = Config::default().with_base_dir(root.join("sandbox"));
            let outside = root.join("outside").join(segments.join("/"));
            let relative = format!("../outside/{}", segments.join("/"));

            let absolute = resolve_path_from(outside.to_str().unwrap(), &config, &root);
            let rejected = matches!(absolute, Err(PathEscape::OutsideBase { .. }));
            prop_assert!(rejected);

            let from_inside = resolve_path_from(&relative, &config, &root.join("sandbox"));
            let rejected = matches!(from_inside, Err(PathEscape::OutsideBase { .. }));
            prop_assert!(rejected);
        }

        #[test]
        fn prop_paths_inside_sandbox_resolve(
            segments in prop::collection::vec(segment(), 1..5),
        ) {
            let (_dir, root) = canonical_tempdir();
            let config = Config::default().with_base_dir(root.clone());
            let raw = segments.join("/");

            let resolved = resolve_path_from(&raw, &config, &root).unwrap();
            prop_assert!(resolved.as_path().starts_with(&root));
            prop_assert_eq!(resolved.as_path(), root.join(&raw));
        }
    }
}
