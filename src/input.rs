//! Input file validation.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::Config;
use crate::error::InputError;
use crate::paths::ResolvedPath;

/// Extensions accepted as Markdown, compared case-insensitively.
pub const ALLOWED_EXTENSIONS: [&str; 2] = ["md", "markdown"];

/// A Markdown file that passed every check and may be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub path: PathBuf,
    pub size: u64,
}

/// Confirm that `input` is an existing regular Markdown file no larger than
/// the configured limit. Only metadata is read.
pub fn validate_input(input: &ResolvedPath, config: &Config) -> Result<InputFile, InputError> {
    let path = input.as_path();

    if !path.is_file() {
        debug!(path = %path.display(), "input missing or not a regular file");
        return Err(InputError::NotFound {
            path: path.to_path_buf(),
        });
    }

    if !has_markdown_extension(path) {
        return Err(InputError::UnsupportedExtension {
            path: path.to_path_buf(),
        });
    }

    let size = fs::metadata(path)
        .map_err(|source| InputError::SizeUnavailable {
            path: path.to_path_buf(),
            source,
        })?
        .len();

    if size > config.max_input_bytes {
        debug!(size, limit = config.max_input_bytes, "input exceeds size limit");
        return Err(InputError::TooLarge {
            path: path.to_path_buf(),
            size,
            limit: config.max_input_bytes,
        });
    }

    debug!(path = %path.display(), size, "input validated");
    Ok(InputFile {
        path: path.to_path_buf(),
        size,
    })
}

pub fn has_markdown_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::resolve_path_from;
    use proptest::prelude::*;

    fn write_file(dir: &Path, name: &str, len: usize) -> ResolvedPath {
        fs::write(dir.join(name), "x".repeat(len)).unwrap();
        resolve_path_from(name, &Config::default(), dir).unwrap()
    }

    #[test]
    fn test_accepts_markdown_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_file(dir.path(), "notes.md", 500);
        let file = validate_input(&input, &Config::default()).unwrap();
        assert_eq!(file.size, 500);
        assert_eq!(file.path, input.as_path());
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["A.MD", "b.Markdown", "c.markdown"] {
            let input = write_file(dir.path(), name, 10);
            assert!(validate_input(&input, &Config::default()).is_ok(), "{}", name);
        }
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = resolve_path_from("missing.md", &Config::default(), dir.path()).unwrap();
        let err = validate_input(&input, &Config::default()).unwrap_err();
        assert!(matches!(err, InputError::NotFound { .. }));
        assert!(err.to_string().contains("missing.md"));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("folder.md")).unwrap();
        let input = resolve_path_from("folder.md", &Config::default(), dir.path()).unwrap();
        let err = validate_input(&input, &Config::default()).unwrap_err();
        assert!(matches!(err, InputError::NotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_to_markdown_file_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::write(root.join("real.md"), "# Real\n").unwrap();
        std::os::unix::fs::symlink(root.join("real.md"), root.join("alias.md")).unwrap();

        let input = resolve_path_from("alias.md", &Config::default(), &root).unwrap();
        let file = validate_input(&input, &Config::default()).unwrap();
        assert_eq!(file.path, root.join("real.md"));
        assert_eq!(file.size, 7);
    }

    #[test]
    fn test_size_limit_is_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default().with_max_input_bytes(100);

        let at_limit = write_file(dir.path(), "exact.md", 100);
        assert!(validate_input(&at_limit, &config).is_ok());

        let over = write_file(dir.path(), "over.md", 101);
        let err = validate_input(&over, &config).unwrap_err();
        assert!(matches!(err, InputError::TooLarge { size: 101, limit: 100, .. }));
    }

    #[test]
    fn test_no_extension_or_dotfile() {
        assert!(!has_markdown_extension(Path::new("README")));
        assert!(!has_markdown_extension(Path::new(".md")));
        assert!(!has_markdown_extension(Path::new("notes.md.txt")));
        assert!(has_markdown_extension(Path::new("notes.txt.md")));
    }

    proptest! {
        #[test]
        fn prop_other_extensions_rejected(
            ext in "[a-zA-Z0-9]{1,8}".prop_filter("markdown extension", |e| {
                !e.eq_ignore_ascii_case("md") && !e.eq_ignore_ascii_case("markdown")
            }),
            body in "[ -~]{0,64}",
        ) {
            let dir = tempfile::tempdir().unwrap();
            let name = format!("doc.{}", ext);
            fs::write(dir.path().join(&name), body).unwrap();
            let input = resolve_path_from(&name, &Config::default(), dir.path()).unwrap();

            let result = validate_input(&input, &Config::default());
            let rejected = matches!(result, Err(InputError::UnsupportedExtension { .. }));
            prop_assert!(rejected);
        }

        #[test]
        fn prop_oversized_files_rejected(limit in 0u64..256, extra in 1u64..64) {
            let dir = tempfile::tempdir().unwrap();
            let input = write_file(dir.path(), "big.md", (limit + extra) as usize);
            let config = Config::default().with_max_input_bytes(limit);

            let result = validate_input(&input, &config);
            let rejected = matches!(result, Err(InputError::TooLarge { .. }));
            prop_assert!(rejected);
        }
    }
}
