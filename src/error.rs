//! Error types for md2pdf.
//!
//! Each pipeline stage has its own error enum so callers can match on the
//! stage that rejected a conversion. [`ConvertError`] collects them for the
//! top-level `convert*` functions.
//!
//! Validation errors carry precise, user-facing messages naming the
//! offending path or limit. [`ConvertError::RenderFailed`] is the exception:
//! its message is deliberately generic, and the underlying [`RenderError`]
//! is only reachable through [`std::error::Error::source`].

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::util::format_bytes;

/// All fatal errors returned by a conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    PathEscape(#[from] PathEscape),

    #[error(transparent)]
    InputInvalid(#[from] InputError),

    #[error(transparent)]
    OutputInvalid(#[from] OutputError),

    #[error("Conversion failed due to an unexpected internal issue.")]
    RenderFailed {
        #[source]
        source: RenderError,
    },
}

impl From<RenderError> for ConvertError {
    fn from(source: RenderError) -> Self {
        ConvertError::RenderFailed { source }
    }
}

/// Invalid process configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a non-negative number of bytes, got '{value}'.")]
    InvalidByteCount { var: &'static str, value: String },

    #[error("Unable to determine the current working directory: {source}")]
    WorkingDirectory {
        #[source]
        source: io::Error,
    },
}

/// A user-supplied path resolved outside the region it is allowed to touch.
#[derive(Debug, Error)]
pub enum PathEscape {
    #[error("Path '{original}' is outside the allowed base directory.")]
    OutsideBase { original: String },

    #[error(
        "Relative path '{original}' escapes the current working directory; use an absolute path instead."
    )]
    EscapesWorkingDirectory { original: String },

    #[error("Unable to determine the current working directory: {source}")]
    WorkingDirectory {
        #[source]
        source: io::Error,
    },
}

/// The input file is not something we are willing to read.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Input file '{path}' not found or is not a file.")]
    NotFound { path: PathBuf },

    #[error("Input file must be a Markdown file (.md or .markdown).")]
    UnsupportedExtension { path: PathBuf },

    #[error("Unable to read input file size for validation.")]
    SizeUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "Input file exceeds the maximum allowed size of {human} ({limit} bytes).",
        human = human_limit(.limit)
    )]
    TooLarge { path: PathBuf, size: u64, limit: u64 },
}

/// The output path is not safe to write.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Output path '{path}' points to a directory, not a file.")]
    IsDirectory { path: PathBuf },

    #[error(
        "Output file '{path}' already exists. Set MD2PDF_ALLOW_OVERWRITE=1 to allow replacing it."
    )]
    AlreadyExists { path: PathBuf },

    #[error("Output directory '{parent}' does not exist.")]
    MissingParent { parent: PathBuf },
}

fn human_limit(limit: &u64) -> String {
    format_bytes(*limit)
}

/// Internal failure while producing the PDF. Never shown to the user
/// directly; see [`ConvertError::RenderFailed`].
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to read '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to walk rendered HTML: {message}")]
    Markup { message: String },

    #[error(transparent)]
    Layout(#[from] anyhow::Error),

    #[error("failed to write '{path}'")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn render_failed_hides_internal_detail() {
        let err = ConvertError::from(RenderError::Read {
            path: PathBuf::from("/secret/layout/notes.md"),
            source: io::Error::new(io::ErrorKind::InvalidData, "stream did not contain valid UTF-8"),
        });

        let message = err.to_string();
        assert_eq!(message, "Conversion failed due to an unexpected internal issue.");
        assert!(!message.contains("/secret"));
        assert!(err.source().is_some());
    }

    #[test]
    fn too_large_names_the_limit() {
        let err = InputError::TooLarge {
            path: PathBuf::from("big.md"),
            size: 200,
            limit: 100,
        };
        assert_eq!(
            err.to_string(),
            "Input file exceeds the maximum allowed size of 100 B (100 bytes)."
        );
    }

    #[test]
    fn already_exists_mentions_opt_in() {
        let err = OutputError::AlreadyExists {
            path: PathBuf::from("/tmp/out.pdf"),
        };
        assert!(err.to_string().contains("MD2PDF_ALLOW_OVERWRITE=1"));
    }

    #[test]
    fn stage_errors_convert_into_convert_error() {
        let err: ConvertError = PathEscape::OutsideBase {
            original: "../x.md".into(),
        }
        .into();
        assert!(matches!(err, ConvertError::PathEscape(_)));
        assert_eq!(err.to_string(), "Path '../x.md' is outside the allowed base directory.");
    }
}
