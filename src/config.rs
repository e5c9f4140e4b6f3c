//! Process-wide conversion settings.
//!
//! [`Config`] is read once at startup from the `MD2PDF_*` environment
//! variables and then passed by reference to every pipeline stage. Nothing
//! below this module looks at the environment.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConfigError;
use crate::paths::resolve_symlinks;

pub const MAX_INPUT_SIZE_VAR: &str = "MD2PDF_MAX_INPUT_SIZE";
pub const ALLOW_OVERWRITE_VAR: &str = "MD2PDF_ALLOW_OVERWRITE";
pub const BASE_DIR_VAR: &str = "MD2PDF_BASE_DIR";
pub const ALLOW_OUTSIDE_BASE_VAR: &str = "MD2PDF_ALLOW_OUTSIDE_BASE";

/// 10 MiB.
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 10 * 1024 * 1024;

/// Immutable settings for a single conversion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Largest input file accepted, in bytes. Files exactly this size pass.
    pub max_input_bytes: u64,
    /// Replace an existing output file instead of refusing.
    pub allow_overwrite: bool,
    /// Sandbox root, already resolved to an absolute, symlink-free path.
    pub base_dir: Option<PathBuf>,
    /// Skip the sandbox containment check even when `base_dir` is set.
    pub allow_outside_base: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            allow_overwrite: false,
            base_dir: None,
            allow_outside_base: false,
        }
    }
}

impl Config {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().map_err(|source| ConfigError::WorkingDirectory { source })?;
        Self::from_lookup(|name| std::env::var(name).ok(), &cwd)
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// `cwd` anchors a relative `MD2PDF_BASE_DIR`.
    pub fn from_lookup<F>(lookup: F, cwd: &Path) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_input_bytes = match lookup(MAX_INPUT_SIZE_VAR) {
            Some(raw) => parse_byte_count(MAX_INPUT_SIZE_VAR, &raw)?,
            None => DEFAULT_MAX_INPUT_BYTES,
        };

        let base_dir = lookup(BASE_DIR_VAR)
            .filter(|raw| !raw.is_empty())
            .map(|raw| resolve_symlinks(&cwd.join(raw)));

        let config = Self {
            max_input_bytes,
            allow_overwrite: flag_enabled(lookup(ALLOW_OVERWRITE_VAR)),
            base_dir,
            allow_outside_base: flag_enabled(lookup(ALLOW_OUTSIDE_BASE_VAR)),
        };
        debug!(?config, "loaded configuration");
        Ok(config)
    }

    pub fn with_max_input_bytes(mut self, bytes: u64) -> Self {
        self.max_input_bytes = bytes;
        self
    }

    pub fn with_allow_overwrite(mut self, allow: bool) -> Self {
        self.allow_overwrite = allow;
        self
    }

    /// The directory is used as given; callers pass an already resolved path.
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    pub fn with_allow_outside_base(mut self, allow: bool) -> Self {
        self.allow_outside_base = allow;
        self
    }

    /// The sandbox root that containment checks must honour, if any.
    pub fn enforced_base_dir(&self) -> Option<&Path> {
        if self.allow_outside_base {
            None
        } else {
            self.base_dir.as_deref()
        }
    }
}

/// Only the literal `"1"` turns a flag on.
fn flag_enabled(value: Option<String>) -> bool {
    value.as_deref() == Some("1")
}

fn parse_byte_count(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .replace('_', "")
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidByteCount {
            var,
            value: raw.to_string(),
        })
}
