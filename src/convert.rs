//! A single Markdown to PDF conversion, from raw path strings to a written
//! file.
//!
//! Every check runs before anything is read or written: input path,
//! input file, output path. Only then is the Markdown read, rendered to
//! HTML and handed to the [`PdfRenderer`].

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{ConvertError, PathEscape, RenderError};
use crate::html::render_document;
use crate::input::validate_input;
use crate::output::{check_output, default_output_path};
use crate::paths::resolve_path_from;
use crate::render::{HtmlPdfRenderer, PdfRenderer};

/// The result of a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub input: PathBuf,
    pub output: PathBuf,
    pub bytes_written: u64,
}

/// Convert `input` to PDF with the built-in renderer. Without `output` the
/// PDF lands next to the input with a `.pdf` extension.
pub fn convert_markdown_to_pdf(
    input: &str,
    output: Option<&str>,
    config: &Config,
) -> Result<Conversion, ConvertError> {
    convert_with_renderer(input, output, config, &HtmlPdfRenderer)
}

/// Like [`convert_markdown_to_pdf`] with a caller-supplied renderer.
pub fn convert_with_renderer<R>(
    input: &str,
    output: Option<&str>,
    config: &Config,
    renderer: &R,
) -> Result<Conversion, ConvertError>
where
    R: PdfRenderer + ?Sized,
{
    let cwd = env::current_dir().map_err(|source| PathEscape::WorkingDirectory { source })?;
    convert_in_dir(input, output, config, renderer, &cwd)
}

/// Run a conversion with relative paths interpreted against `cwd`.
pub fn convert_in_dir<R>(
    input: &str,
    output: Option<&str>,
    config: &Config,
    renderer: &R,
    cwd: &Path,
) -> Result<Conversion, ConvertError>
where
    R: PdfRenderer + ?Sized,
{
    let input_path = resolve_path_from(input, config, cwd)?;
    let input_file = validate_input(&input_path, config)?;

    let output_path = match output {
        Some(raw) => resolve_path_from(raw, config, cwd)?.into_path_buf(),
        None => default_output_path(&input_file.path),
    };
    check_output(&output_path, config)?;
    debug!(
        input = %input_file.path.display(),
        output = %output_path.display(),
        "paths validated"
    );

    let markdown = fs::read_to_string(&input_file.path).map_err(|source| RenderError::Read {
        path: input_file.path.clone(),
        source,
    })?;
    let document = render_document(&markdown);

    let bytes_written = renderer
        .render(&document, &output_path)
        .inspect_err(|err| debug!(error = ?err, "renderer failed"))?;

    info!(
        input = %input_file.path.display(),
        output = %output_path.display(),
        bytes_written,
        "conversion finished"
    );
    Ok(Conversion {
        input: input_file.path,
        output: output_path,
        bytes_written,
    })
}
