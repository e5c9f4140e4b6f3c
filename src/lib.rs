//! # md2pdf
//!
//! Convert a single Markdown document into a styled PDF, with the
//! filesystem side of the job locked down:
//!
//! - **Path resolution**: `~` expansion, symlink resolution and containment
//!   in an optional sandbox directory
//! - **Input validation**: existing regular file, `.md`/`.markdown`
//!   extension, size limit
//! - **Output checks**: never a directory, never a silent overwrite, never
//!   a missing parent directory
//! - **Rendering**: Markdown to sanitized HTML with a fixed stylesheet, then
//!   to PDF through a pluggable [`PdfRenderer`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md2pdf::{Config, convert_markdown_to_pdf};
//!
//! let config = Config::from_env().expect("invalid configuration");
//! let conversion = convert_markdown_to_pdf("notes.md", None, &config)
//!     .expect("Failed to convert");
//! println!("wrote {} bytes to {}", conversion.bytes_written, conversion.output.display());
//! ```
//!
//! ## Modules
//!
//! - [`paths`]: user path strings to absolute, contained paths
//! - [`input`]: input file validation
//! - [`output`]: output path checks
//! - [`html`]: Markdown to sanitized HTML document
//! - [`render`]: the renderer trait and the built-in HTML to PDF renderer
//! - [`elements`]: HTML to block elements
//! - [`stylesheet`]: the CSS subset the renderer understands
//! - [`pdf_generator`]: page layout and PDF serialization
//! - [`convert`]: the whole pipeline
//!
//! ## Examples
//!
//! ### Preparing the HTML document only
//!
//! ```rust
//! let document = md2pdf::html::render_document("# Title\n\n<script>x()</script>");
//! assert!(document.as_str().contains("<h1>Title</h1>"));
//! assert!(!document.as_str().contains("<script"));
//! ```
//!
//! ### Using a custom renderer
//!
//! ```rust,no_run
//! use std::path::Path;
//! use md2pdf::{Config, PdfRenderer, RenderError, RenderedDocument, convert_with_renderer};
//!
//! struct HtmlDump;
//!
//! impl PdfRenderer for HtmlDump {
//!     fn render(&self, document: &RenderedDocument, output: &Path) -> Result<u64, RenderError> {
//!         std::fs::write(output, document.as_str()).map_err(|source| RenderError::Write {
//!             path: output.to_path_buf(),
//!             source,
//!         })?;
//!         Ok(document.as_str().len() as u64)
//!     }
//! }
//!
//! convert_with_renderer("notes.md", Some("notes.html"), &Config::default(), &HtmlDump)
//!     .expect("Failed to convert");
//! ```

pub mod config;
pub mod convert;
pub mod elements;
pub mod error;
pub mod html;
pub mod input;
pub mod output;
pub mod paths;
pub mod pdf_generator;
pub mod render;
pub mod stylesheet;
pub mod table_renderer;
pub mod util;

pub use config::Config;
pub use convert::{Conversion, convert_markdown_to_pdf, convert_with_renderer};
pub use error::{ConfigError, ConvertError, InputError, OutputError, PathEscape, RenderError};
pub use html::RenderedDocument;
pub use render::{HtmlPdfRenderer, PdfRenderer};
