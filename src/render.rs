//! The renderer boundary: a finished HTML document in, a PDF file out.

use std::fs;
use std::path::Path;

use anyhow::Context;
use tracing::debug;

use crate::elements::parse_html;
use crate::error::RenderError;
use crate::html::RenderedDocument;
use crate::pdf_generator::render_pdf;
use crate::stylesheet::StyleSheet;

/// Turns a [`RenderedDocument`] into a PDF file.
pub trait PdfRenderer {
    /// Render `document` and write the PDF to `output`, returning the number
    /// of bytes written.
    fn render(&self, document: &RenderedDocument, output: &Path) -> Result<u64, RenderError>;
}

/// The built-in renderer. Page geometry and styling come from the
/// document's own `<style>` block.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlPdfRenderer;

impl HtmlPdfRenderer {
    pub fn new() -> Self {
        HtmlPdfRenderer
    }

    /// The PDF for `document`, without touching the filesystem.
    pub fn render_bytes(&self, document: &RenderedDocument) -> Result<Vec<u8>, RenderError> {
        let html = document.as_str();
        let sheet = StyleSheet::from_document(html);
        let layout = sheet.page_layout();
        let theme = sheet.theme();

        let elements = parse_html(html).map_err(|err| RenderError::Markup {
            message: format!("{err:#}"),
        })?;
        debug!(
            elements = elements.len(),
            width = layout.width,
            height = layout.height,
            "document parsed"
        );

        let pdf = render_pdf(&elements, &theme, layout).context("failed to generate pdf")?;
        Ok(pdf)
    }
}

impl PdfRenderer for HtmlPdfRenderer {
    fn render(&self, document: &RenderedDocument, output: &Path) -> Result<u64, RenderError> {
        let pdf = self.render_bytes(document)?;
        fs::write(output, &pdf).map_err(|source| RenderError::Write {
            path: output.to_path_buf(),
            source,
        })?;
        debug!(path = %output.display(), bytes = pdf.len(), "pdf written");
        Ok(pdf.len() as u64)
    }
}
