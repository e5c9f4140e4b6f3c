//! Markdown to sanitized, styled HTML.
//!
//! Three steps, each a pure function of its input:
//!
//! 1. [`markdown_to_html`] runs comrak with a fixed extension set,
//! 2. [`sanitize_html`] strips everything outside the allow-list,
//! 3. [`wrap_document`] drops the fragment into the page template.
//!
//! [`render_document`] chains them.

use std::fmt;

use ammonia::Builder as AmmoniaBuilder;
use comrak::{Options, markdown_to_html as comrak_to_html};
use once_cell::sync::Lazy;
use tracing::debug;

/// Tags allowed on top of ammonia's baseline set.
pub const EXTRA_TAGS: &[&str] = &[
    "p", "pre", "h1", "h2", "h3", "h4", "h5", "h6", "table", "thead", "tbody", "tr", "th", "td",
    "code", "hr", "br", "input",
];

/// Per-tag attributes allowed on top of ammonia's baseline set.
pub const EXTRA_TAG_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("a", &["href", "title", "name"]),
    ("img", &["src", "alt", "title"]),
    ("input", &["type", "checked", "disabled"]),
];

static SANITIZER: Lazy<AmmoniaBuilder<'static>> = Lazy::new(build_sanitizer);

fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();
    builder.add_tags(EXTRA_TAGS);
    for (tag, attributes) in EXTRA_TAG_ATTRIBUTES {
        builder.add_tag_attributes(*tag, *attributes);
    }
    builder
}

/// Fixed comrak options: tables, task lists and hard line breaks on top of
/// CommonMark (which already covers fenced code and strict list rules).
/// Raw HTML is emitted so the sanitizer, not the parser, decides what stays.
pub fn markdown_options() -> Options<'static> {
    let mut options = Options::default();

    let ext = &mut options.extension;
    ext.table = true;
    ext.tasklist = true;
    ext.tagfilter = false;

    let render = &mut options.render;
    render.hardbreaks = true;
    render.r#unsafe = true;

    options
}

pub fn markdown_to_html(markdown: &str) -> String {
    comrak_to_html(markdown, &markdown_options())
}

/// Disallowed tags are removed and their text kept, except `script` and
/// `style` whose content goes too.
pub fn sanitize_html(html: &str) -> String {
    SANITIZER.clean(html).to_string()
}

/// A complete HTML document ready for the PDF renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument(String);

impl RenderedDocument {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RenderedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Markdown in, styled and sanitized HTML document out.
pub fn render_document(markdown: &str) -> RenderedDocument {
    let html = markdown_to_html(markdown);
    let safe = sanitize_html(&html);
    debug!(raw = html.len(), sanitized = safe.len(), "markdown rendered to html");
    wrap_document(&safe)
}

pub fn wrap_document(body: &str) -> RenderedDocument {
    let mut document = String::with_capacity(DOCUMENT_HEAD.len() + body.len() + DOCUMENT_TAIL.len());
    document.push_str(DOCUMENT_HEAD);
    document.push_str(body);
    document.push_str(DOCUMENT_TAIL);
    RenderedDocument(document)
}

const DOCUMENT_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <style>
        @page {
            size: letter;
            margin: 1in;
        }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif;
            line-height: 1.6;
            color: #333;
            max-width: 100%;
        }
        p {
            margin: 0 0 14px;
        }
        h1 {
            color: #2c3e50;
            margin-bottom: 10px;
            margin-top: 0;
            font-size: 24px;
        }
        h2 {
            color: #34495e;
            margin-bottom: 8px;
            margin-top: 22px;
            font-size: 20px;
        }
        h3 {
            color: #555;
            margin-top: 18px;
            font-size: 17px;
        }
        table {
            border-collapse: collapse;
            width: 100%;
            margin: 20px 0;
            page-break-inside: avoid;
            break-inside: avoid;
            border: none;
            font-size: 14px;
        }
        th, td {
            border: none;
            border-bottom: 1px solid #999;
            padding: 8px 6px;
            text-align: left;
            vertical-align: top;
            page-break-inside: avoid;
            break-inside: avoid;
        }
        th {
            font-weight: 700;
            border-top: 1px solid #999;
            background-color: #f7f7f7;
            color: #2c3e50;
        }
        tr {
            page-break-inside: avoid;
            break-inside: avoid;
        }
        code {
            background-color: #f4f4f4;
            padding: 2px 6px;
            border-radius: 3px;
            font-family: 'Courier New', monospace;
        }
        hr {
            border: none;
            border-top: 2px solid #ecf0f1;
            margin: 30px 0;
        }
        ul, ol {
            margin: 10px 0;
            padding-left: 30px;
            font-size: 15px;
        }
        li {
            margin: 5px 0;
        }
        input[type="checkbox"] {
            margin-right: 8px;
            width: 16px;
            height: 16px;
            vertical-align: middle;
            cursor: default;
        }
        strong {
            color: #2c3e50;
        }
    </style>
</head>
<body>
"#;

const DOCUMENT_TAIL: &str = "
</body>
</html>
";
