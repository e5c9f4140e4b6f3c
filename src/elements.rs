//! Structured document elements recovered from rendered HTML.
//! These carry formatting intent so the PDF generator can render
//! headings at different sizes, indent lists, draw tables, etc.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Result, anyhow};
use lol_html::{EndTagHandler, RewriteStrSettings, doc_text, element, rewrite_str};

use crate::table_renderer::{TableCell, TableRow};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TableAlignment {
    Left,
    Center,
    Right,
}

impl TableAlignment {
    fn from_attribute(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("center") => TableAlignment::Center,
            Some("right") => TableAlignment::Right,
            _ => TableAlignment::Left,
        }
    }
}

/// Text segment with inline formatting
#[derive(Debug, Clone, PartialEq)]
pub enum TextSegment {
    Plain(String),
    Bold(String),
    Italic(String),
    BoldItalic(String),
    Code(String),
    Link { text: String, url: String },
    LineBreak,
}

impl TextSegment {
    pub fn text(&self) -> &str {
        match self {
            TextSegment::Plain(t)
            | TextSegment::Bold(t)
            | TextSegment::Italic(t)
            | TextSegment::BoldItalic(t)
            | TextSegment::Code(t) => t,
            TextSegment::Link { text, .. } => text,
            TextSegment::LineBreak => "\n",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ListMarker {
    Bullet,
    Number(u32),
    /// Text of an item that resumes after a nested list.
    Continuation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Heading {
        level: u8,
        segments: Vec<TextSegment>,
    },
    Paragraph {
        segments: Vec<TextSegment>,
        /// Number of enclosing `<blockquote>` elements.
        quote_depth: u8,
    },
    ListItem {
        marker: ListMarker,
        /// `Some(checked)` for task-list items.
        checkbox: Option<bool>,
        segments: Vec<TextSegment>,
        depth: u8,
    },
    CodeBlock {
        code: String,
    },
    Table {
        rows: Vec<TableRow>,
    },
    HorizontalRule,
}

impl Element {
    /// Plain text of the element, inline formatting dropped.
    pub fn plain_text(&self) -> String {
        match self {
            Element::Heading { segments, .. }
            | Element::Paragraph { segments, .. }
            | Element::ListItem { segments, .. } => segments.iter().map(TextSegment::text).collect(),
            Element::CodeBlock { code } => code.clone(),
            Element::Table { rows } => rows
                .iter()
                .map(|r| {
                    r.cells
                        .iter()
                        .map(|c| c.content.as_str())
                        .collect::<Vec<_>>()
                        .join("  ")
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Element::HorizontalRule => String::new(),
        }
    }
}

// --- Raw HTML event stream ---

#[derive(Debug, Clone, PartialEq)]
enum HtmlEvent {
    Start {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    End {
        tag: String,
    },
    Text(String),
}

/// Tokenize `html` into start/end/text events in document order.
///
/// Void elements (`br`, `hr`, `input`, `img`) produce no end event.
fn tokenize(html: &str) -> Result<Vec<HtmlEvent>> {
    let events: Rc<RefCell<Vec<HtmlEvent>>> = Rc::new(RefCell::new(Vec::new()));

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("*", {
                let events = Rc::clone(&events);
                move |el| {
                    let tag = el.tag_name().to_ascii_lowercase();
                    let attrs = el
                        .attributes()
                        .iter()
                        .map(|a| (a.name().to_ascii_lowercase(), a.value()))
                        .collect();
                    events.borrow_mut().push(HtmlEvent::Start {
                        tag: tag.clone(),
                        attrs,
                    });

                    if let Some(handlers) = el.end_tag_handlers() {
                        let events = Rc::clone(&events);
                        let handler: EndTagHandler<'static> = Box::new(move |_end| {
                            events.borrow_mut().push(HtmlEvent::End { tag });
                            Ok(())
                        });
                        handlers.push(handler);
                    }
                    Ok(())
                }
            })],
            document_content_handlers: vec![doc_text!({
                let events = Rc::clone(&events);
                move |t| {
                    if !t.as_str().is_empty() {
                        events.borrow_mut().push(HtmlEvent::Text(t.as_str().to_string()));
                    }
                    Ok(())
                }
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| anyhow!("html rewrite failed: {err}"))?;

    let events = Rc::try_unwrap(events)
        .map(RefCell::into_inner)
        .unwrap_or_else(|rc| rc.borrow().clone());
    Ok(events)
}

/// Decode the character references html5ever-style serializers emit.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').filter(|&end| end <= 10).and_then(|end| {
            let name = &rest[1..end];
            let ch = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => name
                    .strip_prefix("#x")
                    .or_else(|| name.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| name.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

// --- Block builder ---

#[derive(Debug, Default, Clone, Copy)]
struct InlineState {
    bold: u32,
    italic: u32,
    code: u32,
}

enum ListFrame {
    Ordered { next: u32 },
    Unordered,
}

struct PendingItem {
    marker: ListMarker,
    checkbox: Option<bool>,
    depth: u8,
}

#[derive(Default)]
struct TableBuilder {
    rows: Vec<TableRow>,
    current: Option<TableRow>,
    cell: Option<TableCell>,
    in_head: bool,
}

/// Containers whose text is never rendered.
const HIDDEN_TAGS: [&str; 5] = ["head", "style", "script", "title", "template"];

#[derive(Default)]
struct BlockBuilder {
    elements: Vec<Element>,
    segments: Vec<TextSegment>,
    inline: InlineState,
    links: Vec<String>,
    hidden: u32,
    quote_depth: u8,
    heading: Option<u8>,
    lists: Vec<ListFrame>,
    /// Open `<li>` elements, innermost last.
    items: Vec<PendingItem>,
    pre: Option<String>,
    table: Option<TableBuilder>,
}

impl BlockBuilder {
    fn start(&mut self, tag: &str, attrs: &[(String, String)]) {
        if HIDDEN_TAGS.contains(&tag) {
            self.hidden += 1;
            return;
        }
        if self.hidden > 0 {
            return;
        }
        let attr = |name: &str| {
            attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };

        match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.flush();
                self.heading = tag[1..].parse().ok();
            }
            "p" | "div" => {
                if self.items.is_empty() && self.table.is_none() {
                    self.flush();
                } else if !self.segments.is_empty() {
                    self.segments.push(TextSegment::LineBreak);
                }
            }
            "blockquote" => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_add(1);
            }
            "ul" | "ol" => {
                self.flush();
                let frame = if tag == "ol" {
                    let next = attr("start").and_then(|s| s.trim().parse().ok()).unwrap_or(1);
                    ListFrame::Ordered { next }
                } else {
                    ListFrame::Unordered
                };
                self.lists.push(frame);
            }
            "li" => {
                self.flush();
                let depth = self.lists.len().saturating_sub(1) as u8;
                let marker = match self.lists.last_mut() {
                    Some(ListFrame::Ordered { next }) => {
                        let n = *next;
                        *next = next.saturating_add(1);
                        ListMarker::Number(n)
                    }
                    _ => ListMarker::Bullet,
                };
                self.items.push(PendingItem {
                    marker,
                    checkbox: None,
                    depth,
                });
            }
            "input" => {
                let is_checkbox = attr("type").is_some_and(|t| t.eq_ignore_ascii_case("checkbox"));
                if is_checkbox {
                    let checked = attr("checked").is_some();
                    let leading = self.segments.is_empty()
                        && self.items.last().is_some_and(|item| item.checkbox.is_none());
                    match self.items.last_mut() {
                        Some(item) if leading => item.checkbox = Some(checked),
                        _ => self.push_text(if checked { "[x] " } else { "[ ] " }),
                    }
                }
            }
            "pre" => {
                self.flush();
                self.pre = Some(String::new());
            }
            "table" => {
                self.flush();
                self.table = Some(TableBuilder::default());
            }
            "thead" => {
                if let Some(table) = self.table.as_mut() {
                    table.in_head = true;
                }
            }
            "tbody" => {
                if let Some(table) = self.table.as_mut() {
                    table.in_head = false;
                }
            }
            "tr" => {
                if let Some(table) = self.table.as_mut() {
                    table.finish_row();
                    table.current = Some(TableRow::new(Vec::new()).header(table.in_head));
                }
            }
            "th" | "td" => {
                if let Some(table) = self.table.as_mut() {
                    table.finish_cell();
                    let alignment = TableAlignment::from_attribute(attr("align"));
                    table.cell = Some(TableCell::new(String::new(), alignment));
                    if tag == "th" {
                        if let Some(row) = table.current.as_mut() {
                            row.is_header = true;
                        }
                    }
                }
            }
            "hr" => {
                self.flush();
                self.elements.push(Element::HorizontalRule);
            }
            "br" => {
                if let Some(pre) = self.pre.as_mut() {
                    pre.push('\n');
                } else {
                    self.segments.push(TextSegment::LineBreak);
                }
            }
            "img" => {
                let alt = attr("alt").map(decode_entities).unwrap_or_default();
                if !alt.is_empty() {
                    self.push_text(&format!("[{alt}]"));
                }
            }
            "strong" | "b" => self.inline.bold += 1,
            "em" | "i" => self.inline.italic += 1,
            "code" | "kbd" | "samp" | "tt" => self.inline.code += 1,
            "a" => self
                .links
                .push(attr("href").map(decode_entities).unwrap_or_default()),
            _ => {}
        }
    }

    fn end(&mut self, tag: &str) {
        if HIDDEN_TAGS.contains(&tag) {
            self.hidden = self.hidden.saturating_sub(1);
            return;
        }
        if self.hidden > 0 {
            return;
        }

        match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => self.flush(),
            "p" | "div" => {
                if self.items.is_empty() && self.table.is_none() {
                    self.flush();
                }
            }
            "blockquote" => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            "ul" | "ol" => {
                self.flush();
                self.lists.pop();
            }
            "li" => {
                self.flush();
                self.items.pop();
            }
            "pre" => {
                if let Some(code) = self.pre.take() {
                    let code = code.strip_suffix('\n').unwrap_or(&code).to_string();
                    self.elements.push(Element::CodeBlock { code });
                }
            }
            "table" => {
                if let Some(mut table) = self.table.take() {
                    table.finish_row();
                    if !table.rows.is_empty() {
                        self.elements.push(Element::Table { rows: table.rows });
                    }
                }
            }
            "tr" => {
                if let Some(table) = self.table.as_mut() {
                    table.finish_row();
                }
            }
            "th" | "td" => {
                if let Some(table) = self.table.as_mut() {
                    table.finish_cell();
                }
            }
            "strong" | "b" => self.inline.bold = self.inline.bold.saturating_sub(1),
            "em" | "i" => self.inline.italic = self.inline.italic.saturating_sub(1),
            "code" | "kbd" | "samp" | "tt" => self.inline.code = self.inline.code.saturating_sub(1),
            "a" => {
                self.links.pop();
            }
            _ => {}
        }
    }

    fn text(&mut self, raw: &str) {
        if self.hidden > 0 {
            return;
        }
        let text = decode_entities(raw);

        if let Some(pre) = self.pre.as_mut() {
            pre.push_str(&text);
            return;
        }
        if let Some(table) = self.table.as_mut() {
            if let Some(cell) = table.cell.as_mut() {
                append_collapsed(&mut cell.content, &text);
            }
            return;
        }
        self.push_text(&text);
    }

    /// Append inline text, collapsing whitespace runs the way HTML does.
    fn push_text(&mut self, text: &str) {
        let mut collapsed = String::with_capacity(text.len());
        let mut last_space = self
            .segments
            .last()
            .map(|s| s.text().ends_with(char::is_whitespace))
            .unwrap_or(true);
        for c in text.chars() {
            if c.is_whitespace() && c != '\u{a0}' {
                if !last_space {
                    collapsed.push(' ');
                }
                last_space = true;
            } else {
                collapsed.push(c);
                last_space = false;
            }
        }
        if collapsed.is_empty() {
            return;
        }

        let segment = if let Some(url) = self.links.last() {
            TextSegment::Link {
                text: collapsed,
                url: url.clone(),
            }
        } else if self.inline.code > 0 {
            TextSegment::Code(collapsed)
        } else {
            match (self.inline.bold > 0, self.inline.italic > 0) {
                (true, true) => TextSegment::BoldItalic(collapsed),
                (true, false) => TextSegment::Bold(collapsed),
                (false, true) => TextSegment::Italic(collapsed),
                (false, false) => TextSegment::Plain(collapsed),
            }
        };
        self.segments.push(segment);
    }

    /// Close whatever inline content is open as the appropriate block.
    fn flush(&mut self) {
        let mut segments = std::mem::take(&mut self.segments);
        while matches!(segments.last(), Some(TextSegment::LineBreak)) {
            segments.pop();
        }
        trim_trailing_space(&mut segments);

        if let Some(level) = self.heading.take() {
            if !segments.is_empty() {
                self.elements.push(Element::Heading { level, segments });
            }
            return;
        }

        if let Some(item) = self.items.last_mut() {
            if segments.is_empty() && item.checkbox.is_none() {
                return;
            }
            self.elements.push(Element::ListItem {
                marker: item.marker,
                checkbox: item.checkbox.take(),
                segments,
                depth: item.depth,
            });
            item.marker = ListMarker::Continuation;
            return;
        }

        if !segments.is_empty() {
            self.elements.push(Element::Paragraph {
                segments,
                quote_depth: self.quote_depth,
            });
        }
    }

    fn finish(mut self) -> Vec<Element> {
        self.flush();
        if let Some(code) = self.pre.take() {
            self.elements.push(Element::CodeBlock { code });
        }
        if let Some(mut table) = self.table.take() {
            table.finish_row();
            if !table.rows.is_empty() {
                self.elements.push(Element::Table { rows: table.rows });
            }
        }
        self.elements
    }
}

impl TableBuilder {
    fn finish_cell(&mut self) {
        if let Some(mut cell) = self.cell.take() {
            cell.content = cell.content.trim().to_string();
            match self.current.as_mut() {
                Some(row) => row.cells.push(cell),
                None => self.current = Some(TableRow::new(vec![cell]).header(self.in_head)),
            }
        }
    }

    fn finish_row(&mut self) {
        self.finish_cell();
        if let Some(row) = self.current.take() {
            if !row.cells.is_empty() {
                self.rows.push(row);
            }
        }
    }
}

fn append_collapsed(target: &mut String, text: &str) {
    for word in text.split_whitespace() {
        if !target.is_empty() && !target.ends_with(' ') {
            target.push(' ');
        }
        target.push_str(word);
    }
    if text.ends_with(char::is_whitespace) && !target.is_empty() && !target.ends_with(' ') {
        target.push(' ');
    }
}

fn trim_trailing_space(segments: &mut Vec<TextSegment>) {
    if let Some(last) = segments.last_mut() {
        let text = match last {
            TextSegment::Plain(t)
            | TextSegment::Bold(t)
            | TextSegment::Italic(t)
            | TextSegment::BoldItalic(t)
            | TextSegment::Code(t) => t,
            TextSegment::Link { text, .. } => text,
            TextSegment::LineBreak => return,
        };
        let trimmed_len = text.trim_end().len();
        text.truncate(trimmed_len);
        if text.is_empty() {
            segments.pop();
        }
    }
}

/// Parse an HTML document (or fragment) into renderable block elements.
pub fn parse_html(html: &str) -> Result<Vec<Element>> {
    let mut builder = BlockBuilder::default();
    // Text may arrive in several chunks; entities are decoded once it is whole.
    let mut text = String::new();
    for event in tokenize(html)? {
        match event {
            HtmlEvent::Text(chunk) => text.push_str(&chunk),
            HtmlEvent::Start { tag, attrs } => {
                builder.text(&std::mem::take(&mut text));
                builder.start(&tag, &attrs);
            }
            HtmlEvent::End { tag } => {
                builder.text(&std::mem::take(&mut text));
                builder.end(&tag);
            }
        }
    }
    builder.text(&text);
    Ok(builder.finish())
}
