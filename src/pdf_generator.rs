use crate::elements::{Element, ListMarker, TextSegment};
use crate::stylesheet::{BlockStyle, Rgb, Theme};
use crate::table_renderer::{DefaultTableRenderer, TableRenderer, TableRow};
use anyhow::{Result, ensure};
use tracing::debug;

// --- Page orientation and layout ---

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageOrientation {
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub width: f32,
    pub height: f32,
    pub margin_left: f32,
    pub margin_right: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
}

impl PageLayout {
    /// US Letter with one-inch margins.
    pub fn letter() -> Self {
        PageLayout {
            width: 612.0,
            height: 792.0,
            margin_left: 72.0,
            margin_right: 72.0,
            margin_top: 72.0,
            margin_bottom: 72.0,
        }
    }

    /// Swap width and height if needed so the page matches `orientation`.
    pub fn oriented(mut self, orientation: PageOrientation) -> Self {
        let landscape = self.width > self.height;
        if landscape != (orientation == PageOrientation::Landscape) {
            std::mem::swap(&mut self.width, &mut self.height);
        }
        self
    }

    pub fn content_top(&self) -> f32 {
        self.height - self.margin_top
    }

    pub fn content_width(&self) -> f32 {
        (self.width - self.margin_left - self.margin_right).max(1.0)
    }

    pub fn content_right(&self) -> f32 {
        self.margin_left + self.content_width()
    }
}

// --- Fonts ---

/// The standard Type 1 faces used for every document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
    Italic,
    BoldItalic,
    Mono,
}

const ALL_FONTS: [Font; 5] = [Font::Regular, Font::Bold, Font::Italic, Font::BoldItalic, Font::Mono];

/// Helvetica advance widths for ASCII 32..=126, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' ' to '/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // digits
    278, 278, 584, 584, 584, 556, 1015, // ':' to '@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722, 667,
    611, 722, 667, 944, 667, 667, 611, // 'A' to 'Z'
    278, 278, 278, 469, 556, 333, // '[' to '`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, 556, 556, 333, 500,
    278, 556, 500, 722, 500, 500, 500, // 'a' to 'z'
    334, 260, 334, 584, // '{' to '~'
];

impl Font {
    pub fn resource_name(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
            Font::Italic => "F3",
            Font::BoldItalic => "F4",
            Font::Mono => "F5",
        }
    }

    pub fn base_font(self) -> &'static str {
        match self {
            Font::Regular => "Helvetica",
            Font::Bold => "Helvetica-Bold",
            Font::Italic => "Helvetica-Oblique",
            Font::BoldItalic => "Helvetica-BoldOblique",
            Font::Mono => "Courier",
        }
    }

    fn glyph_width(self, c: char) -> f32 {
        if self == Font::Mono {
            return 600.0;
        }
        let base = match c {
            ' '..='~' => HELVETICA_WIDTHS[c as usize - 32] as f32,
            _ => 556.0,
        };
        match self {
            Font::Bold | Font::BoldItalic => base * 1.06,
            _ => base,
        }
    }
}

/// Approximate rendered width of `text` in points.
pub fn text_width(text: &str, font: Font, size: f32) -> f32 {
    text.chars().map(|c| font.glyph_width(c)).sum::<f32>() * size / 1000.0
}

// --- Text encoding ---

/// Encode `text` for a literal string in a content stream using
/// WinAnsiEncoding. Characters outside it become `?`.
pub fn encode_pdf_text(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push(b'\\');
                out.push(c as u8);
            }
            '\t' | '\n' | '\r' => out.push(b' '),
            _ => out.push(win_ansi(c).unwrap_or(b'?')),
        }
    }
    out
}

fn win_ansi(c: char) -> Option<u8> {
    let byte = match c {
        ' '..='~' | '\u{a0}'..='\u{ff}' => c as u32 as u8,
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => return None,
    };
    Some(byte)
}

/// A PDF text string as UTF-16BE hex, for document metadata.
fn utf16_hex_string(text: &str) -> String {
    let mut out = String::from("<FEFF");
    for unit in text.encode_utf16() {
        out.push_str(&format!("{:04X}", unit));
    }
    out.push('>');
    out
}

/// Compact number formatting for content streams.
fn num(value: f32) -> String {
    let s = format!("{:.2}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

fn rgb(color: Rgb) -> String {
    format!("{} {} {}", num(color.0), num(color.1), num(color.2))
}

// --- Low-level PDF object model ---

pub struct PdfGenerator {
    pub objects: Vec<PdfObj>,
    pub next_id: u32,
}

#[derive(Debug)]
pub struct PdfObj {
    pub id: u32,
    pub generation: u32,
    pub content: String,
    pub is_stream: bool,
    pub stream_data: Option<Vec<u8>>,
}

impl Default for PdfGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfGenerator {
    pub fn new() -> Self {
        PdfGenerator {
            objects: Vec::new(),
            next_id: 1,
        }
    }

    /// Claim an object id to be filled in later with [`Self::add_object_with_id`].
    pub fn reserve_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn add_object(&mut self, content: String) -> u32 {
        let id = self.reserve_id();
        self.add_object_with_id(id, content);
        id
    }

    pub fn add_object_with_id(&mut self, id: u32, content: String) {
        self.objects.push(PdfObj {
            id,
            generation: 0,
            content,
            is_stream: false,
            stream_data: None,
        });
    }

    pub fn add_stream_object(&mut self, dictionary: String, data: Vec<u8>) -> u32 {
        let id = self.reserve_id();
        self.objects.push(PdfObj {
            id,
            generation: 0,
            content: dictionary,
            is_stream: true,
            stream_data: Some(data),
        });
        id
    }

    /// Serialize every object plus the xref table and trailer.
    pub fn generate(&self, root: u32, info: Option<u32>) -> Result<Vec<u8>> {
        let mut objects: Vec<&PdfObj> = self.objects.iter().collect();
        objects.sort_by_key(|obj| obj.id);
        ensure!(
            objects.len() as u32 == self.next_id - 1
                && objects.iter().enumerate().all(|(i, obj)| obj.id == i as u32 + 1),
            "pdf object table has unfilled or duplicate ids"
        );
        ensure!(
            (1..self.next_id).contains(&root),
            "pdf root object {} does not exist",
            root
        );

        let mut pdf = Vec::new();

        // PDF header
        pdf.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");

        // Write objects and collect offsets
        let mut offsets = Vec::with_capacity(objects.len());
        for obj in &objects {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} {} obj\n", obj.id, obj.generation).as_bytes());
            pdf.extend_from_slice(obj.content.as_bytes());

            if obj.is_stream {
                if let Some(data) = &obj.stream_data {
                    pdf.extend_from_slice(b"stream\n");
                    pdf.extend_from_slice(data);
                    pdf.extend_from_slice(b"\nendstream\n");
                }
            }

            pdf.extend_from_slice(b"endobj\n");
        }

        // xref table
        let xref_offset = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        pdf.extend_from_slice(b"0000000000 65535 f \n");
        for offset in offsets {
            pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }

        // trailer
        pdf.extend_from_slice(b"trailer\n<<\n");
        pdf.extend_from_slice(format!("/Size {}\n", objects.len() + 1).as_bytes());
        pdf.extend_from_slice(format!("/Root {} 0 R\n", root).as_bytes());
        if let Some(info) = info {
            pdf.extend_from_slice(format!("/Info {} 0 R\n", info).as_bytes());
        }
        pdf.extend_from_slice(b">>\n");
        pdf.extend_from_slice(b"startxref\n");
        pdf.extend_from_slice(format!("{}\n", xref_offset).as_bytes());
        pdf.extend_from_slice(b"%%EOF\n");

        Ok(pdf)
    }
}

// --- Content stream builder (handles cursor, page breaks, drawing ops) ---

struct ContentStreamBuilder {
    pages: Vec<Vec<u8>>,
    current: Vec<u8>,
    y: f32,
    layout: PageLayout,
}

impl ContentStreamBuilder {
    fn new(layout: PageLayout) -> Self {
        ContentStreamBuilder {
            pages: Vec::new(),
            current: Vec::new(),
            y: layout.content_top(),
            layout,
        }
    }

    fn at_page_top(&self) -> bool {
        self.y >= self.layout.content_top() - 0.01
    }

    /// Start a new page unless `height` still fits. Content taller than a
    /// whole page is placed at the top of a fresh page and allowed to overflow.
    fn ensure_space(&mut self, height: f32) {
        if self.y - height < self.layout.margin_bottom && !self.at_page_top() {
            self.new_page();
        }
    }

    fn new_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.current));
        self.y = self.layout.content_top();
    }

    fn text(&mut self, x: f32, y: f32, font: Font, size: f32, color: Rgb, text: &str) {
        if text.is_empty() {
            return;
        }
        let head = format!(
            "BT\n/{} {} Tf\n{} rg\n{} {} Td\n(",
            font.resource_name(),
            num(size),
            rgb(color),
            num(x),
            num(y)
        );
        self.current.extend_from_slice(head.as_bytes());
        self.current.extend_from_slice(&encode_pdf_text(text));
        self.current.extend_from_slice(b") Tj\nET\n");
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgb) {
        let op = format!(
            "q\n{} rg\n{} {} {} {} re\nf\nQ\n",
            rgb(color),
            num(x),
            num(y),
            num(width),
            num(height)
        );
        self.current.extend_from_slice(op.as_bytes());
    }

    fn stroke_rect(&mut self, x: f32, y: f32, size: f32, line_width: f32, color: Rgb) {
        let op = format!(
            "q\n{} RG\n{} w\n{} {} {} {} re\nS\nQ\n",
            rgb(color),
            num(line_width),
            num(x),
            num(y),
            num(size),
            num(size)
        );
        self.current.extend_from_slice(op.as_bytes());
    }

    fn stroke_path(&mut self, points: &[(f32, f32)], line_width: f32, color: Rgb) {
        let Some(((x0, y0), rest)) = points.split_first() else {
            return;
        };
        let mut op = format!("q\n{} RG\n{} w\n{} {} m\n", rgb(color), num(line_width), num(*x0), num(*y0));
        for (x, y) in rest {
            op.push_str(&format!("{} {} l\n", num(*x), num(*y)));
        }
        op.push_str("S\nQ\n");
        self.current.extend_from_slice(op.as_bytes());
    }

    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), line_width: f32, color: Rgb) {
        self.stroke_path(&[from, to], line_width, color);
    }

    fn finish(mut self) -> Vec<Vec<u8>> {
        self.pages.push(self.current);
        self.pages
    }
}

// --- Inline layout ---

#[derive(Debug, Clone, Copy, PartialEq)]
struct RunStyle {
    font: Font,
    size: f32,
    color: Rgb,
    background: Option<Rgb>,
    /// Horizontal padding around a run with a background.
    padding: f32,
    underline: bool,
}

#[derive(Debug, Clone)]
struct Run {
    text: String,
    style: RunStyle,
    width: f32,
}

impl Run {
    fn extent(&self) -> f32 {
        self.width + self.style.padding * 2.0
    }
}

type Line = Vec<Run>;

#[derive(Debug, Clone, Copy)]
struct InlineBase {
    font_size: f32,
    color: Rgb,
    bold: bool,
}

impl InlineBase {
    fn from_block(block: &BlockStyle, bold: bool) -> Self {
        InlineBase {
            font_size: block.font_size,
            color: block.color,
            bold,
        }
    }
}

fn run_style(segment: &TextSegment, base: InlineBase, theme: &Theme) -> RunStyle {
    let strong = theme.strong_color.unwrap_or(base.color);
    let mut style = RunStyle {
        font: if base.bold { Font::Bold } else { Font::Regular },
        size: base.font_size,
        color: base.color,
        background: None,
        padding: 0.0,
        underline: false,
    };
    match segment {
        TextSegment::Plain(_) | TextSegment::LineBreak => {}
        TextSegment::Bold(_) => {
            style.font = Font::Bold;
            style.color = strong;
        }
        TextSegment::Italic(_) => {
            style.font = if base.bold { Font::BoldItalic } else { Font::Italic };
        }
        TextSegment::BoldItalic(_) => {
            style.font = Font::BoldItalic;
            style.color = strong;
        }
        TextSegment::Code(_) => {
            style.font = Font::Mono;
            style.size = base.font_size * theme.code.font_size / theme.body.font_size.max(1.0);
            style.background = theme.code.background;
            if style.background.is_some() {
                style.padding = theme.code.padding_x;
            }
        }
        TextSegment::Link { .. } => {
            style.color = theme.link_color;
            style.underline = true;
        }
    }
    style
}

fn push_run(line: &mut Line, text: &str, style: RunStyle, width: f32) {
    if let Some(last) = line.last_mut() {
        if last.style == style {
            last.text.push_str(text);
            last.width += width;
            return;
        }
    }
    line.push(Run {
        text: text.to_string(),
        style,
        width,
    });
}

/// Split a word wider than `max_width` into pieces that each fit.
fn split_to_width(word: &str, style: RunStyle, max_width: f32) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut width = 0.0;
    for c in word.chars() {
        let w = style.font.glyph_width(c) * style.size / 1000.0;
        if !piece.is_empty() && width + w > max_width {
            pieces.push(std::mem::take(&mut piece));
            width = 0.0;
        }
        piece.push(c);
        width += w;
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

/// Greedy line breaking at spaces. `LineBreak` segments force a new line.
fn break_lines(segments: &[TextSegment], base: InlineBase, theme: &Theme, max_width: f32) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut line: Line = Vec::new();
    let mut x = 0.0;
    let mut space: Option<RunStyle> = None;

    for segment in segments {
        if matches!(segment, TextSegment::LineBreak) {
            lines.push(std::mem::take(&mut line));
            x = 0.0;
            space = None;
            continue;
        }

        let style = run_style(segment, base, theme);
        let padding = style.padding * 2.0;
        for (i, word) in segment.text().split(' ').enumerate() {
            if i > 0 && space.is_none() {
                // Spaces inside padded code stay inside the run.
                space = Some(RunStyle {
                    background: None,
                    padding: 0.0,
                    ..style
                });
            }
            if word.is_empty() {
                continue;
            }

            let space_width = match space {
                Some(s) if !line.is_empty() => text_width(" ", s.font, s.size),
                _ => 0.0,
            };
            let width = text_width(word, style.font, style.size);

            if !line.is_empty() && x + space_width + width + padding > max_width {
                lines.push(std::mem::take(&mut line));
                x = 0.0;
            } else if let (Some(s), true) = (space, space_width > 0.0) {
                push_run(&mut line, " ", s, space_width);
                x += space_width;
            }
            space = None;

            if width + padding > max_width {
                for piece in split_to_width(word, style, max_width - padding) {
                    let w = text_width(&piece, style.font, style.size);
                    if !line.is_empty() && x + w + padding > max_width {
                        lines.push(std::mem::take(&mut line));
                        x = 0.0;
                    }
                    line.push(Run {
                        text: piece,
                        style,
                        width: w,
                    });
                    x += w + padding;
                }
            } else {
                let merged = line.last().is_some_and(|last| last.style == style);
                push_run(&mut line, word, style, width);
                x += if merged { width } else { width + padding };
            }
        }
    }

    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Baseline of text of `size` centred in a line box starting at `top`.
fn baseline(top: f32, line_height: f32, size: f32) -> f32 {
    top - (line_height - size) / 2.0 - size * 0.8
}

// --- Block layout ---

struct DocumentWriter<'a> {
    canvas: ContentStreamBuilder,
    theme: &'a Theme,
    layout: PageLayout,
    tables: DefaultTableRenderer,
    pending_margin: f32,
    in_list: bool,
}

impl<'a> DocumentWriter<'a> {
    fn new(theme: &'a Theme, layout: PageLayout) -> Self {
        DocumentWriter {
            canvas: ContentStreamBuilder::new(layout),
            theme,
            layout,
            tables: DefaultTableRenderer,
            pending_margin: 0.0,
            in_list: false,
        }
    }

    /// Adjacent vertical margins collapse to the larger one, and no gap is
    /// left at the top of a page.
    fn begin_block(&mut self, margin_top: f32) {
        let gap = self.pending_margin.max(margin_top);
        self.pending_margin = 0.0;
        if !self.canvas.at_page_top() {
            self.canvas.y -= gap;
        }
    }

    fn end_block(&mut self, margin_bottom: f32) {
        self.pending_margin = margin_bottom;
    }

    fn write(&mut self, element: &Element) {
        let is_list = matches!(element, Element::ListItem { .. });
        if self.in_list && !is_list {
            self.pending_margin = self.pending_margin.max(self.theme.list.margin);
        }

        match element {
            Element::Heading { level, segments } => self.heading(*level, segments),
            Element::Paragraph { segments, quote_depth } => self.paragraph(segments, *quote_depth),
            Element::ListItem {
                marker,
                checkbox,
                segments,
                depth,
            } => self.list_item(*marker, *checkbox, segments, *depth),
            Element::CodeBlock { code } => self.code_block(code),
            Element::Table { rows } => self.table(rows),
            Element::HorizontalRule => self.horizontal_rule(),
        }

        self.in_list = is_list;
    }

    fn heading(&mut self, level: u8, segments: &[TextSegment]) {
        let index = (level.clamp(1, 6) - 1) as usize;
        let style = self.theme.headings[index];
        self.begin_block(style.margin_top);
        let lines = break_lines(
            segments,
            InlineBase::from_block(&style, true),
            self.theme,
            self.layout.content_width(),
        );
        self.draw_lines(&lines, self.layout.margin_left, style.font_size);
        self.end_block(style.margin_bottom);
    }

    fn paragraph(&mut self, segments: &[TextSegment], quote_depth: u8) {
        let style = self.theme.paragraph;
        let indent = self.theme.quote_indent * quote_depth as f32;
        self.begin_block(style.margin_top);
        let lines = break_lines(
            segments,
            InlineBase::from_block(&style, false),
            self.theme,
            (self.layout.content_width() - indent).max(1.0),
        );
        self.draw_lines(&lines, self.layout.margin_left + indent, style.font_size);
        self.end_block(style.margin_bottom);
    }

    fn list_item(&mut self, marker: ListMarker, checkbox: Option<bool>, segments: &[TextSegment], depth: u8) {
        let list = self.theme.list;
        let size = list.font_size;
        let line_h = size * self.theme.line_height;
        let color = self.theme.body.color;

        let margin = if self.in_list { list.item_gap } else { list.margin };
        self.begin_block(margin);

        let indent_x = self.layout.margin_left + list.indent * (depth as f32 + 1.0);
        let text_x = match checkbox {
            Some(_) => indent_x + list.checkbox_size + list.checkbox_gap,
            None => indent_x,
        };

        self.canvas.ensure_space(line_h);
        let first_baseline = baseline(self.canvas.y, line_h, size);

        let label = match marker {
            ListMarker::Bullet => "•".to_string(),
            ListMarker::Number(n) => format!("{}.", n),
            ListMarker::Continuation => String::new(),
        };
        let label_x = indent_x - size * 0.4 - text_width(&label, Font::Regular, size);
        self.canvas.text(label_x, first_baseline, Font::Regular, size, color, &label);

        if let Some(checked) = checkbox {
            self.draw_checkbox(indent_x, first_baseline + size * 0.3, list.checkbox_size, checked);
        }

        let base = InlineBase {
            font_size: size,
            color,
            bold: false,
        };
        let lines = break_lines(
            segments,
            base,
            self.theme,
            (self.layout.content_right() - text_x).max(1.0),
        );
        if lines.is_empty() {
            self.canvas.y -= line_h;
        } else {
            self.draw_lines(&lines, text_x, size);
        }
        self.end_block(list.item_gap);
    }

    fn draw_checkbox(&mut self, x: f32, center_y: f32, size: f32, checked: bool) {
        let bottom = center_y - size / 2.0;
        let frame = Rgb(0.33, 0.33, 0.33);
        self.canvas.stroke_rect(x, bottom, size, 0.75, frame);
        if checked {
            self.canvas.stroke_path(
                &[
                    (x + size * 0.2, bottom + size * 0.5),
                    (x + size * 0.42, bottom + size * 0.25),
                    (x + size * 0.8, bottom + size * 0.8),
                ],
                1.2,
                Rgb::BLACK,
            );
        }
    }

    fn code_block(&mut self, code: &str) {
        let code_style = self.theme.code;
        let pre = self.theme.pre;
        let size = code_style.font_size;
        let line_h = size * self.theme.line_height;
        let x = self.layout.margin_left;
        let width = self.layout.content_width();
        let char_width = Font::Mono.glyph_width(' ') * size / 1000.0;
        let max_chars = ((width - code_style.padding_x * 2.0) / char_width).floor().max(1.0) as usize;

        self.begin_block(pre.margin_top);
        for raw in code.split('\n') {
            let expanded: Vec<char> = raw.replace('\t', "    ").chars().collect();
            let chunks: Vec<String> = if expanded.is_empty() {
                vec![String::new()]
            } else {
                expanded.chunks(max_chars).map(|c| c.iter().collect()).collect()
            };
            for chunk in chunks {
                self.canvas.ensure_space(line_h);
                let top = self.canvas.y;
                if let Some(background) = code_style.background {
                    self.canvas.fill_rect(x, top - line_h, width, line_h, background);
                }
                self.canvas.text(
                    x + code_style.padding_x,
                    baseline(top, line_h, size),
                    Font::Mono,
                    size,
                    pre.color,
                    &chunk,
                );
                self.canvas.y -= line_h;
            }
        }
        self.end_block(pre.margin_bottom);
    }

    fn table(&mut self, rows: &[TableRow]) {
        let theme = self.theme;
        let style = &theme.table;
        let left = self.layout.margin_left;
        let dims = self
            .tables
            .calculate_dimensions(rows, style, self.layout.content_width());
        let right = left + dims.total_width;
        let advance = style.line_advance();

        self.begin_block(style.margin_top);
        for (row, &height) in rows.iter().zip(&dims.row_heights) {
            // Rows are never split across pages.
            self.canvas.ensure_space(height);
            let top = self.canvas.y;
            let bottom = top - height;

            let (font, color) = if row.is_header {
                (Font::Bold, style.header_color)
            } else {
                (Font::Regular, style.text_color)
            };

            if row.is_header {
                if let Some(background) = style.header_background {
                    self.canvas.fill_rect(left, bottom, dims.total_width, height, background);
                }
                if let Some((width, rule)) = style.header_rule {
                    self.canvas.stroke_line((left, top), (right, top), width, rule);
                }
            }

            let mut cell_x = left;
            for (col, &col_width) in dims.column_widths.iter().enumerate() {
                if let Some(cell) = row.cells.get(col) {
                    let area = self.tables.text_area(col_width, style);
                    let wrapped = self.tables.wrap_text(&cell.content, font, style.font_size, area);
                    for (i, line) in wrapped.lines.iter().enumerate() {
                        let line_top = top - style.padding_y - advance * i as f32;
                        let tx = self.tables.calculate_text_x(
                            &cell.alignment,
                            cell_x,
                            col_width,
                            text_width(line, font, style.font_size),
                            style.padding_x,
                        );
                        self.canvas.text(
                            tx,
                            baseline(line_top, advance, style.font_size),
                            font,
                            style.font_size,
                            color,
                            line,
                        );
                    }
                }
                cell_x += col_width;
            }

            if let Some((width, rule)) = style.row_rule {
                self.canvas.stroke_line((left, bottom), (right, bottom), width, rule);
            }
            self.canvas.y = bottom;
        }
        self.end_block(style.margin_bottom);
    }

    fn horizontal_rule(&mut self) {
        let rule = self.theme.rule;
        self.begin_block(rule.margin);
        self.canvas.ensure_space(rule.width);
        let y = self.canvas.y - rule.width / 2.0;
        self.canvas.stroke_line(
            (self.layout.margin_left, y),
            (self.layout.content_right(), y),
            rule.width,
            rule.color,
        );
        self.canvas.y -= rule.width;
        self.end_block(rule.margin);
    }

    fn draw_lines(&mut self, lines: &[Line], x: f32, base_size: f32) {
        let pad_y = self.theme.code.padding_y;
        for line in lines {
            let size = line.iter().map(|r| r.style.size).fold(base_size, f32::max);
            let line_h = size * self.theme.line_height;
            self.canvas.ensure_space(line_h);
            let base = baseline(self.canvas.y, line_h, size);

            // Backgrounds first so they never cover neighbouring text.
            let mut rx = x;
            for run in line {
                if let Some(background) = run.style.background {
                    let s = run.style.size;
                    self.canvas
                        .fill_rect(rx, base - s * 0.25 - pad_y, run.extent(), s * 1.1 + pad_y * 2.0, background);
                }
                rx += run.extent();
            }

            let mut rx = x;
            for run in line {
                let tx = rx + run.style.padding;
                let style = run.style;
                self.canvas.text(tx, base, style.font, style.size, style.color, &run.text);
                if style.underline {
                    let uy = base - style.size * 0.12;
                    self.canvas
                        .stroke_line((tx, uy), (tx + run.width, uy), style.size * 0.05, style.color);
                }
                rx += run.extent();
            }

            self.canvas.y -= line_h;
        }
    }

    fn finish(self) -> Vec<Vec<u8>> {
        self.canvas.finish()
    }
}

// --- Public API ---

/// Lay out `elements` on pages of `layout` and serialize the PDF.
pub fn render_pdf(elements: &[Element], theme: &Theme, layout: PageLayout) -> Result<Vec<u8>> {
    let mut writer = DocumentWriter::new(theme, layout);
    for element in elements {
        writer.write(element);
    }
    let page_streams = writer.finish();
    assemble_pdf(&page_streams, &layout, document_title(elements).as_deref())
}

/// Text of the first top-level heading.
fn document_title(elements: &[Element]) -> Option<String> {
    elements.iter().find_map(|e| match e {
        Element::Heading { level: 1, .. } => Some(e.plain_text()),
        _ => None,
    })
}

/// Assemble final PDF from per-page content streams
fn assemble_pdf(page_streams: &[Vec<u8>], layout: &PageLayout, title: Option<&str>) -> Result<Vec<u8>> {
    let mut generator = PdfGenerator::new();
    let pages_id = generator.reserve_id();

    let font_resources: Vec<String> = ALL_FONTS
        .iter()
        .map(|font| {
            let id = generator.add_object(format!(
                "<< /Type /Font\n/Subtype /Type1\n/BaseFont /{}\n/Encoding /WinAnsiEncoding\n>>\n",
                font.base_font()
            ));
            format!("/{} {} 0 R", font.resource_name(), id)
        })
        .collect();
    let font_resources = font_resources.join(" ");

    let mut page_ids = Vec::with_capacity(page_streams.len());
    for page_stream in page_streams {
        let content_id = generator.add_stream_object(
            format!("<< /Length {} >>\n", page_stream.len()),
            page_stream.clone(),
        );
        let page_dict = format!(
            "<< /Type /Page\n\
             /Parent {} 0 R\n\
             /MediaBox [0 0 {} {}]\n\
             /Contents {} 0 R\n\
             /Resources << /Font << {} >> >>\n\
             >>\n",
            pages_id,
            num(layout.width),
            num(layout.height),
            content_id,
            font_resources
        );
        page_ids.push(generator.add_object(page_dict));
    }

    let kids: Vec<String> = page_ids.iter().map(|id| format!("{} 0 R", id)).collect();
    generator.add_object_with_id(
        pages_id,
        format!(
            "<< /Type /Pages\n\
             /Kids [{}]\n\
             /Count {}\n\
             >>\n",
            kids.join(" "),
            page_ids.len()
        ),
    );

    let catalog_id = generator.add_object(format!(
        "<< /Type /Catalog\n\
         /Pages {} 0 R\n\
         >>\n",
        pages_id
    ));

    let mut info = format!("<< /Producer {}\n", utf16_hex_string(concat!("md2pdf ", env!("CARGO_PKG_VERSION"))));
    if let Some(title) = title.filter(|t| !t.is_empty()) {
        info.push_str(&format!("/Title {}\n", utf16_hex_string(title)));
    }
    info.push_str(">>\n");
    let info_id = generator.add_object(info);

    let pdf = generator.generate(catalog_id, Some(info_id))?;
    debug!(pages = page_ids.len(), bytes = pdf.len(), "pdf assembled");
    Ok(pdf)
}
