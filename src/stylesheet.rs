//! The slice of CSS the PDF renderer understands.
//!
//! Only flat rules are parsed: `selector, selector { prop: value; }`.
//! Later rules override earlier ones property by property. Lengths are
//! converted to PDF points; colours to RGB in `0.0..=1.0`.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::pdf_generator::{PageLayout, PageOrientation};
use crate::table_renderer::TableStyle;

static COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());
static RULE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([^{}]+)\{([^{}]*)\}").unwrap());
static STYLE_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style[^>]*>(.*?)</style>").unwrap());

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub f32, pub f32, pub f32);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0.0, 0.0, 0.0);

    /// `#rgb` or `#rrggbb`.
    pub fn parse(value: &str) -> Option<Rgb> {
        let hex = value.trim().strip_prefix('#')?;
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        match hex.len() {
            3 => {
                let mut it = hex.chars().map(|c| channel(&format!("{c}{c}")));
                Some(Rgb(it.next()??, it.next()??, it.next()??))
            }
            6 => Some(Rgb(
                channel(hex.get(0..2)?)?,
                channel(hex.get(2..4)?)?,
                channel(hex.get(4..6)?)?,
            )),
            _ => None,
        }
    }
}

/// Top/right/bottom/left, in points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Edges {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Edges {
    pub fn uniform(v: f32) -> Self {
        Edges {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }
}

/// `12px`, `1in`, `0` and friends, converted to points. Percentages and
/// keywords are not lengths.
pub fn parse_length(value: &str) -> Option<f32> {
    let v = value.trim();
    if v == "0" {
        return Some(0.0);
    }
    let split = v.find(|c: char| c.is_ascii_alphabetic())?;
    let (number, unit) = v.split_at(split);
    let n: f32 = number.trim().parse().ok()?;
    let factor = match unit.to_ascii_lowercase().as_str() {
        "pt" => 1.0,
        "px" => 0.75,
        "in" => 72.0,
        "cm" => 72.0 / 2.54,
        "mm" => 72.0 / 25.4,
        "pc" => 12.0,
        _ => return None,
    };
    Some(n * factor)
}

/// CSS box shorthand: one to four lengths.
pub fn parse_edges(value: &str) -> Option<Edges> {
    let parts: Option<Vec<f32>> = value.split_whitespace().map(parse_length).collect();
    let parts = parts?;
    let (top, right, bottom, left) = match parts.as_slice() {
        [a] => (*a, *a, *a, *a),
        [a, b] => (*a, *b, *a, *b),
        [a, b, c] => (*a, *b, *c, *b),
        [a, b, c, d] => (*a, *b, *c, *d),
        _ => return None,
    };
    Some(Edges {
        top,
        right,
        bottom,
        left,
    })
}

#[derive(Debug, Default, Clone)]
pub struct StyleSheet {
    rules: HashMap<String, HashMap<String, String>>,
}

impl StyleSheet {
    pub fn parse(css: &str) -> Self {
        let css = COMMENT_RE.replace_all(css, "");
        let mut rules: HashMap<String, HashMap<String, String>> = HashMap::new();

        for caps in RULE_RE.captures_iter(&css) {
            let declarations: Vec<(String, String)> = caps[2]
                .split(';')
                .filter_map(|decl| {
                    let (prop, value) = decl.split_once(':')?;
                    let prop = prop.trim().to_ascii_lowercase();
                    if prop.is_empty() {
                        return None;
                    }
                    Some((prop, value.trim().to_string()))
                })
                .collect();

            for selector in caps[1].split(',') {
                let selector = selector.split_whitespace().collect::<Vec<_>>().join(" ");
                if selector.is_empty() {
                    continue;
                }
                let entry = rules.entry(selector).or_default();
                for (prop, value) in &declarations {
                    entry.insert(prop.clone(), value.clone());
                }
            }
        }

        StyleSheet { rules }
    }

    /// Concatenated contents of every `<style>` element in `html`.
    pub fn from_document(html: &str) -> Self {
        let css: Vec<&str> = STYLE_BLOCK_RE
            .captures_iter(html)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect();
        Self::parse(&css.join("\n"))
    }

    pub fn get(&self, selector: &str, property: &str) -> Option<&str> {
        self.rules
            .get(selector)
            .and_then(|props| props.get(property))
            .map(String::as_str)
    }

    pub fn length(&self, selector: &str, property: &str) -> Option<f32> {
        self.get(selector, property).and_then(parse_length)
    }

    pub fn color(&self, selector: &str, property: &str) -> Option<Rgb> {
        self.get(selector, property).and_then(Rgb::parse)
    }

    /// Box shorthand (`margin`, `padding`) with longhand overrides such as
    /// `margin-top` applied on top.
    pub fn edges(&self, selector: &str, property: &str) -> Option<Edges> {
        let shorthand = self.get(selector, property).and_then(parse_edges);
        let top = self.length(selector, &format!("{property}-top"));
        let right = self.length(selector, &format!("{property}-right"));
        let bottom = self.length(selector, &format!("{property}-bottom"));
        let left = self.length(selector, &format!("{property}-left"));

        if shorthand.is_none() && [top, right, bottom, left].iter().all(Option::is_none) {
            return None;
        }
        let mut edges = shorthand.unwrap_or_default();
        edges.top = top.unwrap_or(edges.top);
        edges.right = right.unwrap_or(edges.right);
        edges.bottom = bottom.unwrap_or(edges.bottom);
        edges.left = left.unwrap_or(edges.left);
        Some(edges)
    }

    /// `border-*: 1px solid #999` as width and colour. `none` yields `None`.
    pub fn border(&self, selector: &str, property: &str) -> Option<(f32, Rgb)> {
        let value = self.get(selector, property)?;
        let mut width = None;
        let mut color = None;
        for token in value.split_whitespace() {
            if token.eq_ignore_ascii_case("none") {
                return None;
            }
            width = width.or_else(|| parse_length(token));
            color = color.or_else(|| Rgb::parse(token));
        }
        Some((width?, color.unwrap_or(Rgb::BLACK)))
    }

    /// A unitless `line-height` multiplier.
    pub fn line_height(&self, selector: &str) -> Option<f32> {
        self.get(selector, "line-height")?.trim().parse().ok()
    }

    /// Page geometry from the `@page` rule, falling back to US Letter with
    /// one-inch margins.
    pub fn page_layout(&self) -> PageLayout {
        let mut layout = PageLayout::letter();

        if let Some(size) = self.get("@page", "size") {
            let mut orientation = None;
            let mut lengths = Vec::new();
            for token in size.split_whitespace() {
                match token.to_ascii_lowercase().as_str() {
                    "landscape" => orientation = Some(PageOrientation::Landscape),
                    "portrait" => orientation = Some(PageOrientation::Portrait),
                    name => {
                        if let Some((w, h)) = named_page_size(name) {
                            layout.width = w;
                            layout.height = h;
                        } else if let Some(len) = parse_length(token) {
                            lengths.push(len);
                        }
                    }
                }
            }
            match lengths.as_slice() {
                [side] => {
                    layout.width = *side;
                    layout.height = *side;
                }
                [w, h] => {
                    layout.width = *w;
                    layout.height = *h;
                }
                _ => {}
            }
            if let Some(orientation) = orientation {
                layout = layout.oriented(orientation);
            }
        }

        if let Some(margin) = self.edges("@page", "margin") {
            layout.margin_top = margin.top;
            layout.margin_right = margin.right;
            layout.margin_bottom = margin.bottom;
            layout.margin_left = margin.left;
        }

        layout
    }
}

fn named_page_size(name: &str) -> Option<(f32, f32)> {
    match name {
        "letter" => Some((612.0, 792.0)),
        "legal" => Some((612.0, 1008.0)),
        "a4" => Some((595.28, 841.89)),
        "a5" => Some((419.53, 595.28)),
        _ => None,
    }
}

/// Resolved styling for one kind of block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockStyle {
    pub font_size: f32,
    pub color: Rgb,
    pub margin_top: f32,
    pub margin_bottom: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodeStyle {
    pub font_size: f32,
    pub background: Option<Rgb>,
    pub padding_x: f32,
    pub padding_y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListStyle {
    pub font_size: f32,
    pub margin: f32,
    /// Indentation per nesting level.
    pub indent: f32,
    pub item_gap: f32,
    pub checkbox_size: f32,
    pub checkbox_gap: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleStyle {
    pub width: f32,
    pub color: Rgb,
    pub margin: f32,
}

/// Everything the PDF generator needs to know about the look of a page.
///
/// Values missing from the stylesheet fall back to the usual browser
/// defaults (16px body text, `h1` at 2em and so on).
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub body: BlockStyle,
    pub line_height: f32,
    pub paragraph: BlockStyle,
    pub headings: [BlockStyle; 6],
    pub strong_color: Option<Rgb>,
    pub link_color: Rgb,
    pub code: CodeStyle,
    pub pre: BlockStyle,
    pub list: ListStyle,
    pub quote_indent: f32,
    pub rule: RuleStyle,
    pub table: TableStyle,
}

impl Default for Theme {
    fn default() -> Self {
        StyleSheet::default().theme()
    }
}

/// Browser default heading sizes and margins, in em.
const HEADING_DEFAULTS: [(f32, f32); 6] = [
    (2.0, 0.67),
    (1.5, 0.83),
    (1.17, 1.0),
    (1.0, 1.33),
    (0.83, 1.67),
    (0.67, 2.33),
];

impl StyleSheet {
    fn block(&self, selector: &str, inherited: &BlockStyle, size_em: f32, margin_em: f32) -> BlockStyle {
        let font_size = self
            .length(selector, "font-size")
            .unwrap_or(inherited.font_size * size_em);
        let margin = self.edges(selector, "margin");
        BlockStyle {
            font_size,
            color: self.color(selector, "color").unwrap_or(inherited.color),
            margin_top: margin.map_or(font_size * margin_em, |m| m.top),
            margin_bottom: margin.map_or(font_size * margin_em, |m| m.bottom),
        }
    }

    pub fn theme(&self) -> Theme {
        let body = BlockStyle {
            font_size: self.length("body", "font-size").unwrap_or(12.0),
            color: self.color("body", "color").unwrap_or(Rgb::BLACK),
            margin_top: 0.0,
            margin_bottom: 0.0,
        };
        let line_height = self.line_height("body").unwrap_or(1.2);

        let headings = std::array::from_fn(|i| {
            let (size_em, margin_em) = HEADING_DEFAULTS[i];
            self.block(&format!("h{}", i + 1), &body, size_em, margin_em)
        });

        let code_padding = self.edges("code", "padding").unwrap_or_default();
        let code = CodeStyle {
            font_size: self.length("code", "font-size").unwrap_or(body.font_size * 0.8125),
            background: self.color("code", "background-color"),
            padding_x: code_padding.left,
            padding_y: code_padding.top,
        };

        let list_margin = self.edges("ul", "margin");
        let checkbox = "input[type=\"checkbox\"]";
        let list = ListStyle {
            font_size: self.length("ul", "font-size").unwrap_or(body.font_size),
            margin: list_margin.map_or(body.font_size, |m| m.top),
            indent: self.length("ul", "padding-left").unwrap_or(30.0),
            item_gap: self.edges("li", "margin").map_or(0.0, |m| m.top),
            checkbox_size: self.length(checkbox, "width").unwrap_or(9.75),
            checkbox_gap: self.length(checkbox, "margin-right").unwrap_or(3.0),
        };

        let (rule_width, rule_color) = self
            .border("hr", "border-top")
            .unwrap_or((0.75, Rgb(0.5, 0.5, 0.5)));
        let rule = RuleStyle {
            width: rule_width,
            color: rule_color,
            margin: self.edges("hr", "margin").map_or(6.0, |m| m.top),
        };

        let cell_padding = self.edges("td", "padding").unwrap_or(Edges::uniform(0.75));
        let table_margin = self.edges("table", "margin").unwrap_or_default();
        let table = TableStyle {
            font_size: self.length("table", "font-size").unwrap_or(body.font_size),
            line_height,
            padding_x: cell_padding.left,
            padding_y: cell_padding.top,
            margin_top: table_margin.top,
            margin_bottom: table_margin.bottom,
            row_rule: self.border("td", "border-bottom"),
            header_rule: self.border("th", "border-top"),
            header_background: self.color("th", "background-color"),
            header_color: self.color("th", "color").unwrap_or(body.color),
            text_color: self.color("td", "color").unwrap_or(body.color),
        };

        Theme {
            body,
            line_height,
            paragraph: self.block("p", &body, 1.0, 1.0),
            headings,
            strong_color: self.color("strong", "color"),
            link_color: self.color("a", "color").unwrap_or(Rgb(0.0, 0.0, 0.93)),
            code,
            pre: self.block("pre", &body, 1.0, 1.0),
            list,
            quote_indent: self.length("blockquote", "margin-left").unwrap_or(30.0),
            rule,
            table,
        }
    }
}
