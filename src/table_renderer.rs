//! Table layout for PDF generation
//!
//! Tables are measured before anything is drawn so rows can be kept whole
//! across page breaks. The measuring strategy sits behind [`TableRenderer`].

use crate::elements::TableAlignment;
use crate::pdf_generator::{Font, text_width};
use crate::stylesheet::Rgb;

/// Configuration for table styling
#[derive(Debug, Clone, PartialEq)]
pub struct TableStyle {
    pub font_size: f32,
    /// Unitless line-height multiplier.
    pub line_height: f32,
    /// Horizontal padding inside each cell (in points)
    pub padding_x: f32,
    /// Vertical padding inside each cell (in points)
    pub padding_y: f32,
    /// Margin above the table (in points)
    pub margin_top: f32,
    /// Margin below the table (in points)
    pub margin_bottom: f32,
    /// Rule under every row, width and colour.
    pub row_rule: Option<(f32, Rgb)>,
    /// Extra rule above header rows.
    pub header_rule: Option<(f32, Rgb)>,
    pub header_background: Option<Rgb>,
    pub header_color: Rgb,
    pub text_color: Rgb,
}

impl Default for TableStyle {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            line_height: 1.2,
            padding_x: 0.75,
            padding_y: 0.75,
            margin_top: 0.0,
            margin_bottom: 0.0,
            row_rule: None,
            header_rule: None,
            header_background: None,
            header_color: Rgb::BLACK,
            text_color: Rgb::BLACK,
        }
    }
}

impl TableStyle {
    pub fn line_advance(&self) -> f32 {
        self.font_size * self.line_height
    }
}

/// Represents a single table cell with its content and alignment
#[derive(Debug, Clone, PartialEq)]
pub struct TableCell {
    pub content: String,
    pub alignment: TableAlignment,
}

impl TableCell {
    pub fn new(content: String, alignment: TableAlignment) -> Self {
        Self { content, alignment }
    }

    pub fn left(content: &str) -> Self {
        Self::new(content.to_string(), TableAlignment::Left)
    }

    pub fn center(content: &str) -> Self {
        Self::new(content.to_string(), TableAlignment::Center)
    }

    pub fn right(content: &str) -> Self {
        Self::new(content.to_string(), TableAlignment::Right)
    }
}

/// Represents a table row containing multiple cells
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
    pub is_header: bool,
}

impl TableRow {
    pub fn new(cells: Vec<TableCell>) -> Self {
        Self {
            cells,
            is_header: false,
        }
    }

    pub fn header(mut self, is_header: bool) -> Self {
        self.is_header = is_header;
        self
    }

    /// Header rows are set in bold, everything else in the regular face.
    pub fn font(&self) -> Font {
        if self.is_header { Font::Bold } else { Font::Regular }
    }

    /// Create a row from strings with default left alignment
    pub fn from_strings(cells: &[&str]) -> Self {
        Self::new(cells.iter().map(|s| TableCell::left(s)).collect())
    }
}

/// Measured table dimensions for layout
#[derive(Debug, Clone)]
pub struct TableDimensions {
    pub column_widths: Vec<f32>,
    pub row_heights: Vec<f32>,
    pub total_width: f32,
    pub total_height: f32,
    pub num_cols: usize,
    pub num_rows: usize,
}

/// Line wrapping result for a cell
#[derive(Debug, Clone)]
pub struct WrappedLines {
    pub lines: Vec<String>,
    pub line_count: usize,
}

impl WrappedLines {
    pub fn new(lines: Vec<String>) -> Self {
        let line_count = lines.len();
        Self { lines, line_count }
    }

    pub fn empty() -> Self {
        Self::new(vec![String::new()])
    }
}

/// Trait for table rendering strategies
///
/// This allows different table rendering implementations to be plugged in.
pub trait TableRenderer {
    /// Calculate the dimensions of a table before rendering
    fn calculate_dimensions(&self, rows: &[TableRow], style: &TableStyle, max_width: f32) -> TableDimensions;

    /// Wrap text into lines no wider than `max_width` points when set in
    /// `font` at `font_size`
    fn wrap_text(&self, text: &str, font: Font, font_size: f32, max_width: f32) -> WrappedLines;

    /// Calculate the X position for text based on alignment
    fn calculate_text_x(
        &self,
        alignment: &TableAlignment,
        cell_x: f32,
        cell_width: f32,
        text_width: f32,
        padding: f32,
    ) -> f32;

    /// Width left for text in a column of `column_width` points.
    fn text_area(&self, column_width: f32, style: &TableStyle) -> f32 {
        (column_width - style.padding_x * 2.0).max(0.0)
    }
}

/// Default implementation of table rendering
///
/// Columns get their natural width and are then scaled so the table spans
/// the full content width.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTableRenderer;

impl TableRenderer for DefaultTableRenderer {
    fn calculate_dimensions(&self, rows: &[TableRow], style: &TableStyle, max_width: f32) -> TableDimensions {
        if rows.is_empty() {
            return TableDimensions {
                column_widths: vec![],
                row_heights: vec![],
                total_width: 0.0,
                total_height: 0.0,
                num_cols: 0,
                num_rows: 0,
            };
        }

        let num_cols = rows.iter().map(|r| r.cells.len()).max().unwrap_or(0);
        let num_rows = rows.len();
        let min_width = style.padding_x * 2.0 + text_width("0", Font::Regular, style.font_size);

        // Natural column widths, measured in the face each row is drawn in
        let mut col_widths: Vec<f32> = vec![min_width; num_cols];
        for row in rows {
            let font = row.font();
            for (col_idx, cell) in row.cells.iter().enumerate() {
                let cell_width = text_width(&cell.content, font, style.font_size) + style.padding_x * 2.0;
                col_widths[col_idx] = col_widths[col_idx].max(cell_width);
            }
        }

        // Scale to the available width
        let natural: f32 = col_widths.iter().sum();
        if natural > 0.0 {
            let scale = max_width / natural;
            for width in &mut col_widths {
                *width *= scale;
            }
        }

        let row_heights: Vec<f32> = rows
            .iter()
            .map(|row| {
                let max_lines = row
                    .cells
                    .iter()
                    .enumerate()
                    .map(|(col_idx, cell)| {
                        let area = self.text_area(col_widths[col_idx], style);
                        self.wrap_text(&cell.content, row.font(), style.font_size, area)
                            .line_count
                    })
                    .max()
                    .unwrap_or(1)
                    .max(1);
                max_lines as f32 * style.line_advance() + style.padding_y * 2.0
            })
            .collect();

        let total_width: f32 = col_widths.iter().sum();
        let total_height: f32 = row_heights.iter().sum();

        TableDimensions {
            column_widths: col_widths,
            row_heights,
            total_width,
            total_height,
            num_cols,
            num_rows,
        }
    }

    fn wrap_text(&self, text: &str, font: Font, font_size: f32, max_width: f32) -> WrappedLines {
        let fits = |line: &str| text_width(line, font, font_size) <= max_width;
        if fits(text) {
            return WrappedLines::new(vec![text.to_string()]);
        }

        let mut lines = Vec::new();
        let mut current_line = String::new();

        for word in text.split_whitespace() {
            // Words wider than a whole line are split hard, at least one
            // character per line.
            if !fits(word) {
                if !current_line.is_empty() {
                    lines.push(std::mem::take(&mut current_line));
                }
                for c in word.chars() {
                    current_line.push(c);
                    if !fits(&current_line) && current_line.chars().count() > 1 {
                        current_line.pop();
                        lines.push(std::mem::take(&mut current_line));
                        current_line.push(c);
                    }
                }
                continue;
            }

            if current_line.is_empty() {
                current_line.push_str(word);
                continue;
            }

            let candidate = format!("{current_line} {word}");
            if fits(&candidate) {
                current_line = candidate;
            } else {
                lines.push(std::mem::replace(&mut current_line, word.to_string()));
            }
        }

        if !current_line.is_empty() {
            lines.push(current_line);
        }

        if lines.is_empty() {
            return WrappedLines::empty();
        }

        WrappedLines::new(lines)
    }

    fn calculate_text_x(
        &self,
        alignment: &TableAlignment,
        cell_x: f32,
        cell_width: f32,
        text_width: f32,
        padding: f32,
    ) -> f32 {
        match alignment {
            TableAlignment::Left => cell_x + padding,
            TableAlignment::Center => cell_x + (cell_width - text_width) / 2.0,
            TableAlignment::Right => cell_x + cell_width - padding - text_width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn styled() -> TableStyle {
        TableStyle {
            font_size: 10.0,
            line_height: 1.5,
            padding_x: 4.0,
            padding_y: 6.0,
            ..TableStyle::default()
        }
    }

    #[test]
    fn test_table_cell_creation() {
        let cell = TableCell::left("test");
        assert_eq!(cell.content, "test");
        assert!(matches!(cell.alignment, TableAlignment::Left));
    }

    #[test]
    fn test_table_row_from_strings() {
        let row = TableRow::from_strings(&["A", "B", "C"]);
        assert_eq!(row.cells.len(), 3);
        assert_eq!(row.cells[0].content, "A");
        assert!(!row.is_header);
        assert!(row.header(true).is_header);
    }

    #[test]
    fn test_text_wrapping() {
        let renderer = DefaultTableRenderer;
        // Courier at 10pt is 6pt per character, so 60pt holds ten
        let wrapped = renderer.wrap_text("hello world test", Font::Mono, 10.0, 60.0);
        assert_eq!(wrapped.lines, vec!["hello", "world test"]);
    }

    #[test]
    fn test_text_wrapping_single_word() {
        let renderer = DefaultTableRenderer;
        let wrapped = renderer.wrap_text("hello", Font::Mono, 10.0, 60.0);
        assert_eq!(wrapped.line_count, 1);
        assert_eq!(wrapped.lines[0], "hello");
    }

    #[test]
    fn test_text_wrapping_splits_long_words() {
        let renderer = DefaultTableRenderer;
        let wrapped = renderer.wrap_text("abcdefghij xy", Font::Mono, 10.0, 24.0);
        assert_eq!(wrapped.lines, vec!["abcd", "efgh", "ij", "xy"]);
    }

    #[test]
    fn test_calculate_text_x_left() {
        let renderer = DefaultTableRenderer;
        let x = renderer.calculate_text_x(&TableAlignment::Left, 100.0, 50.0, 20.0, 10.0);
        assert_eq!(x, 110.0); // 100 + 10
    }

    #[test]
    fn test_calculate_text_x_center() {
        let renderer = DefaultTableRenderer;
        let x = renderer.calculate_text_x(&TableAlignment::Center, 100.0, 50.0, 20.0, 10.0);
        assert_eq!(x, 115.0); // 100 + (50 - 20) / 2
    }

    #[test]
    fn test_calculate_text_x_right() {
        let renderer = DefaultTableRenderer;
        let x = renderer.calculate_text_x(&TableAlignment::Right, 100.0, 50.0, 20.0, 10.0);
        assert_eq!(x, 120.0); // 100 + 50 - 10 - 20
    }

    #[test]
    fn test_table_dimensions_empty() {
        let renderer = DefaultTableRenderer;
        let dims = renderer.calculate_dimensions(&[], &TableStyle::default(), 400.0);
        assert_eq!(dims.num_cols, 0);
        assert_eq!(dims.num_rows, 0);
    }

    #[test]
    fn test_table_spans_available_width() {
        let renderer = DefaultTableRenderer;
        let rows = vec![
            TableRow::from_strings(&["Name", "Age"]).header(true),
            TableRow::from_strings(&["John", "25"]),
        ];
        let dims = renderer.calculate_dimensions(&rows, &styled(), 400.0);
        assert_eq!(dims.num_cols, 2);
        assert!((dims.total_width - 400.0).abs() < 0.01);
        assert!(dims.column_widths[0] > dims.column_widths[1]);
        // one line of 15pt plus 6pt padding top and bottom
        assert!((dims.row_heights[0] - 27.0).abs() < 0.01);
    }

    #[test]
    fn test_column_widths_follow_glyph_widths() {
        let renderer = DefaultTableRenderer;
        let rows = vec![TableRow::from_strings(&["iiii", "WWWW"])];
        let dims = renderer.calculate_dimensions(&rows, &styled(), 400.0);
        assert!(dims.column_widths[0] < dims.column_widths[1]);
    }

    #[test]
    fn test_wide_bold_headers_stay_inside_their_columns() {
        let renderer = DefaultTableRenderer;
        let style = styled();
        let rows = vec![
            TableRow::from_strings(&["WWWWWWWWWW", "MMMMMMMMMM"]).header(true),
            TableRow::from_strings(&["a", "b"]),
        ];
        let dims = renderer.calculate_dimensions(&rows, &style, 150.0);

        for row in &rows {
            for (cell, &width) in row.cells.iter().zip(&dims.column_widths) {
                let area = renderer.text_area(width, &style);
                let wrapped = renderer.wrap_text(&cell.content, row.font(), style.font_size, area);
                for line in &wrapped.lines {
                    assert!(text_width(line, row.font(), style.font_size) <= area + 0.01, "{line}");
                }
            }
        }
        // the header wraps onto a second line
        assert!((dims.row_heights[0] - (2.0 * 15.0 + 12.0)).abs() < 0.01);
    }

    #[test]
    fn test_ragged_rows_and_wrapped_height() {
        let renderer = DefaultTableRenderer;
        let long = "word ".repeat(40);
        let rows = vec![
            TableRow::from_strings(&["a"]),
            TableRow::from_strings(&["b", long.trim()]),
        ];
        let dims = renderer.calculate_dimensions(&rows, &styled(), 200.0);
        assert_eq!(dims.num_cols, 2);
        assert!(dims.row_heights[1] > dims.row_heights[0]);
        assert!((dims.total_height - dims.row_heights.iter().sum::<f32>()).abs() < 0.01);
    }
}
