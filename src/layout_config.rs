//! Print layout – the frozen result of pagination, describing exactly what
//! goes on each page. Coordinates are PDF points measured from the top-left
//! corner of the physical page.

use serde::{Deserialize, Serialize};

/// A complete paginated document ready for the PDF writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintLayout {
    /// Document title, used for the PDF metadata and the page header.
    pub title: String,
    pub page_width_pt: f32,
    pub page_height_pt: f32,
    /// Whether background fills are painted.
    pub print_background: bool,
    /// Header/footer band; `None` when disabled.
    pub header_footer: Option<HeaderFooter>,
    pub pages: Vec<PageLayout>,
}

/// Text printed in the page margins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderFooter {
    /// Printed at the top left of every page.
    pub date: String,
    /// Printed centred at the top of every page.
    pub title: String,
    pub font_size: f32,
    /// Vertical centre of the header band.
    pub header_y: f32,
    /// Vertical centre of the footer band.
    pub footer_y: f32,
    pub left_x: f32,
    pub right_x: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_index: usize,
    pub boxes: Vec<LayoutBox>,
}

/// A positioned rectangle with optional decoration and text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub background_color: Option<[f32; 4]>,
    pub border: Option<BorderStyle>,
    pub text: Option<TextContent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorderStyle {
    pub width: f32,
    pub color: [f32; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub lines: Vec<TextLine>,
    pub font_size: f32,
    pub bold: bool,
    pub color: [f32; 4],
    pub line_height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    /// Offset from the box's left edge, alignment already applied.
    pub x_offset: f32,
    /// Offset of the line top from the box's top edge.
    pub y_offset: f32,
}

impl PrintLayout {
    /// A layout with a single empty page.
    pub fn blank(title: &str, page_width_pt: f32, page_height_pt: f32) -> Self {
        Self {
            title: title.to_string(),
            page_width_pt,
            page_height_pt,
            print_background: false,
            header_footer: None,
            pages: vec![PageLayout {
                page_index: 0,
                boxes: Vec::new(),
            }],
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// All text of the document in page order, one entry per line.
    pub fn text_lines(&self) -> impl Iterator<Item = &str> {
        self.pages
            .iter()
            .flat_map(|p| p.boxes.iter())
            .filter_map(|b| b.text.as_ref())
            .flat_map(|t| t.lines.iter().map(|l| l.text.as_str()))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl LayoutBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            background_color: None,
            border: None,
            text: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_keeps_page_structure() {
        let mut layout = PrintLayout::blank("Report", 612.0, 792.0);
        let mut b = LayoutBox::new(10.0, 20.0, 100.0, 12.0);
        b.text = Some(TextContent {
            lines: vec![TextLine {
                text: "Name".to_string(),
                x_offset: 0.0,
                y_offset: 0.0,
            }],
            font_size: 9.0,
            bold: false,
            color: [0.0, 0.0, 0.0, 1.0],
            line_height: 10.8,
        });
        layout.pages[0].boxes.push(b);

        let json = layout.to_json().unwrap();
        assert!(json.contains("\"title\": \"Report\""));
        let back = PrintLayout::from_json(&json).unwrap();
        assert_eq!(back.text_lines().collect::<Vec<_>>(), vec!["Name"]);
    }
}
