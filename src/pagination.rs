//! Pagination – splits laid-out boxes into pages and converts them from CSS
//! pixels to page-absolute PDF points.
//!
//! Handles:
//! - page size, orientation, margins and scale from [`PrintOptions`]
//! - table row splitting across pages (rows are never cut)
//! - containers taller than a page, whose children paginate individually

use crate::engine::PrintOptions;
use crate::fonts::measure_text_width;
use crate::layout::{BoxKind, PositionedBox};
use crate::layout_config::*;
use crate::style::{ComputedStyle, TextAlign};

/// CSS pixels are 1/96 inch, PDF points 1/72 inch.
const PT_PER_PX: f32 = 0.75;

/// Font size of the header and footer band, in points.
const BAND_FONT_SIZE: f32 = 8.0;

/// Printable area of a page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub page_width_pt: f32,
    pub page_height_pt: f32,
    pub margin_top_pt: f32,
    pub margin_bottom_pt: f32,
    pub margin_left_pt: f32,
    pub margin_right_pt: f32,
    pub scale: f32,
}

impl PageGeometry {
    pub fn from_options(options: &PrintOptions) -> Self {
        Self {
            page_width_pt: options.page_width_pt(),
            page_height_pt: options.page_height_pt(),
            margin_top_pt: options.margin_top * 72.0,
            margin_bottom_pt: options.margin_bottom * 72.0,
            margin_left_pt: options.margin_left * 72.0,
            margin_right_pt: options.margin_right * 72.0,
            scale: options.scale,
        }
    }

    /// Points per layout pixel.
    pub fn px_to_pt(&self) -> f32 {
        PT_PER_PX * self.scale
    }

    /// Width available to layout, in CSS pixels.
    pub fn content_width_px(&self) -> f32 {
        (self.page_width_pt - self.margin_left_pt - self.margin_right_pt) / self.px_to_pt()
    }

    /// Height of one page's content area, in CSS pixels.
    pub fn content_height_px(&self) -> f32 {
        (self.page_height_pt - self.margin_top_pt - self.margin_bottom_pt) / self.px_to_pt()
    }

    /// Header and footer band centred in the top and bottom margins.
    pub fn header_footer(&self, title: &str, date: &str) -> HeaderFooter {
        HeaderFooter {
            date: date.to_string(),
            title: title.to_string(),
            font_size: BAND_FONT_SIZE,
            header_y: self.margin_top_pt / 2.0,
            footer_y: self.page_height_pt - self.margin_bottom_pt / 2.0,
            left_x: self.margin_left_pt,
            right_x: self.page_width_pt - self.margin_right_pt,
        }
    }
}

struct Paginator<'a> {
    geometry: &'a PageGeometry,
    content_height: f32,
    pages: Vec<PageLayout>,
    current: Vec<LayoutBox>,
    /// Document y at which the current page begins.
    page_start: f32,
}

impl<'a> Paginator<'a> {
    fn new(geometry: &'a PageGeometry) -> Self {
        Self {
            geometry,
            content_height: geometry.content_height_px(),
            pages: Vec::new(),
            current: Vec::new(),
            page_start: 0.0,
        }
    }

    fn overflows(&self, pbox: &PositionedBox) -> bool {
        pbox.bottom() - self.page_start > self.content_height
    }

    fn new_page(&mut self, start: f32) {
        let boxes = std::mem::take(&mut self.current);
        self.pages.push(PageLayout {
            page_index: self.pages.len(),
            boxes,
        });
        self.page_start = start;
    }

    fn place(&mut self, pbox: &PositionedBox) {
        let splittable = pbox.kind == BoxKind::Block
            && !pbox.children.is_empty()
            && pbox.height > self.content_height;
        if splittable {
            self.emit_decoration(pbox, pbox.y, pbox.bottom());
            for child in &pbox.children {
                self.place(child);
            }
            return;
        }
        if pbox.kind == BoxKind::Table && self.overflows(pbox) {
            self.split_table(pbox);
            return;
        }
        if self.overflows(pbox) && !self.current.is_empty() {
            self.new_page(pbox.y);
        }
        self.emit_tree(pbox);
    }

    /// Place table rows one by one, framing each page's share of the table.
    fn split_table(&mut self, table: &PositionedBox) {
        let mut segment: Vec<&PositionedBox> = Vec::new();
        for row in &table.children {
            if self.overflows(row) && !(self.current.is_empty() && segment.is_empty()) {
                self.flush_segment(table, &mut segment);
                self.new_page(row.y);
            }
            segment.push(row);
        }
        self.flush_segment(table, &mut segment);
    }

    fn flush_segment(&mut self, table: &PositionedBox, segment: &mut Vec<&PositionedBox>) {
        let (Some(first), Some(last)) = (segment.first(), segment.last()) else {
            return;
        };
        let inset = table.style.border_width + table.style.padding_top();
        self.emit_decoration(table, first.y - inset, last.bottom() + inset);
        for row in segment.drain(..) {
            self.emit_tree(row);
        }
    }

    fn emit_tree(&mut self, pbox: &PositionedBox) {
        match pbox.kind {
            BoxKind::Text | BoxKind::Cell => self.emit_text_box(pbox),
            _ => self.emit_decoration(pbox, pbox.y, pbox.bottom()),
        }
        for child in &pbox.children {
            self.emit_tree(child);
        }
    }

    /// Background and border of `pbox` between document rows `top` and
    /// `bottom`.
    fn emit_decoration(&mut self, pbox: &PositionedBox, top: f32, bottom: f32) {
        if let Some(lb) = self.decorated_box(pbox, top, bottom) {
            self.current.push(lb);
        }
    }

    fn decorated_box(&self, pbox: &PositionedBox, top: f32, bottom: f32) -> Option<LayoutBox> {
        let style = &pbox.style;
        let has_background = !style.background_color.is_transparent();
        let has_border = style.border_width > 0.0;
        if pbox.kind == BoxKind::Row || (!has_background && !has_border) {
            return None;
        }
        let k = self.geometry.px_to_pt();
        let top = top.max(self.page_start);
        let mut lb = LayoutBox::new(
            self.geometry.margin_left_pt + pbox.x * k,
            self.geometry.margin_top_pt + (top - self.page_start) * k,
            pbox.width * k,
            (bottom - top).max(0.0) * k,
        );
        if has_background {
            lb.background_color = Some(style.background_color.to_array());
        }
        if has_border {
            lb.border = Some(BorderStyle {
                width: style.border_width * k,
                color: style.border_color.to_array(),
            });
        }
        Some(lb)
    }

    fn emit_text_box(&mut self, pbox: &PositionedBox) {
        let k = self.geometry.px_to_pt();
        let mut lb = self
            .decorated_box(pbox, pbox.y, pbox.bottom())
            .unwrap_or_else(|| {
                LayoutBox::new(
                    self.geometry.margin_left_pt + pbox.x * k,
                    self.geometry.margin_top_pt + (pbox.y - self.page_start) * k,
                    pbox.width * k,
                    pbox.height * k,
                )
            });
        if !pbox.lines.is_empty() {
            lb.text = Some(text_content(pbox, k));
        }
        if lb.text.is_some() || lb.background_color.is_some() || lb.border.is_some() {
            self.current.push(lb);
        }
    }

    fn finish(mut self) -> Vec<PageLayout> {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.new_page(0.0);
        }
        self.pages
    }
}

fn text_content(pbox: &PositionedBox, k: f32) -> TextContent {
    let style: &ComputedStyle = &pbox.style;
    let left = style.padding_left() + style.border_width;
    let inner_width = pbox.width - left - style.padding_right() - style.border_width;
    let top = style.padding_top() + style.border_width;
    let line_height = pbox.line_height();

    let lines = pbox
        .lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let free = (inner_width - measure_text_width(line, style.font_size, style.bold)).max(0.0);
            let align = match style.text_align {
                TextAlign::Left => 0.0,
                TextAlign::Center => free / 2.0,
                TextAlign::Right => free,
            };
            TextLine {
                text: line.clone(),
                x_offset: (left + align) * k,
                y_offset: (top + i as f32 * line_height) * k,
            }
        })
        .collect();

    TextContent {
        lines,
        font_size: style.font_size * k,
        bold: style.bold,
        color: style.color.to_array(),
        line_height: line_height * k,
    }
}

/// Convert laid-out boxes into a paginated [`PrintLayout`].
///
/// An empty document still yields one (blank) page.
pub fn paginate(boxes: &[PositionedBox], geometry: &PageGeometry, title: &str) -> PrintLayout {
    let mut paginator = Paginator::new(geometry);
    for pbox in boxes {
        paginator.place(pbox);
    }
    PrintLayout {
        title: title.to_string(),
        page_width_pt: geometry.page_width_pt,
        page_height_pt: geometry.page_height_pt,
        print_background: true,
        header_footer: None,
        pages: paginator.finish(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;
    use crate::layout::compute_layout;

    fn paginate_html(html: &str, options: &PrintOptions) -> PrintLayout {
        let geometry = PageGeometry::from_options(options);
        let boxes = compute_layout(&parse_html(html), geometry.content_width_px()).unwrap();
        paginate(&boxes, &geometry, "Report")
    }

    fn table_html(rows: usize) -> String {
        let mut html = String::from("<table border=\"1\">");
        for i in 0..rows {
            html.push_str(&format!("<tr><td>{}</td><td>Row number {}</td></tr>", i, i));
        }
        html.push_str("</table>");
        html
    }

    #[test]
    fn letter_geometry() {
        let g = PageGeometry::from_options(&PrintOptions::default());
        assert_eq!(g.page_width_pt, 612.0);
        // 7.7in of content at 96 px per inch.
        assert!((g.content_width_px() - 739.2).abs() < 0.01);
    }

    #[test]
    fn empty_document_is_one_blank_page() {
        let layout = paginate(&[], &PageGeometry::from_options(&PrintOptions::default()), "");
        assert_eq!(layout.page_count(), 1);
        assert!(layout.pages[0].boxes.is_empty());
    }

    #[test]
    fn single_page() {
        let layout = paginate_html("<p>Short text</p>", &PrintOptions::default());
        assert_eq!(layout.page_count(), 1);
        assert_eq!(layout.text_lines().collect::<Vec<_>>(), vec!["Short text"]);
    }

    #[test]
    fn long_table_splits_between_rows() {
        let layout = paginate_html(&table_html(120), &PrintOptions::default());
        assert!(layout.page_count() > 1, "Expected multiple pages, got {}", layout.page_count());

        // Every row printed exactly once, in order.
        let lines: Vec<&str> = layout.text_lines().collect();
        assert_eq!(lines.len(), 240);
        assert_eq!(lines[0], "0");
        assert_eq!(lines[239], "Row number 119");

        // Nothing runs into the bottom margin.
        let g = PageGeometry::from_options(&PrintOptions::default());
        for page in &layout.pages {
            for b in &page.boxes {
                assert!(b.y + b.height <= g.page_height_pt - g.margin_bottom_pt + 1.0);
            }
        }
    }

    #[test]
    fn landscape_fits_more_columns_fewer_rows() {
        let portrait = paginate_html(&table_html(120), &PrintOptions::default());
        let landscape = paginate_html(
            &table_html(120),
            &PrintOptions {
                landscape: true,
                ..PrintOptions::default()
            },
        );
        assert!(landscape.page_count() > portrait.page_count());
        assert_eq!(landscape.page_width_pt, 792.0);
    }

    #[test]
    fn scale_shrinks_content() {
        let small = paginate_html(
            &table_html(120),
            &PrintOptions {
                scale: 0.5,
                ..PrintOptions::default()
            },
        );
        let normal = paginate_html(&table_html(120), &PrintOptions::default());
        assert!(small.page_count() < normal.page_count());
    }

    #[test]
    fn centred_text_is_offset() {
        let layout = paginate_html("<p style=\"text-align: center\">x</p>", &PrintOptions::default());
        let text = layout.pages[0].boxes[0].text.as_ref().unwrap();
        assert!(text.lines[0].x_offset > 100.0);
    }

    #[test]
    fn header_footer_band_sits_in_margins() {
        let g = PageGeometry::from_options(&PrintOptions::report());
        let band = g.header_footer("Report", "1/2/26");
        assert!(band.header_y < g.margin_top_pt);
        assert!(band.footer_y > g.page_height_pt - g.margin_bottom_pt);
        assert_eq!(band.title, "Report");
    }
}
