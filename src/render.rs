//! PDF writer – turns a [`PrintLayout`] into PDF bytes using `printpdf`
//! (v0.8 ops-based API) and the builtin Helvetica faces.

use printpdf::*;

use crate::fonts::measure_text_width;
use crate::layout_config::*;

const BLACK: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Render a paginated layout into PDF bytes.
pub fn render_pdf(layout: &PrintLayout) -> Result<Vec<u8>, String> {
    if layout.page_width_pt <= 0.0 || layout.page_height_pt <= 0.0 {
        return Err(format!(
            "invalid page size {}x{} pt",
            layout.page_width_pt, layout.page_height_pt
        ));
    }
    let page_w = Mm(layout.page_width_pt * 0.352778); // pt → mm
    let page_h = Mm(layout.page_height_pt * 0.352778);

    let mut doc = PdfDocument::new(&layout.title);
    let total = layout.pages.len().max(1);
    let mut pages = Vec::with_capacity(total);

    for page_layout in &layout.pages {
        let mut ops = Vec::new();
        for lbox in &page_layout.boxes {
            render_box(&mut ops, lbox, layout.page_height_pt, layout.print_background);
        }
        if let Some(band) = &layout.header_footer {
            render_band(
                &mut ops,
                band,
                layout.page_width_pt,
                layout.page_height_pt,
                page_layout.page_index + 1,
                total,
            );
        }
        pages.push(PdfPage::new(page_w, page_h, ops));
    }

    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    doc.with_pages(pages);
    let bytes = doc.save(&PdfSaveOptions::default(), &mut Vec::new());
    Ok(bytes)
}

fn color(c: [f32; 4]) -> Color {
    Color::Rgb(Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

/// Corners of a rectangle in PDF space (origin bottom-left).
fn rect_points(x1: f32, y1: f32, x2: f32, y2: f32) -> Vec<LinePoint> {
    vec![point(x1, y2), point(x2, y2), point(x2, y1), point(x1, y1)]
}

/// Convert a UTF-8 string to raw Windows-1252 bytes then wrap in a String so
/// printpdf writes the bytes unchanged into the PDF stream (builtin fonts use
/// WinAnsiEncoding, so each glyph is one byte 0x00–0xFF).
fn to_winlatin(s: &str) -> String {
    if s.is_ascii() {
        return s.to_string();
    }
    let bytes: Vec<u8> = s
        .chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2122}' => 0x99,
            '\u{00A0}' => 0x20,
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect();
    // SAFETY: intentionally non-UTF-8 for the 0x80-0xFF range; printpdf
    // passes these bytes straight to the PDF stream, decoded by
    // WinAnsiEncoding.
    #[allow(unsafe_code)]
    unsafe {
        String::from_utf8_unchecked(bytes)
    }
}

fn write_text(ops: &mut Vec<Op>, x: f32, baseline: f32, size: f32, font: BuiltinFont, fill: [f32; 4], text: &str) {
    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point {
            x: Pt(x),
            y: Pt(baseline),
        },
    });
    ops.push(Op::SetFontSizeBuiltinFont {
        size: Pt(size),
        font,
    });
    ops.push(Op::SetFillColor { col: color(fill) });
    ops.push(Op::WriteTextBuiltinFont {
        items: vec![TextItem::Text(to_winlatin(text))],
        font,
    });
    ops.push(Op::EndTextSection);
}

fn render_box(ops: &mut Vec<Op>, lbox: &LayoutBox, page_height: f32, print_background: bool) {
    // Layout origin is top-left, PDF origin bottom-left.
    let top = page_height - lbox.y;
    let bottom = top - lbox.height;
    let (left, right) = (lbox.x, lbox.x + lbox.width);

    if print_background {
        if let Some(bg) = lbox.background_color {
            ops.push(Op::SetFillColor { col: color(bg) });
            ops.push(Op::DrawPolygon {
                polygon: Polygon {
                    rings: vec![PolygonRing {
                        points: rect_points(left, bottom, right, top),
                    }],
                    mode: PaintMode::Fill,
                    winding_order: WindingOrder::NonZero,
                },
            });
        }
    }

    if let Some(border) = &lbox.border {
        // Stroke along the middle of the border so it stays inside the box.
        let half = border.width / 2.0;
        ops.push(Op::SetOutlineColor {
            col: color(border.color),
        });
        ops.push(Op::SetOutlineThickness {
            pt: Pt(border.width),
        });
        ops.push(Op::DrawLine {
            line: Line {
                points: rect_points(left + half, bottom + half, right - half, top - half),
                is_closed: true,
            },
        });
    }

    if let Some(text) = &lbox.text {
        let font = if text.bold {
            BuiltinFont::HelveticaBold
        } else {
            BuiltinFont::Helvetica
        };
        // Baseline ≈ half-leading + ascender (approx 0.75 × font_size).
        let ascent = (text.line_height - text.font_size) / 2.0 + text.font_size * 0.75;
        for line in &text.lines {
            if line.text.is_empty() {
                continue;
            }
            write_text(
                ops,
                left + line.x_offset,
                top - line.y_offset - ascent,
                text.font_size,
                font,
                text.color,
                &line.text,
            );
        }
    }
}

fn render_band(
    ops: &mut Vec<Op>,
    band: &HeaderFooter,
    page_width: f32,
    page_height: f32,
    page_number: usize,
    total: usize,
) {
    let size = band.font_size;
    let font = BuiltinFont::Helvetica;
    let offset = size * 0.35;

    if !band.date.is_empty() {
        write_text(ops, band.left_x, page_height - band.header_y - offset, size, font, BLACK, &band.date);
    }
    if !band.title.is_empty() {
        let w = measure_text_width(&band.title, size, false);
        let x = ((page_width - w) / 2.0).max(band.left_x);
        write_text(ops, x, page_height - band.header_y - offset, size, font, BLACK, &band.title);
    }
    let counter = format!("{page_number} / {total}");
    let w = measure_text_width(&counter, size, false);
    write_text(ops, band.right_x - w, page_height - band.footer_y - offset, size, font, BLACK, &counter);
}
