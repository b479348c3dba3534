//! Style resolver – user-agent defaults per tag, presentational table
//! attributes and inline `style` declarations folded into a flat
//! [`ComputedStyle`].
//!
//! Lengths are CSS pixels. Stylesheets (`<style>` blocks) are not applied.

use crate::dom::{ElementNode, Tag};

/// Resolved style for one element.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    // Typography (inherited)
    pub font_size: f32,
    pub bold: bool,
    pub color: Color,
    pub text_align: TextAlign,
    pub line_height: f32,

    // Box (not inherited)
    pub width: Dimension,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub padding: [f32; 4],
    pub border_width: f32,
    pub border_color: Color,
    pub background_color: Color,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            font_size: 16.0,
            bold: false,
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: 1.2,
            width: Dimension::Auto,
            margin_top: 0.0,
            margin_bottom: 0.0,
            padding: [0.0; 4],
            border_width: 0.0,
            border_color: Color::GRAY,
            background_color: Color::TRANSPARENT,
        }
    }
}

impl ComputedStyle {
    pub fn padding_top(&self) -> f32 {
        self.padding[0]
    }
    pub fn padding_right(&self) -> f32 {
        self.padding[1]
    }
    pub fn padding_bottom(&self) -> f32 {
        self.padding[2]
    }
    pub fn padding_left(&self) -> f32 {
        self.padding[3]
    }

    /// Copy of the inherited text properties only.
    fn inherit(&self) -> Self {
        Self {
            font_size: self.font_size,
            bold: self.bold,
            color: self.color,
            text_align: self.text_align,
            line_height: self.line_height,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Auto,
    Px(f32),
    Percent(f32),
}

impl Dimension {
    /// Resolve against the containing width.
    pub fn resolve(self, containing: f32) -> Option<f32> {
        match self {
            Dimension::Auto => None,
            Dimension::Px(v) => Some(v.min(containing)),
            Dimension::Percent(p) => Some(containing * p / 100.0),
        }
    }
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const GRAY: Self = Self::rgb(0.5, 0.5, 0.5);
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Parse `#rgb`, `#rrggbb`, `rgb(r, g, b)` or a basic colour keyword.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        if let Some(hex) = value.strip_prefix('#') {
            let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
            return match hex.len() {
                6 => Some(Self::rgb(
                    channel(&hex[0..2])?,
                    channel(&hex[2..4])?,
                    channel(&hex[4..6])?,
                )),
                3 => Some(Self::rgb(
                    channel(hex[0..1].repeat(2).as_str())?,
                    channel(hex[1..2].repeat(2).as_str())?,
                    channel(hex[2..3].repeat(2).as_str())?,
                )),
                _ => None,
            };
        }
        if let Some(args) = value
            .strip_prefix("rgb(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let parts: Vec<f32> = args
                .split(',')
                .filter_map(|p| p.trim().parse::<f32>().ok())
                .collect();
            if parts.len() != 3 {
                return None;
            }
            return Some(Self::rgb(
                parts[0].clamp(0.0, 255.0) / 255.0,
                parts[1].clamp(0.0, 255.0) / 255.0,
                parts[2].clamp(0.0, 255.0) / 255.0,
            ));
        }
        let named = match value.as_str() {
            "black" => Self::BLACK,
            "white" => Self::WHITE,
            "gray" | "grey" => Self::GRAY,
            "silver" => Self::rgb(0.75, 0.75, 0.75),
            "lightgray" | "lightgrey" => Self::rgb(0.827, 0.827, 0.827),
            "red" => Self::rgb(1.0, 0.0, 0.0),
            "green" => Self::rgb(0.0, 0.5, 0.0),
            "blue" => Self::rgb(0.0, 0.0, 1.0),
            "navy" => Self::rgb(0.0, 0.0, 0.5),
            "transparent" => Self::TRANSPARENT,
            _ => return None,
        };
        Some(named)
    }
}

// ---------------------------------------------------------------------------
// Style resolution
// ---------------------------------------------------------------------------

/// Resolve the style of `element`, inheriting text properties from `parent`.
///
/// `table` is the style of the enclosing table, which passes its border and
/// padding down to cells the way the `border`/`cellpadding` attributes do.
pub fn resolve_style(
    element: &ElementNode,
    parent: Option<&ComputedStyle>,
    table: Option<&TableDefaults>,
) -> ComputedStyle {
    let mut style = parent.map(ComputedStyle::inherit).unwrap_or_default();
    apply_tag_defaults(&mut style, &element.tag);

    if element.tag.is_cell() {
        if let Some(t) = table {
            style.border_width = t.cell_border;
            style.padding = [t.cell_padding; 4];
        }
    }
    apply_attributes(&mut style, element);
    if let Some(inline) = element.inline_style() {
        apply_inline_style(&mut style, inline);
    }
    style
}

/// Cell settings a `<table>` hands to its cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableDefaults {
    pub cell_border: f32,
    pub cell_padding: f32,
}

impl TableDefaults {
    pub fn from_table(table: &ElementNode) -> Self {
        let border = table
            .attributes
            .get("border")
            .map(|v| parse_length(v, 16.0).unwrap_or(1.0))
            .unwrap_or(0.0);
        let padding = table
            .attributes
            .get("cellpadding")
            .and_then(|v| parse_length(v, 16.0))
            .unwrap_or(1.0);
        Self {
            cell_border: if border > 0.0 { 1.0 } else { 0.0 },
            cell_padding: padding,
        }
    }
}

fn apply_tag_defaults(s: &mut ComputedStyle, tag: &Tag) {
    match tag {
        Tag::H1 => {
            s.font_size = 32.0;
            s.bold = true;
            s.margin_top = 21.0;
            s.margin_bottom = 21.0;
        }
        Tag::H2 => {
            s.font_size = 24.0;
            s.bold = true;
            s.margin_top = 20.0;
            s.margin_bottom = 20.0;
        }
        Tag::H3 => {
            s.font_size = 18.7;
            s.bold = true;
            s.margin_top = 18.0;
            s.margin_bottom = 18.0;
        }
        Tag::P => {
            s.margin_top = 16.0;
            s.margin_bottom = 16.0;
        }
        Tag::Th => {
            s.bold = true;
            s.text_align = TextAlign::Center;
            s.padding = [1.0; 4];
        }
        Tag::Td => {
            s.padding = [1.0; 4];
        }
        Tag::B | Tag::Strong => s.bold = true,
        _ => {}
    }
}

/// Presentational HTML attributes.
fn apply_attributes(s: &mut ComputedStyle, element: &ElementNode) {
    if let Some(c) = element.attributes.get("bgcolor").and_then(|v| Color::parse(v)) {
        s.background_color = c;
    }
    if let Some(align) = element.attributes.get("align") {
        if let Some(a) = parse_align(align) {
            s.text_align = a;
        }
    }
    if let Some(w) = element.attributes.get("width") {
        s.width = parse_dimension(w, s.font_size);
    }
    if element.tag == Tag::Table && element.attributes.contains_key("border") {
        s.border_width = 1.0;
    }
}

pub fn apply_inline_style(s: &mut ComputedStyle, declarations: &str) {
    for decl in declarations.split(';') {
        let Some((prop, val)) = decl.split_once(':') else {
            continue;
        };
        apply_css_property(s, &prop.trim().to_ascii_lowercase(), val.trim());
    }
}

fn apply_css_property(s: &mut ComputedStyle, prop: &str, val: &str) {
    let em = s.font_size;
    match prop {
        "font-size" => {
            if let Some(px) = parse_length(val, em) {
                s.font_size = px;
            }
        }
        "font-weight" => s.bold = matches!(val, "bold" | "bolder" | "600" | "700" | "800" | "900"),
        "color" => {
            if let Some(c) = Color::parse(val) {
                s.color = c;
            }
        }
        "background-color" => {
            if let Some(c) = Color::parse(val) {
                s.background_color = c;
            }
        }
        // Only the colour component of the shorthand is understood.
        "background" => {
            if let Some(c) = val.split_whitespace().find_map(Color::parse) {
                s.background_color = c;
            }
        }
        "text-align" => {
            if let Some(a) = parse_align(val) {
                s.text_align = a;
            }
        }
        "line-height" => {
            if let Ok(factor) = val.parse::<f32>() {
                s.line_height = factor;
            } else if let Some(px) = parse_length(val, em) {
                s.line_height = px / s.font_size;
            }
        }
        "width" => s.width = parse_dimension(val, em),
        "margin" => {
            let parts: Vec<f32> = val.split_whitespace().filter_map(|p| parse_length(p, em)).collect();
            let [top, _, bottom, _] = expand_box(&parts).unwrap_or([s.margin_top, 0.0, s.margin_bottom, 0.0]);
            s.margin_top = top;
            s.margin_bottom = bottom;
        }
        "margin-top" => {
            if let Some(px) = parse_length(val, em) {
                s.margin_top = px;
            }
        }
        "margin-bottom" => {
            if let Some(px) = parse_length(val, em) {
                s.margin_bottom = px;
            }
        }
        "padding" => {
            let parts: Vec<f32> = val.split_whitespace().filter_map(|p| parse_length(p, em)).collect();
            if let Some(p) = expand_box(&parts) {
                s.padding = p;
            }
        }
        "border" => {
            for token in val.split_whitespace() {
                if let Some(px) = parse_length(token, em) {
                    s.border_width = px;
                } else if let Some(c) = Color::parse(token) {
                    s.border_color = c;
                } else if token == "none" {
                    s.border_width = 0.0;
                }
            }
        }
        "border-width" => {
            if let Some(px) = parse_length(val, em) {
                s.border_width = px;
            }
        }
        "border-color" => {
            if let Some(c) = Color::parse(val) {
                s.border_color = c;
            }
        }
        _ => {}
    }
}

/// CSS box shorthand (1, 2, 3 or 4 values) → `[top, right, bottom, left]`.
fn expand_box(parts: &[f32]) -> Option<[f32; 4]> {
    match *parts {
        [a] => Some([a, a, a, a]),
        [v, h] => Some([v, h, v, h]),
        [t, h, b] => Some([t, h, b, h]),
        [t, r, b, l] => Some([t, r, b, l]),
        _ => None,
    }
}

fn parse_align(val: &str) -> Option<TextAlign> {
    match val.trim().to_ascii_lowercase().as_str() {
        "left" | "start" => Some(TextAlign::Left),
        "center" => Some(TextAlign::Center),
        "right" | "end" => Some(TextAlign::Right),
        _ => None,
    }
}

/// Parse a CSS length into pixels. Bare numbers are pixels.
pub fn parse_length(val: &str, em: f32) -> Option<f32> {
    let val = val.trim();
    let (number, factor) = if let Some(n) = val.strip_suffix("px") {
        (n, 1.0)
    } else if let Some(n) = val.strip_suffix("pt") {
        (n, 96.0 / 72.0)
    } else if let Some(n) = val.strip_suffix("em") {
        (n, em)
    } else {
        (val, 1.0)
    };
    number.trim().parse::<f32>().ok().map(|v| v * factor)
}

fn parse_dimension(val: &str, em: f32) -> Dimension {
    let val = val.trim();
    if let Some(p) = val.strip_suffix('%') {
        return p.trim().parse().map(Dimension::Percent).unwrap_or(Dimension::Auto);
    }
    parse_length(val, em).map(Dimension::Px).unwrap_or(Dimension::Auto)
}
