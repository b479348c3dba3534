//! Layout engine – builds a Taffy flexbox tree from the parsed body,
//! computes it against the printable width and flattens the result into
//! positioned boxes.
//!
//! Block elements stack in a flex column. Runs of inline content become a
//! single pre-wrapped text leaf. Tables get explicit column widths derived
//! from their cell text (natural and minimum widths, like a browser's auto
//! table layout) and lay out as flex rows whose cells stretch to the
//! tallest cell in the row.
//!
//! All lengths are CSS pixels relative to the top-left of the content area.

use std::collections::HashMap;

use taffy::prelude::{
    AvailableSpace, LengthPercentage, LengthPercentageAuto, NodeId, Rect, Size, Style, TaffyTree,
};

use crate::dom::{DomNode, ElementNode, Tag};
use crate::fonts::{longest_word_width, measure_text_width, wrap_text};
use crate::style::{resolve_style, ComputedStyle, Dimension, TableDefaults};

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxKind {
    Block,
    Text,
    Table,
    Row,
    Cell,
}

/// A laid-out box in document coordinates (before page splitting).
#[derive(Debug, Clone)]
pub struct PositionedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub kind: BoxKind,
    pub style: ComputedStyle,
    /// Wrapped text lines of text leaves and cells.
    pub lines: Vec<String>,
    pub children: Vec<PositionedBox>,
}

impl PositionedBox {
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Height of one text line.
    pub fn line_height(&self) -> f32 {
        self.style.font_size * self.style.line_height
    }
}

// ---------------------------------------------------------------------------
// Tree builder
// ---------------------------------------------------------------------------

struct NodeInfo {
    kind: BoxKind,
    style: ComputedStyle,
    lines: Vec<String>,
}

struct LayoutBuilder {
    taffy: TaffyTree<()>,
    info: HashMap<NodeId, NodeInfo>,
}

type BuildResult<T> = Result<T, String>;

fn taffy_err(e: taffy::TaffyError) -> String {
    format!("layout failed: {e}")
}

impl LayoutBuilder {
    fn new() -> Self {
        Self {
            taffy: TaffyTree::new(),
            info: HashMap::new(),
        }
    }

    fn insert(&mut self, style: Style, children: &[NodeId], info: NodeInfo) -> BuildResult<NodeId> {
        let node = if children.is_empty() {
            self.taffy.new_leaf(style)
        } else {
            self.taffy.new_with_children(style, children)
        }
        .map_err(taffy_err)?;
        self.info.insert(node, info);
        Ok(node)
    }

    /// Lay out `nodes` as a column of blocks inside a parent of `width`.
    fn build_flow(
        &mut self,
        nodes: &[DomNode],
        parent: &ComputedStyle,
        width: f32,
    ) -> BuildResult<Vec<NodeId>> {
        let mut ids = Vec::new();
        let mut run: Vec<&DomNode> = Vec::new();

        for node in nodes {
            let block = match node {
                DomNode::Element(e) if is_hidden(&e.tag) => continue,
                DomNode::Element(e) if !e.tag.is_inline() => e,
                _ => {
                    run.push(node);
                    continue;
                }
            };
            if let Some(id) = self.build_inline_run(&run, parent, width)? {
                ids.push(id);
            }
            run.clear();
            ids.push(self.build_block(block, parent, width)?);
        }
        if let Some(id) = self.build_inline_run(&run, parent, width)? {
            ids.push(id);
        }
        Ok(ids)
    }

    /// Anonymous text leaf for consecutive inline nodes.
    fn build_inline_run(
        &mut self,
        run: &[&DomNode],
        parent: &ComputedStyle,
        width: f32,
    ) -> BuildResult<Option<NodeId>> {
        let mut raw = String::new();
        let mut all_bold = !run.is_empty();
        for node in run {
            collect_inline_text(node, &mut raw);
            if !matches!(node, DomNode::Element(e) if matches!(e.tag, Tag::B | Tag::Strong)) {
                all_bold = false;
            }
        }
        let text = normalize_text(&raw);
        if text.is_empty() {
            return Ok(None);
        }
        let style = ComputedStyle {
            font_size: parent.font_size,
            bold: parent.bold || all_bold,
            color: parent.color,
            text_align: parent.text_align,
            line_height: parent.line_height,
            ..ComputedStyle::default()
        };
        self.build_text_leaf(&text, style, width).map(Some)
    }

    fn build_text_leaf(&mut self, text: &str, style: ComputedStyle, width: f32) -> BuildResult<NodeId> {
        let own_width = style.width.resolve(width).unwrap_or(width);
        let inset_x = style.padding_left() + style.padding_right() + 2.0 * style.border_width;
        let inset_y = style.padding_top() + style.padding_bottom() + 2.0 * style.border_width;
        let lines = wrap_text(text, style.font_size, style.bold, (own_width - inset_x).max(1.0));
        let text_height = lines.len() as f32 * style.font_size * style.line_height;

        let mut ts = box_style(&style);
        ts.size.width = dimension(style.width);
        ts.min_size.height = taffy::Dimension::Length(text_height + inset_y);

        self.insert(
            ts,
            &[],
            NodeInfo {
                kind: BoxKind::Text,
                style,
                lines,
            },
        )
    }

    fn build_block(
        &mut self,
        element: &ElementNode,
        parent: &ComputedStyle,
        width: f32,
    ) -> BuildResult<NodeId> {
        if element.tag == Tag::Table {
            return self.build_table(element, parent, width);
        }
        let style = resolve_style(element, Some(parent), None);

        // Paragraph-like blocks holding only inline content become one leaf
        // so the block's own box carries the text.
        let inline_only = element.children.iter().all(|c| match c {
            DomNode::Text(_) => true,
            DomNode::Element(e) => e.tag.is_inline(),
        });
        if inline_only {
            let mut raw = String::new();
            for child in &element.children {
                collect_inline_text(child, &mut raw);
            }
            let text = normalize_text(&raw);
            if !text.is_empty() {
                return self.build_text_leaf(&text, style, width);
            }
        }

        let own_width = style.width.resolve(width).unwrap_or(width);
        let inner = own_width
            - style.padding_left()
            - style.padding_right()
            - 2.0 * style.border_width;
        let children = self.build_flow(&element.children, &style, inner.max(1.0))?;

        let mut ts = box_style(&style);
        ts.size.width = dimension(style.width);
        self.insert(
            ts,
            &children,
            NodeInfo {
                kind: BoxKind::Block,
                style,
                lines: Vec::new(),
            },
        )
    }

    fn build_table(
        &mut self,
        table: &ElementNode,
        parent: &ComputedStyle,
        width: f32,
    ) -> BuildResult<NodeId> {
        let table_style = resolve_style(table, Some(parent), None);
        let defaults = TableDefaults::from_table(table);

        // Rows with their resolved cell styles and text.
        let mut rows: Vec<(ComputedStyle, Vec<(ComputedStyle, String)>)> = Vec::new();
        for row in table_rows(table) {
            let row_style = resolve_style(row, Some(&table_style), None);
            let cells = row
                .elements()
                .filter(|e| e.tag.is_cell())
                .map(|cell| {
                    let mut style = resolve_style(cell, Some(&row_style), Some(&defaults));
                    if style.background_color.is_transparent() {
                        style.background_color = row_style.background_color;
                    }
                    let mut raw = String::new();
                    for child in &cell.children {
                        collect_inline_text(child, &mut raw);
                    }
                    (style, normalize_text(&raw))
                })
                .collect();
            rows.push((row_style, cells));
        }

        let columns = rows.iter().map(|(_, cells)| cells.len()).max().unwrap_or(0);
        let mut natural = vec![0.0f32; columns];
        let mut minimum = vec![0.0f32; columns];
        for (_, cells) in &rows {
            for (i, (style, text)) in cells.iter().enumerate() {
                let inset = style.padding_left() + style.padding_right() + 2.0 * style.border_width;
                let nat = text
                    .split('\n')
                    .map(|p| measure_text_width(p, style.font_size, style.bold))
                    .fold(0.0, f32::max);
                let min = longest_word_width(text, style.font_size, style.bold);
                natural[i] = natural[i].max(nat + inset);
                minimum[i] = minimum[i].max(min + inset);
            }
        }

        let frame = 2.0 * table_style.border_width
            + table_style.padding_left()
            + table_style.padding_right();
        let inner = match table_style.width.resolve(width) {
            Some(w) => (w - frame).max(0.0),
            None => natural.iter().sum::<f32>().min(width - frame).max(0.0),
        };
        let widths = column_widths(&natural, &minimum, inner);

        let mut row_ids = Vec::with_capacity(rows.len());
        for (row_style, cells) in rows {
            let mut cell_ids = Vec::with_capacity(cells.len());
            for ((style, text), col_width) in cells.into_iter().zip(&widths) {
                let inset_x = style.padding_left() + style.padding_right() + 2.0 * style.border_width;
                let inset_y = style.padding_top() + style.padding_bottom() + 2.0 * style.border_width;
                let lines = if text.is_empty() {
                    Vec::new()
                } else {
                    wrap_text(&text, style.font_size, style.bold, (col_width - inset_x).max(1.0))
                };
                let text_height = lines.len().max(1) as f32 * style.font_size * style.line_height;

                let mut ts = box_style(&style);
                ts.size.width = taffy::Dimension::Length(*col_width);
                ts.flex_shrink = 0.0;
                ts.min_size.height = taffy::Dimension::Length(text_height + inset_y);
                cell_ids.push(self.insert(
                    ts,
                    &[],
                    NodeInfo {
                        kind: BoxKind::Cell,
                        style,
                        lines,
                    },
                )?);
            }

            let mut ts = Style {
                display: taffy::Display::Flex,
                flex_direction: taffy::FlexDirection::Row,
                align_items: Some(taffy::AlignItems::Stretch),
                ..Default::default()
            };
            ts.min_size.width = taffy::Dimension::Length(0.0);
            row_ids.push(self.insert(
                ts,
                &cell_ids,
                NodeInfo {
                    kind: BoxKind::Row,
                    style: row_style,
                    lines: Vec::new(),
                },
            )?);
        }

        let mut ts = box_style(&table_style);
        ts.size.width = taffy::Dimension::Length(inner + frame);
        self.insert(
            ts,
            &row_ids,
            NodeInfo {
                kind: BoxKind::Table,
                style: table_style,
                lines: Vec::new(),
            },
        )
    }

    fn extract(&self, node: NodeId, offset_x: f32, offset_y: f32) -> BuildResult<PositionedBox> {
        let layout = self.taffy.layout(node).map_err(taffy_err)?;
        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;

        let children = self
            .taffy
            .children(node)
            .map_err(taffy_err)?
            .into_iter()
            .map(|child| self.extract(child, x, y))
            .collect::<BuildResult<Vec<_>>>()?;

        let (kind, style, lines) = match self.info.get(&node) {
            Some(info) => (info.kind, info.style.clone(), info.lines.clone()),
            None => (BoxKind::Block, ComputedStyle::default(), Vec::new()),
        };
        Ok(PositionedBox {
            x,
            y,
            width: layout.size.width,
            height: layout.size.height,
            kind,
            style,
            lines,
            children,
        })
    }
}

/// Flex-column box with the element's margins, padding and border.
fn box_style(s: &ComputedStyle) -> Style {
    let border = LengthPercentage::Length(s.border_width);
    Style {
        display: taffy::Display::Flex,
        flex_direction: taffy::FlexDirection::Column,
        margin: Rect {
            top: LengthPercentageAuto::Length(s.margin_top),
            right: LengthPercentageAuto::Length(0.0),
            bottom: LengthPercentageAuto::Length(s.margin_bottom),
            left: LengthPercentageAuto::Length(0.0),
        },
        padding: Rect {
            top: LengthPercentage::Length(s.padding_top()),
            right: LengthPercentage::Length(s.padding_right()),
            bottom: LengthPercentage::Length(s.padding_bottom()),
            left: LengthPercentage::Length(s.padding_left()),
        },
        border: Rect {
            top: border,
            right: border,
            bottom: border,
            left: border,
        },
        ..Default::default()
    }
}

fn dimension(d: Dimension) -> taffy::Dimension {
    match d {
        Dimension::Auto => taffy::Dimension::Auto,
        Dimension::Px(v) => taffy::Dimension::Length(v),
        Dimension::Percent(v) => taffy::Dimension::Percent(v / 100.0),
    }
}

fn is_hidden(tag: &Tag) -> bool {
    matches!(
        tag,
        Tag::Head | Tag::Title | Tag::Style | Tag::Script | Tag::Meta | Tag::Link
    )
}

/// `<tr>` elements of a table, looking through row groups.
fn table_rows(table: &ElementNode) -> Vec<&ElementNode> {
    let mut rows = Vec::new();
    for child in table.elements() {
        if child.tag == Tag::Tr {
            rows.push(child);
        } else if child.tag.is_row_group() {
            rows.extend(child.elements().filter(|e| e.tag == Tag::Tr));
        }
    }
    rows
}

/// Flatten inline content to text; `<br>` and nested blocks become line breaks.
fn collect_inline_text(node: &DomNode, out: &mut String) {
    match node {
        DomNode::Text(t) => out.push_str(t),
        DomNode::Element(e) if e.tag == Tag::Br => out.push('\n'),
        DomNode::Element(e) if is_hidden(&e.tag) => {}
        DomNode::Element(e) => {
            let block = !e.tag.is_inline();
            if block {
                out.push('\n');
            }
            for child in &e.children {
                collect_inline_text(child, out);
            }
            if block {
                out.push('\n');
            }
        }
    }
}

/// Collapse whitespace within each line and drop empty lines.
fn normalize_text(raw: &str) -> String {
    raw.split('\n')
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Distribute `target` across columns given their natural (unwrapped) and
/// minimum (longest word) widths.
pub fn column_widths(natural: &[f32], minimum: &[f32], target: f32) -> Vec<f32> {
    let n = natural.len();
    if n == 0 {
        return Vec::new();
    }
    let sum_nat: f32 = natural.iter().sum();
    let sum_min: f32 = minimum.iter().sum();
    let equal = target / n as f32;

    if sum_nat <= target {
        if sum_nat <= 0.0 {
            return vec![equal; n];
        }
        let extra = target - sum_nat;
        return natural.iter().map(|w| w + extra * w / sum_nat).collect();
    }
    if sum_min >= target {
        if sum_min <= 0.0 {
            return vec![equal; n];
        }
        return minimum.iter().map(|w| w * target / sum_min).collect();
    }
    let ratio = (target - sum_min) / (sum_nat - sum_min);
    natural
        .iter()
        .zip(minimum)
        .map(|(nat, min)| min + (nat - min) * ratio)
        .collect()
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Lay out body content within `content_width` pixels, returning the
/// top-level boxes in document coordinates.
pub fn compute_layout(body: &[DomNode], content_width: f32) -> Result<Vec<PositionedBox>, String> {
    let mut builder = LayoutBuilder::new();
    let root_style = ComputedStyle::default();
    let children = builder.build_flow(body, &root_style, content_width)?;

    let ts = Style {
        display: taffy::Display::Flex,
        flex_direction: taffy::FlexDirection::Column,
        size: Size {
            width: taffy::Dimension::Length(content_width),
            height: taffy::Dimension::Auto,
        },
        ..Default::default()
    };
    let root = builder
        .taffy
        .new_with_children(ts, &children)
        .map_err(taffy_err)?;
    builder
        .taffy
        .compute_layout(
            root,
            Size {
                width: AvailableSpace::Definite(content_width),
                height: AvailableSpace::MaxContent,
            },
        )
        .map_err(taffy_err)?;

    Ok(builder.extract(root, 0.0, 0.0)?.children)
}
