//! HTML parser – converts a document string into a simple DOM tree.
//!
//! Only the subset a tabular report needs is understood:
//! - Document: html, head, title, body (style/script bodies are skipped)
//! - Blocks: div, p, h1-h3, table, thead, tbody, tfoot, tr, td, th
//! - Inline: span, b, strong, br
//!
//! Anything else is kept as [`Tag::Unknown`] and laid out like a div.
//! Cell text produced by the table formatter is not escaped, so the parser
//! treats a `<` that cannot start a tag as plain text and ignores closing
//! tags that match no open element.

use std::collections::HashMap;

/// Open elements allowed before further start tags stop nesting. Deeper
/// elements are kept as empty siblings and their content goes to the
/// innermost element that is still open.
pub const MAX_NESTING_DEPTH: usize = 64;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Html,
    Head,
    Title,
    Body,
    Style,
    Script,
    Meta,
    Link,
    Div,
    P,
    H1,
    H2,
    H3,
    Table,
    Thead,
    Tbody,
    Tfoot,
    Tr,
    Td,
    Th,
    Span,
    B,
    Strong,
    Br,
    Unknown(String),
}

impl Tag {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "html" => Tag::Html,
            "head" => Tag::Head,
            "title" => Tag::Title,
            "body" => Tag::Body,
            "style" => Tag::Style,
            "script" => Tag::Script,
            "meta" => Tag::Meta,
            "link" => Tag::Link,
            "div" => Tag::Div,
            "p" => Tag::P,
            "h1" => Tag::H1,
            "h2" => Tag::H2,
            "h3" => Tag::H3,
            "table" => Tag::Table,
            "thead" => Tag::Thead,
            "tbody" => Tag::Tbody,
            "tfoot" => Tag::Tfoot,
            "tr" => Tag::Tr,
            "td" => Tag::Td,
            "th" => Tag::Th,
            "span" => Tag::Span,
            "b" => Tag::B,
            "strong" => Tag::Strong,
            "br" => Tag::Br,
            other => Tag::Unknown(other.to_string()),
        }
    }

    /// Elements that never have children or a closing tag.
    pub fn is_void(&self) -> bool {
        match self {
            Tag::Meta | Tag::Link | Tag::Br => true,
            Tag::Unknown(name) => matches!(name.as_str(), "img" | "hr" | "input" | "col"),
            _ => false,
        }
    }

    /// Elements whose body is raw text rather than markup.
    fn is_raw_text(&self) -> bool {
        matches!(self, Tag::Style | Tag::Script | Tag::Title)
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Tag::Span | Tag::B | Tag::Strong | Tag::Br)
    }

    pub fn is_heading(&self) -> bool {
        matches!(self, Tag::H1 | Tag::H2 | Tag::H3)
    }

    pub fn is_cell(&self) -> bool {
        matches!(self, Tag::Td | Tag::Th)
    }

    /// Row-group wrappers that are transparent for table layout.
    pub fn is_row_group(&self) -> bool {
        matches!(self, Tag::Thead | Tag::Tbody | Tag::Tfoot)
    }
}

#[derive(Debug, Clone)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attributes.get("style").map(|s| s.as_str())
    }

    /// Child elements, skipping text nodes.
    pub fn elements(&self) -> impl Iterator<Item = &ElementNode> {
        self.children.iter().filter_map(|c| match c {
            DomNode::Element(e) => Some(e),
            DomNode::Text(_) => None,
        })
    }

    /// Concatenated descendant text.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[DomNode], out: &mut String) {
    for node in nodes {
        match node {
            DomNode::Text(t) => out.push_str(t),
            DomNode::Element(e) => collect_text(&e.children, out),
        }
    }
}

/// A parsed document: its `<title>` text and the content of `<body>`.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub title: String,
    pub body: Vec<DomNode>,
}

impl Document {
    pub fn is_blank(&self) -> bool {
        self.body.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse an HTML string into a list of top-level nodes.
pub fn parse_html(html: &str) -> Vec<DomNode> {
    let mut parser = Parser { input: html, pos: 0 };
    let mut open = Vec::new();
    parser.parse_children(&mut open)
}

/// Parse a full document, separating the title from the body content.
///
/// Without a `<body>` element every node outside `<head>` counts as body.
pub fn parse_document(html: &str) -> Document {
    let nodes = parse_html(html);
    let title = find_title(&nodes).unwrap_or_default();
    let body = body_children(&nodes);
    Document { title, body }
}

fn find_title(nodes: &[DomNode]) -> Option<String> {
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == Tag::Title {
                return Some(e.text_content().split_whitespace().collect::<Vec<_>>().join(" "));
            }
            if let Some(t) = find_title(&e.children) {
                return Some(t);
            }
        }
    }
    None
}

/// Children of `<body>`, or every non-head node when there is no body.
pub fn body_children(nodes: &[DomNode]) -> Vec<DomNode> {
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == Tag::Body {
                return e.children.clone();
            }
            if e.tag == Tag::Html {
                return body_children(&e.children);
            }
        }
    }
    nodes
        .iter()
        .filter(|n| match n {
            DomNode::Element(e) => !matches!(
                e.tag,
                Tag::Head | Tag::Title | Tag::Style | Tag::Script | Tag::Meta | Tag::Link
            ),
            DomNode::Text(_) => true,
        })
        .cloned()
        .collect()
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    /// Parse nodes until end of input or a closing tag owned by an element
    /// in `open`.
    fn parse_children(&mut self, open: &mut Vec<Tag>) -> Vec<DomNode> {
        let mut nodes = Vec::new();
        while !self.eof() {
            if self.starts_with("</") {
                let name = self.peek_closing_name();
                let tag = Tag::from_name(&name);
                if open.contains(&tag) {
                    break;
                }
                // Stray closing tag.
                self.skip_past('>');
                continue;
            }
            if let (Some(current), Some(next)) = (open.last(), self.peek_open_tag()) {
                if closes_implicitly(current, &next) {
                    break;
                }
            }
            if let Some(node) = self.parse_node(open) {
                nodes.push(node);
            }
        }
        nodes
    }

    fn parse_node(&mut self, open: &mut Vec<Tag>) -> Option<DomNode> {
        if self.starts_with("<!--") {
            match self.rest().find("-->") {
                Some(end) => self.pos += end + 3,
                None => self.pos = self.input.len(),
            }
            return None;
        }
        if self.starts_with("<!") || self.starts_with("<?") {
            self.skip_past('>');
            return None;
        }
        if self.starts_with("<") && self.rest()[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Some(self.parse_element(open));
        }
        self.parse_text()
    }

    /// Text up to the next tag-like `<`. Whitespace-only runs are dropped.
    fn parse_text(&mut self) -> Option<DomNode> {
        let start = self.pos;
        // Always consume at least one character so a lone '<' makes progress.
        self.advance_char();
        while !self.eof() {
            let rest = self.rest();
            if rest.starts_with('<') {
                let next = rest[1..].chars().next();
                if matches!(next, Some(c) if c.is_ascii_alphabetic() || c == '/' || c == '!' || c == '?') {
                    break;
                }
            }
            self.advance_char();
        }
        let raw = &self.input[start..self.pos];
        if raw.trim().is_empty() {
            return None;
        }
        Some(DomNode::Text(decode_entities(raw)))
    }

    fn parse_element(&mut self, open: &mut Vec<Tag>) -> DomNode {
        self.pos += 1; // '<'
        let name = self.parse_name();
        let mut elem = ElementNode::new(Tag::from_name(&name));

        loop {
            self.skip_whitespace();
            if self.eof() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let before = self.pos;
            let (key, value) = self.parse_attribute();
            if !key.is_empty() {
                elem.attributes.insert(key.to_ascii_lowercase(), value);
            }
            if self.pos == before {
                // Unparseable attribute character.
                self.advance_char();
            }
        }

        if self.starts_with("/>") {
            self.pos += 2;
            return DomNode::Element(elem);
        }
        if self.starts_with(">") {
            self.pos += 1;
        }
        if elem.tag.is_void() {
            return DomNode::Element(elem);
        }

        if elem.tag.is_raw_text() {
            let closing = format!("</{}", name.to_ascii_lowercase());
            let end = find_ascii_case_insensitive(self.rest(), &closing)
                .map(|i| self.pos + i)
                .unwrap_or(self.input.len());
            let body = &self.input[self.pos..end];
            if elem.tag == Tag::Title {
                elem.children.push(DomNode::Text(decode_entities(body)));
            }
            self.pos = end;
            if !self.eof() {
                self.skip_past('>');
            }
            return DomNode::Element(elem);
        }

        if open.len() >= MAX_NESTING_DEPTH {
            return DomNode::Element(elem);
        }

        open.push(elem.tag.clone());
        elem.children = self.parse_children(open);
        open.pop();

        // Consume our own closing tag; an ancestor's closing tag is left for
        // the ancestor, implicitly closing this element.
        if self.starts_with("</") && Tag::from_name(&self.peek_closing_name()) == elem.tag {
            self.skip_past('>');
        }
        DomNode::Element(elem)
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.rest().chars().next() {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    /// Tag of the element starting at the cursor, if any.
    fn peek_open_tag(&self) -> Option<Tag> {
        let rest = self.rest().strip_prefix('<')?;
        let name: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        if name.starts_with(|c: char| c.is_ascii_alphabetic()) {
            Some(Tag::from_name(&name))
        } else {
            None
        }
    }

    fn peek_closing_name(&self) -> String {
        let rest = &self.rest()[2..];
        rest.chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect()
    }

    fn parse_attribute(&mut self) -> (String, String) {
        let key = self.parse_name();
        self.skip_whitespace();
        if !self.starts_with("=") {
            return (key, String::new());
        }
        self.pos += 1;
        self.skip_whitespace();
        let value = match self.rest().chars().next() {
            Some(q @ ('"' | '\'')) => {
                self.pos += 1;
                let start = self.pos;
                let end = self.rest().find(q).map(|i| start + i).unwrap_or(self.input.len());
                self.pos = (end + 1).min(self.input.len());
                decode_entities(&self.input[start..end])
            }
            _ => {
                let start = self.pos;
                while let Some(c) = self.rest().chars().next() {
                    if c.is_whitespace() || c == '>' {
                        break;
                    }
                    self.pos += c.len_utf8();
                }
                decode_entities(&self.input[start..self.pos])
            }
        };
        (key, value)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.rest().chars().next() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn skip_past(&mut self, c: char) {
        match self.rest().find(c) {
            Some(i) => self.pos += i + c.len_utf8(),
            None => self.pos = self.input.len(),
        }
    }

    fn advance_char(&mut self) {
        if let Some(c) = self.rest().chars().next() {
            self.pos += c.len_utf8();
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }
}

/// Whether opening `next` ends the still-open `current` element, as a
/// new cell ends the previous cell.
fn closes_implicitly(current: &Tag, next: &Tag) -> bool {
    match current {
        Tag::Td | Tag::Th => next.is_cell() || *next == Tag::Tr || next.is_row_group(),
        Tag::Tr => *next == Tag::Tr || next.is_row_group(),
        Tag::P => matches!(next, Tag::P | Tag::Div | Tag::Table) || next.is_heading(),
        _ => false,
    }
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let pat = needle.as_bytes();
    if pat.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - pat.len()).find(|&i| hay[i..i + pat.len()].eq_ignore_ascii_case(pat))
}

/// Decode the named entities the renderer knows plus numeric references.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{00A0}'),
                _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                    u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
                }
                _ if entity.starts_with('#') => {
                    entity[1..].parse::<u32>().ok().and_then(char::from_u32)
                }
                _ => None,
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

#[cfg(test)]
mod tests {
    use super::*;

    fn first_element(nodes: &[DomNode]) -> &ElementNode {
        match &nodes[0] {
            DomNode::Element(e) => e,
            other => panic!("Expected element, got {:?}", other),
        }
    }

    #[test]
    fn parse_table_rows() {
        let nodes = parse_html("<table><tr><td>Name</td><td>Age</td></tr><tr><td>Ann</td><td>30</td></tr></table>");
        let table = first_element(&nodes);
        assert_eq!(table.tag, Tag::Table);
        assert_eq!(table.elements().count(), 2);
        assert_eq!(table.text_content(), "NameAgeAnn30");
    }

    #[test]
    fn document_title_and_body() {
        let doc = parse_document(
            "<!DOCTYPE html><html><head><title> My  Report </title><style>td { color: red }</style></head>\
             <body><h1>Hi</h1></body></html>",
        );
        assert_eq!(doc.title, "My Report");
        assert_eq!(doc.body.len(), 1);
    }

    #[test]
    fn fragment_without_body() {
        let doc = parse_document("<p>one</p><p>two</p>");
        assert_eq!(doc.title, "");
        assert_eq!(doc.body.len(), 2);
    }

    #[test]
    fn stray_less_than_is_text() {
        let nodes = parse_html("<td>a < b</td>");
        assert_eq!(first_element(&nodes).text_content(), "a < b");
    }

    #[test]
    fn stray_closing_tag_is_ignored() {
        let nodes = parse_html("<tr><td>x</b></td><td>y</td></tr>");
        let row = first_element(&nodes);
        assert_eq!(row.elements().count(), 2);
    }

    #[test]
    fn unclosed_cell_is_closed_by_row() {
        let nodes = parse_html("<table><tr><td>a<td>b</tr></table>");
        let table = first_element(&nodes);
        let row = table.elements().next().unwrap();
        assert_eq!(row.tag, Tag::Tr);
        assert_eq!(row.elements().count(), 2);
        assert_eq!(row.text_content(), "ab");
    }

    #[test]
    fn style_body_is_skipped() {
        let nodes = parse_html("<style>p < span { x }</style><p>t</p>");
        assert_eq!(nodes.len(), 2);
        assert!(first_element(&nodes).children.is_empty());
    }

    fn depth(nodes: &[DomNode]) -> usize {
        nodes
            .iter()
            .map(|n| match n {
                DomNode::Element(e) => 1 + depth(&e.children),
                DomNode::Text(_) => 0,
            })
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn unclosed_elements_stop_nesting_at_the_limit() {
        let html = "<div>x".repeat(5000);
        let nodes = parse_html(&html);
        assert_eq!(depth(&nodes), MAX_NESTING_DEPTH + 1);
        // No text is lost past the limit.
        let text: usize = nodes
            .iter()
            .map(|n| match n {
                DomNode::Element(e) => e.text_content().len(),
                DomNode::Text(t) => t.len(),
            })
            .sum();
        assert_eq!(text, 5000);
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt; &#65;&#x42; &bogus;"), "a & b <c> AB &bogus;");
    }

    #[test]
    fn attributes_are_lowercased() {
        let nodes = parse_html(r#"<td STYLE="color: red" data-x=1>v</td>"#);
        let td = first_element(&nodes);
        assert_eq!(td.inline_style(), Some("color: red"));
        assert_eq!(td.attributes.get("data-x").map(String::as_str), Some("1"));
    }
}
