//! Table formatter – turns tabular rows into an HTML `<tr>` fragment.
//!
//! Cell text is inserted verbatim. No HTML escaping is performed, so markup
//! inside a cell reaches the rendered document as markup.

use std::fmt::{self, Write as _};

use crate::error::Result;

/// One CSV record: cells identified only by position.
pub type TableRow = Vec<String>;

/// Label of the numbering cell in the header row.
pub const NUMBER_HEADER: &str = "No";

/// Concatenated `<tr>…</tr>` markup for a whole table, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableFragment(String);

impl TableFragment {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of rows in the fragment.
    pub fn row_count(&self) -> usize {
        self.0.matches("<tr>").count()
    }
}

impl fmt::Display for TableFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TableFragment {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TableFragment {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Format rows pulled from a fallible row source.
///
/// The first error from the source is returned as-is and no fragment is
/// produced.
pub fn format_rows<I>(rows: I, numbered: bool) -> Result<TableFragment>
where
    I: IntoIterator<Item = Result<TableRow>>,
{
    let mut out = String::new();
    for (index, row) in rows.into_iter().enumerate() {
        let row = row?;
        push_row(&mut out, index, &row, numbered);
    }
    Ok(TableFragment(out))
}

/// Format rows that are already in memory.
pub fn format_table<S: AsRef<str>>(rows: &[Vec<S>], numbered: bool) -> TableFragment {
    let mut out = String::new();
    for (index, row) in rows.iter().enumerate() {
        push_row(&mut out, index, row, numbered);
    }
    TableFragment(out)
}

fn push_row<S: AsRef<str>>(out: &mut String, index: usize, cells: &[S], numbered: bool) {
    out.push_str("<tr>");
    if numbered {
        if index == 0 {
            let _ = write!(out, "<td>{NUMBER_HEADER}</td>");
        } else {
            let _ = write!(out, "<td>{index}</td>");
        }
    }
    for cell in cells {
        out.push_str("<td>");
        out.push_str(cell.as_ref());
        out.push_str("</td>");
    }
    out.push_str("</tr>");
}
