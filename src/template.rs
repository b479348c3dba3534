//! Template composer – literal placeholder substitution.
//!
//! A template is raw HTML holding `[%title%]` and `[%rows%]`. Each token is
//! replaced at its first occurrence only; a missing token leaves the template
//! untouched. The title is substituted before the rows, so a title that
//! itself contains `[%rows%]` would receive the table fragment.

use std::fmt;

use crate::error::{Error, Result};
use crate::table::TableFragment;

/// A placeholder token understood by the composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Title,
    Rows,
}

impl Placeholder {
    pub const ALL: [Placeholder; 2] = [Placeholder::Title, Placeholder::Rows];

    /// The literal token text.
    pub fn token(self) -> &'static str {
        match self {
            Placeholder::Title => "[%title%]",
            Placeholder::Rows => "[%rows%]",
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// The fully composed HTML handed to the rendering engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderDocument(String);

impl RenderDocument {
    pub fn new(html: impl Into<String>) -> Self {
        Self(html.into())
    }

    pub fn html(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Substitute `title` and `fragment` into `template`.
pub fn compose(template: &str, fragment: &TableFragment, title: &str) -> RenderDocument {
    let html = template.replacen(Placeholder::Title.token(), title, 1);
    let html = html.replacen(Placeholder::Rows.token(), fragment.as_str(), 1);
    RenderDocument(html)
}

/// Like [`compose`], but refuses a template lacking either placeholder.
pub fn compose_strict(
    template: &str,
    fragment: &TableFragment,
    title: &str,
) -> Result<RenderDocument> {
    if let Some(missing) = missing_placeholders(template).into_iter().next() {
        return Err(Error::MissingPlaceholder(missing));
    }
    Ok(compose(template, fragment, title))
}

/// Placeholders that do not occur anywhere in `template`.
pub fn missing_placeholders(template: &str) -> Vec<Placeholder> {
    Placeholder::ALL
        .into_iter()
        .filter(|p| !template.contains(p.token()))
        .collect()
}
