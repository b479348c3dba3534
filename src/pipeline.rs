//! Pipeline – ties together row reading, table formatting, template
//! composition and rendering into a single function call.

use std::fs;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::embedded::EmbeddedEngine;
use crate::engine::{PrintOptions, RenderEngine};
use crate::error::{Error, RenderStep, Result};
use crate::latch::CancelToken;
use crate::layout_config::PrintLayout;
use crate::orchestrator::{RenderOptions, RenderOrchestrator};
use crate::rows::RowSource;
use crate::table::{format_rows, TableRow};
use crate::template::{compose, compose_strict, missing_placeholders, RenderDocument};

/// Configuration for one CSV → PDF run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Substituted for `[%title%]` (default: "Untitled").
    pub title: String,
    /// Prefix each row with an index cell (`No` for the header row).
    pub numbered: bool,
    /// Fail instead of warning when the template lacks a placeholder.
    pub strict_template: bool,
    /// Paper, orientation, margins and scale for the capture. Backgrounds
    /// and the header/footer band are always printed.
    pub print: PrintOptions,
    /// Bound on the load wait in seconds; unbounded when absent.
    pub load_timeout_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            title: "Untitled".to_string(),
            numbered: false,
            strict_template: false,
            print: PrintOptions::report(),
            load_timeout_secs: None,
        }
    }
}

impl PipelineConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Self::from_json(&text).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config
            .print
            .validate()
            .map_err(|e| Error::Config(format!("print options: {e}")))?;
        Ok(config)
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            print: self.print.clone(),
            load_timeout: self.load_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Format `rows` and compose them into `template`.
///
/// Stops at the first malformed row; nothing is composed in that case.
pub fn build_document<I>(rows: I, template: &str, config: &PipelineConfig) -> Result<RenderDocument>
where
    I: IntoIterator<Item = Result<TableRow>>,
{
    let fragment = format_rows(rows, config.numbered)?;
    log::info!("Formatted {} row(s)", fragment.row_count());

    if config.strict_template {
        return compose_strict(template, &fragment, &config.title);
    }
    for missing in missing_placeholders(template) {
        log::warn!("Template has no {missing} placeholder; leaving it out");
    }
    Ok(compose(template, &fragment, &config.title))
}

/// Full pipeline on a caller-supplied engine session.
pub fn generate_pdf_with<E, R>(
    orchestrator: &mut RenderOrchestrator<E>,
    csv: R,
    template: &str,
    config: &PipelineConfig,
    cancel: &CancelToken,
) -> Result<Vec<u8>>
where
    E: RenderEngine,
    R: Read,
{
    let document = build_document(RowSource::new(csv), template, config)?;
    let pdf = orchestrator.render(&document, cancel)?;
    log::info!("Rendered PDF ({} bytes)", pdf.len());
    Ok(pdf)
}

/// Full pipeline on the embedded engine: CSV → PDF bytes.
///
/// Returns `(pdf_bytes, print_layout)`.
pub fn generate_pdf<R: Read>(
    csv: R,
    template: &str,
    config: &PipelineConfig,
) -> Result<(Vec<u8>, Option<PrintLayout>)> {
    // Malformed input must fail before any engine work.
    let document = build_document(RowSource::new(csv), template, config)?;

    let engine = EmbeddedEngine::launch().map_err(|e| Error::engine(RenderStep::Launch, e))?;
    let mut orchestrator = RenderOrchestrator::new(engine, config.render_options());
    let pdf = orchestrator.render(&document, &CancelToken::new())?;
    log::info!("Rendered PDF ({} bytes)", pdf.len());

    let layout = orchestrator.engine().last_layout().cloned();
    Ok((pdf, layout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::default_template;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn rows(data: &[&[&str]]) -> Vec<Result<TableRow>> {
        data.iter()
            .map(|r| Ok(r.iter().map(|c| c.to_string()).collect()))
            .collect()
    }

    #[test]
    fn builds_document_from_rows() {
        let config = PipelineConfig {
            title: "Contacts".to_string(),
            numbered: true,
            ..PipelineConfig::default()
        };
        let doc = build_document(
            rows(&[&["Name"], &["John Doe"]]),
            "<h1>[%title%]</h1><table>[%rows%]</table>",
            &config,
        )
        .unwrap();
        assert_eq!(
            doc.html(),
            "<h1>Contacts</h1><table><tr><td>No</td><td>Name</td></tr><tr><td>1</td><td>John Doe</td></tr></table>"
        );
    }

    #[test]
    fn missing_placeholder_is_lenient_by_default() {
        let doc = build_document(rows(&[&["a"]]), "<p>static</p>", &PipelineConfig::default()).unwrap();
        assert_eq!(doc.html(), "<p>static</p>");
    }

    #[test]
    fn strict_template_rejects_missing_placeholder() {
        let config = PipelineConfig {
            strict_template: true,
            ..PipelineConfig::default()
        };
        let err = build_document(rows(&[&["a"]]), "<table>[%rows%]</table>", &config).unwrap_err();
        assert!(matches!(err, Error::MissingPlaceholder(_)));
    }

    #[test]
    fn malformed_rows_fail_fast() {
        let input = vec![
            Ok(vec!["a".to_string()]),
            Err(Error::MalformedRow {
                line: 2,
                message: "bad".to_string(),
            }),
        ];
        let err = build_document(input, default_template(), &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, Error::MalformedRow { line: 2, .. }));
    }

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.title, "Untitled");
        assert!(!config.numbered);
        assert!(config.print.print_background);
        assert!(config.print.display_header_footer);
        assert_eq!(config.render_options().load_timeout, None);
    }

    #[test]
    fn config_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"title": "Quarterly", "numbered": true, "print": {{"landscape": true}}, "load_timeout_secs": 30}}"#
        )
        .unwrap();
        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.title, "Quarterly");
        assert!(config.numbered);
        assert!(config.print.landscape);
        // Unspecified print fields keep their own defaults.
        assert_eq!(config.print.paper_width, 8.5);
        assert_eq!(config.print.margin_left, 0.4);
        assert_eq!(config.render_options().load_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn invalid_config_is_reported() {
        assert!(matches!(
            PipelineConfig::from_json(r#"{"numbered": "yes"}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            PipelineConfig::from_json(r#"{"print": {"scale": 9.0}}"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn partial_print_config_still_prints_background_and_band() {
        let config = PipelineConfig::from_json(r#"{"print": {"landscape": true}}"#).unwrap();
        let csv = "Name,Address\nJohn Doe,1 Main St\n";
        let (bytes, layout) = generate_pdf(csv.as_bytes(), default_template(), &config).unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
        let layout = layout.unwrap();
        assert_eq!(layout.page_width_pt, 792.0);
        assert!(layout.print_background);
        assert!(layout.header_footer.is_some());
    }

    #[test]
    fn pipeline_basic() {
        let csv = "Name,Address\nJohn Doe,1 Main St\n";
        let (bytes, layout) =
            generate_pdf(csv.as_bytes(), default_template(), &PipelineConfig::default()).unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
        let layout = layout.unwrap();
        assert_eq!(layout.title, "Untitled");
        assert_eq!(layout.page_count(), 1);
    }
}
