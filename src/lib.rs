//! # csv-forge – CSV → HTML → PDF report pipeline
//!
//! The pipeline stages are:
//!
//! 1. **Read** – CSV records from any reader ([`rows`])
//! 2. **Format** – records → `<tr>` fragment ([`table`])
//! 3. **Compose** – literal placeholder substitution into a template
//!    ([`template`], [`templates`])
//! 4. **Render** – drive a rendering engine from blank page to PDF bytes
//!    ([`orchestrator`] over the [`engine::RenderEngine`] capability)
//!
//! The crate ships one engine, [`embedded::EmbeddedEngine`], an in-process
//! renderer for the HTML subset reports use:
//! parse ([`dom`]) → style ([`style`]) → lay out with Taffy ([`layout`]) →
//! paginate ([`pagination`]) → write PDF via printpdf ([`render`]).

pub mod dom;
pub mod embedded;
pub mod engine;
pub mod error;
pub mod fonts;
pub mod latch;
pub mod layout;
pub mod layout_config;
pub mod orchestrator;
pub mod pagination;
pub mod pipeline;
pub mod render;
pub mod rows;
pub mod style;
pub mod table;
pub mod template;
pub mod templates;

// Re-exports for convenience
pub use error::{Error, Result};
pub use pipeline::{build_document, generate_pdf, PipelineConfig};
