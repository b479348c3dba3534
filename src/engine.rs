//! Rendering engine capability.
//!
//! The orchestrator talks to an engine only through [`RenderEngine`]: it can
//! navigate, listen for load completion, look up the root frame, replace the
//! frame's document and print the current document to PDF. Commands return
//! as soon as the engine has accepted them; load completion arrives later on
//! whatever thread the engine delivers events from.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The blank document URL used to reset an engine session.
pub const BLANK_URL: &str = "about:blank";

/// Failure reported by a rendering engine, carrying its diagnostic text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Identifier of a document frame inside an engine session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameId(pub String);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle of a registered load listener, used to deregister it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// What a load handler wants done with its registration after running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerControl {
    Keep,
    Remove,
}

/// Callback invoked when the engine reports that a document finished loading.
pub type LoadHandler = Box<dyn FnMut() -> ListenerControl + Send>;

/// Options for [`RenderEngine::print_to_pdf`].
///
/// Field names serialise like the devtools `Page.printToPDF` parameters.
/// Sizes are in inches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrintOptions {
    pub print_background: bool,
    pub display_header_footer: bool,
    pub landscape: bool,
    pub paper_width: f32,
    pub paper_height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
    pub scale: f32,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            print_background: false,
            display_header_footer: false,
            landscape: false,
            paper_width: 8.5,
            paper_height: 11.0,
            margin_top: 0.4,
            margin_bottom: 0.4,
            margin_left: 0.4,
            margin_right: 0.4,
            scale: 1.0,
        }
    }
}

impl PrintOptions {
    /// The options every pipeline capture uses: backgrounds and the
    /// header/footer band enabled.
    pub fn report() -> Self {
        Self {
            print_background: true,
            display_header_footer: true,
            ..Self::default()
        }
    }

    /// Page width in points after applying orientation.
    pub fn page_width_pt(&self) -> f32 {
        let w = if self.landscape {
            self.paper_height
        } else {
            self.paper_width
        };
        w * 72.0
    }

    /// Page height in points after applying orientation.
    pub fn page_height_pt(&self) -> f32 {
        let h = if self.landscape {
            self.paper_width
        } else {
            self.paper_height
        };
        h * 72.0
    }

    /// Reject sizes no engine could print.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.paper_width <= 0.0 || self.paper_height <= 0.0 {
            return Err(EngineError::new("paper size must be positive"));
        }
        let content_w = self.page_width_pt() / 72.0 - self.margin_left - self.margin_right;
        let content_h = self.page_height_pt() / 72.0 - self.margin_top - self.margin_bottom;
        if content_w <= 0.0 || content_h <= 0.0 {
            return Err(EngineError::new("margins leave no printable area"));
        }
        if !(0.1..=2.0).contains(&self.scale) {
            return Err(EngineError::new(format!(
                "scale {} is outside the range 0.1..=2.0",
                self.scale
            )));
        }
        Ok(())
    }
}

/// A controllable rendering engine session.
///
/// One session serves one render at a time; callers needing concurrency use
/// one session per render.
pub trait RenderEngine: Send {
    /// Load `url` into the root frame, replacing the current document.
    fn navigate(&mut self, url: &str) -> Result<(), EngineError>;

    /// Register `handler` for load-complete events of the root frame.
    fn listen_load_complete(&mut self, handler: LoadHandler) -> Result<ListenerId, EngineError>;

    /// Deregister a listener. Unknown or already removed ids are ignored.
    fn remove_listener(&mut self, id: ListenerId);

    /// Identifier of the currently active root frame.
    fn root_frame_id(&mut self) -> Result<FrameId, EngineError>;

    /// Replace the document of `frame` with `html`.
    fn set_document_content(&mut self, frame: &FrameId, html: &str) -> Result<(), EngineError>;

    /// Print the current document.
    fn print_to_pdf(&mut self, options: &PrintOptions) -> Result<Vec<u8>, EngineError>;
}

impl<E: RenderEngine + ?Sized> RenderEngine for Box<E> {
    fn navigate(&mut self, url: &str) -> Result<(), EngineError> {
        (**self).navigate(url)
    }

    fn listen_load_complete(&mut self, handler: LoadHandler) -> Result<ListenerId, EngineError> {
        (**self).listen_load_complete(handler)
    }

    fn remove_listener(&mut self, id: ListenerId) {
        (**self).remove_listener(id)
    }

    fn root_frame_id(&mut self) -> Result<FrameId, EngineError> {
        (**self).root_frame_id()
    }

    fn set_document_content(&mut self, frame: &FrameId, html: &str) -> Result<(), EngineError> {
        (**self).set_document_content(frame, html)
    }

    fn print_to_pdf(&mut self, options: &PrintOptions) -> Result<Vec<u8>, EngineError> {
        (**self).print_to_pdf(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_options_use_devtools_names() {
        let json = serde_json::to_value(PrintOptions::report()).unwrap();
        assert_eq!(json["printBackground"], true);
        assert_eq!(json["displayHeaderFooter"], true);
        assert_eq!(json["paperWidth"], 8.5);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let opts: PrintOptions = serde_json::from_str(r#"{"landscape": true}"#).unwrap();
        assert!(opts.landscape);
        assert_eq!(opts.page_width_pt(), 11.0 * 72.0);
        assert_eq!(opts.page_height_pt(), 8.5 * 72.0);
    }

    #[test]
    fn validate_rejects_oversized_margins() {
        let opts = PrintOptions {
            margin_left: 5.0,
            margin_right: 5.0,
            ..PrintOptions::default()
        };
        assert!(opts.validate().is_err());
        assert!(PrintOptions::report().validate().is_ok());
    }
}
