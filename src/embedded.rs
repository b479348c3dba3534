//! Embedded rendering engine – an in-process HTML subset renderer behind
//! the [`RenderEngine`] capability.
//!
//! A worker thread owns the loaded document. Commands travel over a
//! `crossbeam-channel` queue; `set_document_content` only enqueues the
//! document, and the worker announces load completion by calling the
//! registered listeners from its own thread once the document is parsed and
//! laid out. `navigate` and `print_to_pdf` wait for the worker's reply.
//!
//! The engine has no network stack: only `about:blank` can be navigated to.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

use crate::dom::{parse_document, Document};
use crate::engine::{
    EngineError, FrameId, ListenerControl, ListenerId, LoadHandler, PrintOptions, RenderEngine,
    BLANK_URL,
};
use crate::layout::{compute_layout, PositionedBox};
use crate::layout_config::PrintLayout;
use crate::pagination::{paginate, PageGeometry};
use crate::render::render_pdf;

/// Name of the worker thread; load listeners run on it.
pub const WORKER_THREAD_NAME: &str = "csv-forge-renderer";

type PrintReply = Result<(Vec<u8>, PrintLayout), EngineError>;

enum Command {
    Reset {
        frame: FrameId,
        reply: Sender<()>,
    },
    Load {
        frame: FrameId,
        html: String,
    },
    Print {
        options: PrintOptions,
        reply: Sender<PrintReply>,
    },
    Shutdown,
}

// ---------------------------------------------------------------------------
// Listener registry
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Listeners {
    next_id: u64,
    handlers: Vec<(ListenerId, LoadHandler)>,
}

type SharedListeners = Arc<Mutex<Listeners>>;

fn lock(listeners: &SharedListeners) -> MutexGuard<'_, Listeners> {
    // A handler that panicked leaves the registry itself consistent.
    listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Run every registered handler, dropping those that ask to be removed.
/// Handlers run with the registry locked and must not call back into the
/// engine.
fn notify_load(listeners: &SharedListeners) {
    let mut registry = lock(listeners);
    registry
        .handlers
        .retain_mut(|(_, handler)| handler() == ListenerControl::Keep);
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

struct LoadedDocument {
    document: Document,
    /// Layout computed at load time and the content width it was made for.
    layout: Result<(f32, Vec<PositionedBox>), String>,
}

struct Worker {
    frame: FrameId,
    loaded: Option<LoadedDocument>,
    listeners: SharedListeners,
}

impl Worker {
    fn run(mut self, commands: Receiver<Command>) {
        for command in commands.iter() {
            match command {
                Command::Reset { frame, reply } => {
                    log::debug!("frame {} reset to {}", frame, BLANK_URL);
                    self.frame = frame;
                    self.loaded = None;
                    let _ = reply.send(());
                }
                Command::Load { frame, html } => {
                    if frame != self.frame {
                        log::warn!("dropping content for stale frame {}", frame);
                        continue;
                    }
                    self.load(&html);
                    notify_load(&self.listeners);
                }
                Command::Print { options, reply } => {
                    let _ = reply.send(self.print(&options));
                }
                Command::Shutdown => break,
            }
        }
        log::debug!("renderer worker stopped");
    }

    fn load(&mut self, html: &str) {
        let document = parse_document(html);
        let width = PageGeometry::from_options(&PrintOptions::report()).content_width_px();
        let layout = compute_layout(&document.body, width).map(|boxes| (width, boxes));
        log::debug!(
            "loaded document '{}' ({} bytes, {} top-level nodes)",
            document.title,
            html.len(),
            document.body.len()
        );
        self.loaded = Some(LoadedDocument { document, layout });
    }

    fn print(&self, options: &PrintOptions) -> PrintReply {
        options.validate()?;
        let geometry = PageGeometry::from_options(options);
        let width = geometry.content_width_px();

        let (title, mut layout) = match &self.loaded {
            None => (String::new(), paginate(&[], &geometry, "")),
            Some(loaded) => {
                let title = loaded.document.title.clone();
                let boxes = match &loaded.layout {
                    Ok((w, boxes)) if (*w - width).abs() < 0.01 => boxes.clone(),
                    Ok(_) => compute_layout(&loaded.document.body, width).map_err(EngineError::new)?,
                    Err(e) => return Err(EngineError::new(e.clone())),
                };
                let layout = paginate(&boxes, &geometry, &title);
                (title, layout)
            }
        };

        layout.print_background = options.print_background;
        if options.display_header_footer {
            let date = chrono::Local::now().format("%-m/%-d/%y").to_string();
            layout.header_footer = Some(geometry.header_footer(&title, &date));
        }
        let bytes = render_pdf(&layout).map_err(|e| EngineError::new(format!("Printing failed: {e}")))?;
        log::debug!("printed {} page(s), {} bytes", layout.page_count(), bytes.len());
        Ok((bytes, layout))
    }
}

// ---------------------------------------------------------------------------
// Engine handle
// ---------------------------------------------------------------------------

/// In-process engine session backed by a renderer worker thread.
pub struct EmbeddedEngine {
    commands: Sender<Command>,
    worker: Option<JoinHandle<()>>,
    listeners: SharedListeners,
    frame: FrameId,
    frames_issued: u64,
    last_layout: Option<PrintLayout>,
}

fn frame_name(n: u64) -> FrameId {
    FrameId(format!("frame-{n}"))
}

impl EmbeddedEngine {
    /// Start the renderer worker with an empty `about:blank` frame.
    pub fn launch() -> Result<Self, EngineError> {
        let (tx, rx) = unbounded();
        let listeners = SharedListeners::default();
        let frame = frame_name(0);
        let worker = Worker {
            frame: frame.clone(),
            loaded: None,
            listeners: Arc::clone(&listeners),
        };
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run(rx))
            .map_err(|e| EngineError::new(format!("failed to start renderer: {e}")))?;
        log::debug!("embedded renderer launched");

        Ok(Self {
            commands: tx,
            worker: Some(handle),
            listeners,
            frame,
            frames_issued: 0,
            last_layout: None,
        })
    }

    /// Layout of the most recent successful print.
    pub fn last_layout(&self) -> Option<&PrintLayout> {
        self.last_layout.as_ref()
    }

    /// The most recent print layout as pretty JSON.
    pub fn layout_json(&self) -> Option<String> {
        self.last_layout.as_ref().and_then(|l| l.to_json().ok())
    }

    fn send(&self, command: Command) -> Result<(), EngineError> {
        self.commands
            .send(command)
            .map_err(|_| EngineError::new("renderer worker has stopped"))
    }
}

impl RenderEngine for EmbeddedEngine {
    fn navigate(&mut self, url: &str) -> Result<(), EngineError> {
        if url != BLANK_URL {
            return Err(EngineError::new(format!(
                "cannot navigate to '{url}': only {BLANK_URL} is supported"
            )));
        }
        self.frames_issued += 1;
        let frame = frame_name(self.frames_issued);
        let (reply, done) = bounded(1);
        self.send(Command::Reset {
            frame: frame.clone(),
            reply,
        })?;
        done.recv()
            .map_err(|_| EngineError::new("renderer worker has stopped"))?;
        self.frame = frame;
        Ok(())
    }

    fn listen_load_complete(&mut self, handler: LoadHandler) -> Result<ListenerId, EngineError> {
        let mut registry = lock(&self.listeners);
        registry.next_id += 1;
        let id = ListenerId(registry.next_id);
        registry.handlers.push((id, handler));
        Ok(id)
    }

    fn remove_listener(&mut self, id: ListenerId) {
        lock(&self.listeners).handlers.retain(|(other, _)| *other != id);
    }

    fn root_frame_id(&mut self) -> Result<FrameId, EngineError> {
        Ok(self.frame.clone())
    }

    fn set_document_content(&mut self, frame: &FrameId, html: &str) -> Result<(), EngineError> {
        if *frame != self.frame {
            return Err(EngineError::new(format!("no frame with id {frame}")));
        }
        self.send(Command::Load {
            frame: frame.clone(),
            html: html.to_string(),
        })
    }

    fn print_to_pdf(&mut self, options: &PrintOptions) -> Result<Vec<u8>, EngineError> {
        let (reply, result) = bounded(1);
        self.send(Command::Print {
            options: options.clone(),
            reply,
        })?;
        let (bytes, layout) = result
            .recv()
            .map_err(|_| EngineError::new("renderer worker has stopped"))??;
        self.last_layout = Some(layout);
        Ok(bytes)
    }
}

impl Drop for EmbeddedEngine {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::warn!("renderer worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn load(engine: &mut EmbeddedEngine, html: &str) {
        let (tx, rx) = bounded(1);
        engine
            .listen_load_complete(Box::new(move || {
                let _ = tx.try_send(());
                ListenerControl::Remove
            }))
            .unwrap();
        let frame = engine.root_frame_id().unwrap();
        engine.set_document_content(&frame, html).unwrap();
        rx.recv_timeout(Duration::from_secs(5)).expect("load event");
    }

    #[test]
    fn load_then_print() {
        let mut engine = EmbeddedEngine::launch().unwrap();
        engine.navigate(BLANK_URL).unwrap();
        load(
            &mut engine,
            "<html><head><title>Contacts</title></head><body><table><tr><td>Name</td></tr></table></body></html>",
        );
        let pdf = engine.print_to_pdf(&PrintOptions::report()).unwrap();
        assert_eq!(&pdf[0..5], b"%PDF-");

        let layout = engine.last_layout().unwrap();
        assert_eq!(layout.title, "Contacts");
        assert_eq!(layout.text_lines().collect::<Vec<_>>(), vec!["Name"]);
        assert!(layout.header_footer.is_some());
    }

    #[test]
    fn listeners_run_on_the_worker_thread() {
        let mut engine = EmbeddedEngine::launch().unwrap();
        engine.navigate(BLANK_URL).unwrap();
        let (tx, rx) = bounded(1);
        engine
            .listen_load_complete(Box::new(move || {
                let _ = tx.try_send(thread::current().name().map(str::to_string));
                ListenerControl::Remove
            }))
            .unwrap();
        let frame = engine.root_frame_id().unwrap();
        engine.set_document_content(&frame, "<p>x</p>").unwrap();
        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some(WORKER_THREAD_NAME));
    }

    #[test]
    fn kept_listener_sees_every_load() {
        let mut engine = EmbeddedEngine::launch().unwrap();
        let (tx, rx) = unbounded();
        let id = engine
            .listen_load_complete(Box::new(move || {
                let _ = tx.send(());
                ListenerControl::Keep
            }))
            .unwrap();
        let frame = engine.root_frame_id().unwrap();
        engine.set_document_content(&frame, "<p>one</p>").unwrap();
        engine.set_document_content(&frame, "<p>two</p>").unwrap();
        for _ in 0..2 {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        engine.remove_listener(id);
        assert!(lock(&engine.listeners).handlers.is_empty());
    }

    #[test]
    fn only_blank_navigation() {
        let mut engine = EmbeddedEngine::launch().unwrap();
        let err = engine.navigate("https://example.com").unwrap_err();
        assert!(err.message.contains("only about:blank"));
    }

    #[test]
    fn navigation_issues_a_new_frame() {
        let mut engine = EmbeddedEngine::launch().unwrap();
        let before = engine.root_frame_id().unwrap();
        engine.navigate(BLANK_URL).unwrap();
        let after = engine.root_frame_id().unwrap();
        assert_ne!(before, after);
        assert!(engine.set_document_content(&before, "<p>x</p>").is_err());
    }

    #[test]
    fn print_without_content_is_blank() {
        let mut engine = EmbeddedEngine::launch().unwrap();
        engine.navigate(BLANK_URL).unwrap();
        let pdf = engine.print_to_pdf(&PrintOptions::default()).unwrap();
        assert_eq!(&pdf[0..5], b"%PDF-");
        let layout = engine.last_layout().unwrap();
        assert_eq!(layout.page_count(), 1);
        assert!(layout.pages[0].boxes.is_empty());
    }

    #[test]
    fn invalid_options_are_rejected() {
        let mut engine = EmbeddedEngine::launch().unwrap();
        let err = engine
            .print_to_pdf(&PrintOptions {
                scale: 5.0,
                ..PrintOptions::default()
            })
            .unwrap_err();
        assert!(err.message.contains("scale"));
        assert!(engine.last_layout().is_none());
    }

    #[test]
    fn navigation_clears_the_document() {
        let mut engine = EmbeddedEngine::launch().unwrap();
        load(&mut engine, "<p>old content</p>");
        engine.navigate(BLANK_URL).unwrap();
        engine.print_to_pdf(&PrintOptions::default()).unwrap();
        assert_eq!(engine.last_layout().unwrap().text_lines().count(), 0);
    }

    #[test]
    fn layout_snapshot_json() {
        let mut engine = EmbeddedEngine::launch().unwrap();
        assert!(engine.layout_json().is_none());
        load(&mut engine, "<p>hello</p>");
        engine.print_to_pdf(&PrintOptions::default()).unwrap();
        let json = engine.layout_json().unwrap();
        assert!(json.contains("\"hello\""));
    }

    #[test]
    fn landscape_relayouts_wider() {
        let mut engine = EmbeddedEngine::launch().unwrap();
        load(&mut engine, "<p>wide</p>");
        engine
            .print_to_pdf(&PrintOptions {
                landscape: true,
                ..PrintOptions::default()
            })
            .unwrap();
        let layout = engine.last_layout().unwrap();
        assert_eq!(layout.page_width_pt, 792.0);
    }
}
