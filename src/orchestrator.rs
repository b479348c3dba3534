//! Render orchestrator – drives a [`RenderEngine`] from an HTML document to
//! PDF bytes.
//!
//! The engine is walked through a fixed sequence:
//!
//! 1. navigate to a blank document,
//! 2. arm a one-shot load listener,
//! 3. look up the root frame and inject the document,
//! 4. wait for the load-complete signal,
//! 5. print to PDF.
//!
//! The listener is armed strictly before injection and signals a [`Latch`],
//! so a load event delivered at any moment after arming (even synchronously,
//! inside the registration call) is observed by the wait in step 4.

use std::fmt;
use std::time::Duration;

use crate::engine::{ListenerControl, ListenerId, PrintOptions, RenderEngine, BLANK_URL};
use crate::error::{Error, RenderStep, Result};
use crate::latch::{CancelToken, Latch, WaitOutcome};
use crate::template::RenderDocument;

/// Progress of a single render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    Navigated,
    ListenerArmed,
    ContentInjected,
    LoadConfirmed,
    Captured,
    Done,
    Failed,
}

impl RenderState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RenderState::Done | RenderState::Failed)
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Per-session render settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Page geometry for the capture step. Backgrounds and the
    /// header/footer band are always printed, whatever these flags say.
    pub print: PrintOptions,
    /// Upper bound on the load wait; `None` waits indefinitely.
    pub load_timeout: Option<Duration>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            print: PrintOptions::report(),
            load_timeout: None,
        }
    }
}

/// Owns one engine session and renders documents on it, one at a time.
pub struct RenderOrchestrator<E: RenderEngine> {
    engine: E,
    options: RenderOptions,
    state: RenderState,
}

impl<E: RenderEngine> RenderOrchestrator<E> {
    pub fn new(engine: E, options: RenderOptions) -> Self {
        Self {
            engine,
            options,
            state: RenderState::Idle,
        }
    }

    /// State reached by the most recent render.
    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Give the engine session back to the caller.
    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Render `doc` to PDF bytes.
    ///
    /// Any failure leaves the orchestrator in [`RenderState::Failed`]; the
    /// engine session should then be discarded by the caller.
    pub fn render(&mut self, doc: &RenderDocument, cancel: &CancelToken) -> Result<Vec<u8>> {
        self.state = RenderState::Idle;
        let latch = Latch::new();
        let mut listener: Option<ListenerId> = None;

        let result = self.run_steps(doc, cancel, &latch, &mut listener);

        if let Some(id) = listener {
            self.engine.remove_listener(id);
        }
        match result {
            Ok(pdf) => {
                self.transition(RenderState::Done);
                Ok(pdf)
            }
            Err(err) => {
                log::debug!("render failed in state {}: {err}", self.state);
                self.state = RenderState::Failed;
                Err(err)
            }
        }
    }

    fn run_steps(
        &mut self,
        doc: &RenderDocument,
        cancel: &CancelToken,
        latch: &Latch,
        listener: &mut Option<ListenerId>,
    ) -> Result<Vec<u8>> {
        check_cancelled(cancel)?;
        self.engine
            .navigate(BLANK_URL)
            .map_err(|e| Error::engine(RenderStep::Navigate, e))?;
        self.transition(RenderState::Navigated);

        check_cancelled(cancel)?;
        let signal = latch.clone();
        let id = self
            .engine
            .listen_load_complete(Box::new(move || {
                if signal.fire() {
                    log::debug!("load-complete event received");
                }
                ListenerControl::Remove
            }))
            .map_err(|e| Error::engine(RenderStep::ArmListener, e))?;
        *listener = Some(id);
        self.transition(RenderState::ListenerArmed);

        check_cancelled(cancel)?;
        let frame = self
            .engine
            .root_frame_id()
            .map_err(|e| Error::engine(RenderStep::FrameLookup, e))?;
        self.engine
            .set_document_content(&frame, doc.html())
            .map_err(|e| Error::engine(RenderStep::InjectContent, e))?;
        self.transition(RenderState::ContentInjected);

        match latch.wait(self.options.load_timeout, cancel) {
            WaitOutcome::Fired => {}
            WaitOutcome::Cancelled => return Err(Error::Cancelled),
            WaitOutcome::TimedOut => {
                return Err(Error::RenderTimeout(
                    self.options.load_timeout.unwrap_or_default(),
                ))
            }
        }
        self.transition(RenderState::LoadConfirmed);

        check_cancelled(cancel)?;
        let pdf = self
            .engine
            .print_to_pdf(&self.capture_options())
            .map_err(|e| Error::engine(RenderStep::Capture, e))?;
        self.transition(RenderState::Captured);

        check_cancelled(cancel)?;
        Ok(pdf)
    }

    fn capture_options(&self) -> PrintOptions {
        PrintOptions {
            print_background: true,
            display_header_footer: true,
            ..self.options.print.clone()
        }
    }

    fn transition(&mut self, next: RenderState) {
        log::debug!("render state {} -> {}", self.state, next);
        self.state = next;
    }
}

fn check_cancelled(cancel: &CancelToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, FrameId, LoadHandler};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::thread;

    #[derive(Default)]
    struct Mock {
        calls: Vec<String>,
        listeners: HashMap<u64, LoadHandler>,
        next_id: u64,
        fire_on_listen: bool,
        fire_on_set: bool,
        fail_print: bool,
    }

    /// Engine stand-in that records calls and fires load events on demand.
    #[derive(Clone, Default)]
    struct MockEngine(Arc<Mutex<Mock>>);

    impl MockEngine {
        fn calls(&self) -> Vec<String> {
            self.0.lock().unwrap().calls.clone()
        }

        fn listener_count(&self) -> usize {
            self.0.lock().unwrap().listeners.len()
        }

        fn fire_all(&self) {
            let mut mock = self.0.lock().unwrap();
            mock.calls.push("load-event".into());
            mock
                .listeners
                .retain(|_, handler| handler() == ListenerControl::Keep);
        }
    }

    impl RenderEngine for MockEngine {
        fn navigate(&mut self, url: &str) -> std::result::Result<(), EngineError> {
            self.0.lock().unwrap().calls.push(format!("navigate {url}"));
            Ok(())
        }

        fn listen_load_complete(
            &mut self,
            handler: LoadHandler,
        ) -> std::result::Result<ListenerId, EngineError> {
            let fire = {
                let mut mock = self.0.lock().unwrap();
                mock.calls.push("listen".into());
                mock.next_id += 1;
                let id = mock.next_id;
                mock.listeners.insert(id, handler);
                mock.fire_on_listen
            };
            if fire {
                self.fire_all();
                self.fire_all();
            }
            Ok(ListenerId(self.0.lock().unwrap().next_id))
        }

        fn remove_listener(&mut self, id: ListenerId) {
            let mut mock = self.0.lock().unwrap();
            mock.calls.push("remove-listener".into());
            mock.listeners.remove(&id.0);
        }

        fn root_frame_id(&mut self) -> std::result::Result<FrameId, EngineError> {
            self.0.lock().unwrap().calls.push("frame".into());
            Ok(FrameId("main".into()))
        }

        fn set_document_content(
            &mut self,
            frame: &FrameId,
            _html: &str,
        ) -> std::result::Result<(), EngineError> {
            let fire = {
                let mut mock = self.0.lock().unwrap();
                mock.calls.push(format!("set-content {frame}"));
                mock.fire_on_set
            };
            if fire {
                let engine = self.clone();
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(20));
                    engine.fire_all();
                });
            }
            Ok(())
        }

        fn print_to_pdf(
            &mut self,
            options: &PrintOptions,
        ) -> std::result::Result<Vec<u8>, EngineError> {
            let mut mock = self.0.lock().unwrap();
            mock.calls.push(format!(
                "print background={} header_footer={}",
                options.print_background, options.display_header_footer
            ));
            if mock.fail_print {
                return Err(EngineError::new("Printing failed"));
            }
            Ok(b"%PDF-mock".to_vec())
        }
    }

    fn mock(configure: impl FnOnce(&mut Mock)) -> MockEngine {
        let engine = MockEngine::default();
        configure(&mut engine.0.lock().unwrap());
        engine
    }

    fn doc() -> RenderDocument {
        RenderDocument::new("<table><tr><td>x</td></tr></table>")
    }

    #[test]
    fn async_load_event_gates_capture() {
        let engine = mock(|p| p.fire_on_set = true);
        let mut orchestrator = RenderOrchestrator::new(engine.clone(), RenderOptions::default());
        let pdf = orchestrator.render(&doc(), &CancelToken::new()).unwrap();

        assert_eq!(pdf, b"%PDF-mock");
        assert_eq!(orchestrator.state(), RenderState::Done);
        assert_eq!(
            engine.calls(),
            vec![
                "navigate about:blank",
                "listen",
                "frame",
                "set-content main",
                "load-event",
                "print background=true header_footer=true",
                "remove-listener",
            ]
        );
    }

    #[test]
    fn synchronous_load_event_during_registration_is_not_missed() {
        let engine = mock(|p| p.fire_on_listen = true);
        let mut orchestrator = RenderOrchestrator::new(engine.clone(), RenderOptions::default());
        orchestrator.render(&doc(), &CancelToken::new()).unwrap();

        let calls = engine.calls();
        let set = calls.iter().position(|c| c.starts_with("set-content")).unwrap();
        let print = calls.iter().position(|c| c.starts_with("print")).unwrap();
        assert!(set < print, "capture ran before injection: {calls:?}");
        // The handler removed itself after the first event.
        assert_eq!(calls.iter().filter(|c| *c == "load-event").count(), 2);
        assert_eq!(engine.listener_count(), 0);
    }

    #[test]
    fn capture_failure_is_engine_error() {
        let engine = mock(|p| {
            p.fire_on_set = true;
            p.fail_print = true;
        });
        let mut orchestrator = RenderOrchestrator::new(engine.clone(), RenderOptions::default());
        let err = orchestrator.render(&doc(), &CancelToken::new()).unwrap_err();

        match err {
            Error::RenderEngine { step, source } => {
                assert_eq!(step, RenderStep::Capture);
                assert_eq!(source.message, "Printing failed");
            }
            other => panic!("expected RenderEngine error, got {other:?}"),
        }
        assert_eq!(orchestrator.state(), RenderState::Failed);
        assert_eq!(engine.listener_count(), 0);
    }

    #[test]
    fn capture_always_prints_background_and_header_footer() {
        let engine = mock(|p| p.fire_on_set = true);
        let options = RenderOptions {
            print: PrintOptions {
                landscape: true,
                ..PrintOptions::default()
            },
            ..RenderOptions::default()
        };
        let mut orchestrator = RenderOrchestrator::new(engine.clone(), options);
        orchestrator.render(&doc(), &CancelToken::new()).unwrap();

        let calls = engine.calls();
        assert!(
            calls.contains(&"print background=true header_footer=true".to_string()),
            "{calls:?}"
        );
    }

    #[test]
    fn missing_load_event_times_out() {
        let engine = mock(|_| {});
        let options = RenderOptions {
            load_timeout: Some(Duration::from_millis(40)),
            ..RenderOptions::default()
        };
        let mut orchestrator = RenderOrchestrator::new(engine.clone(), options);
        let err = orchestrator.render(&doc(), &CancelToken::new()).unwrap_err();

        assert!(matches!(err, Error::RenderTimeout(d) if d == Duration::from_millis(40)));
        assert_eq!(orchestrator.state(), RenderState::Failed);
        assert!(!engine.calls().iter().any(|c| c.starts_with("print")));
        assert_eq!(engine.listener_count(), 0);
    }

    #[test]
    fn cancellation_releases_wait_and_deregisters() {
        let engine = mock(|_| {});
        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            remote.cancel();
        });

        let mut orchestrator = RenderOrchestrator::new(engine.clone(), RenderOptions::default());
        let err = orchestrator.render(&doc(), &cancel).unwrap_err();
        handle.join().unwrap();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(orchestrator.state(), RenderState::Failed);
        assert_eq!(engine.listener_count(), 0);
        assert!(!engine.calls().iter().any(|c| c.starts_with("print")));
    }

    #[test]
    fn cancelled_before_start_touches_nothing() {
        let engine = mock(|_| {});
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut orchestrator = RenderOrchestrator::new(engine.clone(), RenderOptions::default());
        assert!(matches!(
            orchestrator.render(&doc(), &cancel),
            Err(Error::Cancelled)
        ));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn session_is_reusable_after_success() {
        let engine = mock(|p| p.fire_on_set = true);
        let mut orchestrator = RenderOrchestrator::new(engine, RenderOptions::default());
        for _ in 0..3 {
            orchestrator.render(&doc(), &CancelToken::new()).unwrap();
            assert_eq!(orchestrator.state(), RenderState::Done);
        }
    }
}
