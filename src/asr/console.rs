//! Console recognizer
//!
//! Treats typed lines as recognition results so the assistant can be
//! driven from a terminal. Lines are only delivered while a session is
//! running, like a real microphone session.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use super::{RecognitionEvent, RecognizerOptions, ResultSegment, SessionId, SpeechRecognizer};
use crate::error::KrrishResult;
use crate::i18n::Language;
use crate::machine::Event;

#[derive(Debug, Default)]
struct Shared {
    session: Option<SessionId>,
    language: Language,
}

/// Recognizer half, owned by the event loop
#[derive(Debug)]
pub struct ConsoleRecognizer {
    shared: Arc<Mutex<Shared>>,
    events: UnboundedSender<Event>,
}

/// Input half, fed by whoever reads the terminal
#[derive(Debug, Clone)]
pub struct ConsoleFeed {
    shared: Arc<Mutex<Shared>>,
    events: UnboundedSender<Event>,
}

impl ConsoleRecognizer {
    pub fn new(events: UnboundedSender<Event>) -> (Self, ConsoleFeed) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let feed = ConsoleFeed {
            shared: shared.clone(),
            events: events.clone(),
        };
        (Self { shared, events }, feed)
    }
}

impl SpeechRecognizer for ConsoleRecognizer {
    fn start(&mut self, session: SessionId, options: RecognizerOptions) -> KrrishResult<()> {
        if let Ok(mut shared) = self.shared.lock() {
            shared.session = Some(session);
            shared.language = options.language;
        }
        debug!("Console recognition session {} started ({})", session, options.language);
        let _ = self.events.send(Event::Recognition {
            session,
            event: RecognitionEvent::Started,
        });
        Ok(())
    }

    fn stop(&mut self) {
        let stopped = self
            .shared
            .lock()
            .ok()
            .and_then(|mut shared| shared.session.take());
        if let Some(session) = stopped {
            let _ = self.events.send(Event::Recognition {
                session,
                event: RecognitionEvent::Error(super::RecognitionErrorCode::Aborted),
            });
            let _ = self.events.send(Event::Recognition {
                session,
                event: RecognitionEvent::Ended,
            });
        }
    }

    fn name(&self) -> &str {
        "console"
    }
}

impl ConsoleFeed {
    /// Deliver a line as a committed transcript; returns false if not listening
    pub fn push_final(&self, text: &str) -> bool {
        self.push(ResultSegment::final_text(text))
    }

    /// Deliver a line as a provisional transcript; returns false if not listening
    pub fn push_interim(&self, text: &str) -> bool {
        self.push(ResultSegment::interim(text))
    }

    /// Language of the running session, if any
    pub fn listening_language(&self) -> Option<Language> {
        let shared = self.shared.lock().ok()?;
        shared.session.map(|_| shared.language)
    }

    fn push(&self, segment: ResultSegment) -> bool {
        let session = self.shared.lock().ok().and_then(|shared| shared.session);
        match session {
            Some(session) => self
                .events
                .send(Event::Recognition {
                    session,
                    event: RecognitionEvent::Result(vec![segment]),
                })
                .is_ok(),
            None => false,
        }
    }
}
