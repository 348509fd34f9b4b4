//! Mock Speech Recognizer for Testing
//!
//! Records start/stop calls and lets tests speak into the running session.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;
use krrish::asr::{
    RecognitionErrorCode, RecognitionEvent, RecognizerOptions, ResultSegment, SessionId,
    SpeechRecognizer,
};
use krrish::error::{KrrishError, KrrishResult};
use krrish::i18n::Language;
use krrish::machine::Event;

/// One call made on the recognizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerCall {
    Start(SessionId, Language),
    Stop,
}

/// Mock recognizer that behaves like a continuous browser session
pub struct MockRecognizer {
    events: UnboundedSender<Event>,
    active: Arc<Mutex<Option<SessionId>>>,
    /// Record of all calls (for verification)
    pub calls: Arc<Mutex<Vec<RecognizerCall>>>,
    /// Simulate failure on next start
    pub should_fail: Arc<Mutex<bool>>,
}

/// Test side of the recognizer: "speaks" into the active session
#[derive(Clone)]
pub struct MockMicrophone {
    events: UnboundedSender<Event>,
    active: Arc<Mutex<Option<SessionId>>>,
}

impl MockRecognizer {
    pub fn new(events: UnboundedSender<Event>) -> (Self, MockMicrophone) {
        let active = Arc::new(Mutex::new(None));
        let microphone = MockMicrophone {
            events: events.clone(),
            active: active.clone(),
        };
        let recognizer = Self {
            events,
            active,
            calls: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
        };
        (recognizer, microphone)
    }
}

impl SpeechRecognizer for MockRecognizer {
    fn start(&mut self, session: SessionId, options: RecognizerOptions) -> KrrishResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(RecognizerCall::Start(session, options.language));
        if *self.should_fail.lock().unwrap() {
            return Err(KrrishError::Recognition("Mock recognizer failure".to_string()));
        }
        *self.active.lock().unwrap() = Some(session);
        let _ = self.events.send(Event::Recognition {
            session,
            event: RecognitionEvent::Started,
        });
        Ok(())
    }

    fn stop(&mut self) {
        self.calls.lock().unwrap().push(RecognizerCall::Stop);
        if let Some(session) = self.active.lock().unwrap().take() {
            let _ = self.events.send(Event::Recognition {
                session,
                event: RecognitionEvent::Error(RecognitionErrorCode::Aborted),
            });
            let _ = self.events.send(Event::Recognition {
                session,
                event: RecognitionEvent::Ended,
            });
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

impl MockMicrophone {
    /// Deliver a committed transcript; false if nothing is listening
    pub fn say(&self, text: &str) -> bool {
        self.deliver(ResultSegment::final_text(text))
    }

    /// Deliver a provisional transcript; false if nothing is listening
    pub fn murmur(&self, text: &str) -> bool {
        self.deliver(ResultSegment::interim(text))
    }

    /// Drop the session as a flaky recognizer would
    pub fn hang_up(&self) -> bool {
        let Some(session) = self.active.lock().unwrap().take() else {
            return false;
        };
        self.events
            .send(Event::Recognition {
                session,
                event: RecognitionEvent::Ended,
            })
            .is_ok()
    }

    pub fn active_session(&self) -> Option<SessionId> {
        *self.active.lock().unwrap()
    }

    fn deliver(&self, segment: ResultSegment) -> bool {
        let Some(session) = self.active_session() else {
            return false;
        };
        self.events
            .send(Event::Recognition {
                session,
                event: RecognitionEvent::Result(vec![segment]),
            })
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_recognizer_records_calls() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let (mut recognizer, microphone) = MockRecognizer::new(tx);
        assert!(!microphone.say("hello"));

        recognizer
            .start(3, RecognizerOptions::continuous(Language::Telugu))
            .unwrap();
        assert_eq!(microphone.active_session(), Some(3));
        assert!(microphone.say("hello"));
        recognizer.stop();

        assert_eq!(
            *recognizer.calls.lock().unwrap(),
            vec![RecognizerCall::Start(3, Language::Telugu), RecognizerCall::Stop]
        );
        let mut received = Vec::new();
        while let Ok(event) = rx.try_recv() {
            received.push(event);
        }
        assert_eq!(received.len(), 4);
    }
}
