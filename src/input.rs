//! Speech Input Controller
//!
//! Owns the continuous recognition session: guards `start` with an explicit
//! active flag, drops events from sessions it no longer owns, splits result
//! batches into interim and final text, holds the partial command while one
//! is being captured, and decides when a dropped session should come back.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::asr::{split_results, RecognitionEvent, RecognizerOptions, SessionId};
use crate::config::Timings;
use crate::i18n::Language;
use crate::machine::Effect;

/// Recognition session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    /// `start` issued, `Started` not yet seen
    Starting(SessionId),
    Running(SessionId),
}

/// Text captured after the wake word while waiting for a pause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    text: String,
    deadline: Instant,
}

impl PendingCommand {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// When the pause timer will finalize this command
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

/// What an incoming recognition event means for the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSignal {
    /// Event from a session we no longer own
    Stale,
    Started,
    /// Normalized interim and final text; either may be empty
    Transcript { interim: String, final_text: String },
    /// Session dropped on its own; restart after the delay if appropriate
    Dropped { restart_after: Duration },
    /// Session stopped with "aborted"; never restarted
    Aborted,
}

#[derive(Debug)]
pub struct SpeechInputController {
    state: SessionState,
    last_session: SessionId,
    language: Language,
    pending: Option<PendingCommand>,
    timings: Timings,
}

/// Lowercase and trim a transcript
pub fn normalize_transcript(text: &str) -> String {
    text.trim().to_lowercase()
}

impl SpeechInputController {
    pub fn new(language: Language, timings: Timings) -> Self {
        Self {
            state: SessionState::Idle,
            last_session: 0,
            language,
            pending: None,
            timings,
        }
    }

    /// True from `start` until the session stops or drops
    pub fn is_active(&self) -> bool {
        !matches!(self.state, SessionState::Idle)
    }

    pub fn current_session(&self) -> Option<SessionId> {
        match self.state {
            SessionState::Idle => None,
            SessionState::Starting(id) | SessionState::Running(id) => Some(id),
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    pub fn pending(&self) -> Option<&PendingCommand> {
        self.pending.as_ref()
    }

    /// Begin a new session unless one is already active
    pub fn start(&mut self) -> Option<Effect> {
        if self.is_active() {
            debug!("Recognition already active, start ignored");
            return None;
        }
        self.last_session += 1;
        let session = self.last_session;
        self.state = SessionState::Starting(session);
        Some(Effect::StartRecognition {
            session,
            options: RecognizerOptions::continuous(self.language),
        })
    }

    /// Stop the active session and discard any partial command
    pub fn stop(&mut self) -> Option<Effect> {
        self.pending = None;
        if !self.is_active() {
            return None;
        }
        self.state = SessionState::Idle;
        Some(Effect::StopRecognition)
    }

    /// Route one recognizer event
    pub fn accept(&mut self, session: SessionId, event: RecognitionEvent) -> InputSignal {
        if self.current_session() != Some(session) {
            debug!("Dropping {:?} from stale session {}", event, session);
            return InputSignal::Stale;
        }

        match event {
            RecognitionEvent::Started => {
                self.state = SessionState::Running(session);
                info!("🎙️ Speech recognition started ({})", self.language);
                InputSignal::Started
            }
            RecognitionEvent::Result(segments) => {
                let (interim, final_text) = split_results(&segments);
                InputSignal::Transcript {
                    interim: normalize_transcript(&interim),
                    final_text: normalize_transcript(&final_text),
                }
            }
            RecognitionEvent::Error(code) => {
                self.state = SessionState::Idle;
                if code.is_aborted() {
                    debug!("Recognition session {} aborted", session);
                    InputSignal::Aborted
                } else {
                    debug!("Speech recognition error: {:?}", code);
                    InputSignal::Dropped {
                        restart_after: self.timings.restart_after_error,
                    }
                }
            }
            RecognitionEvent::Ended => {
                self.state = SessionState::Idle;
                debug!("Speech recognition ended");
                InputSignal::Dropped {
                    restart_after: self.timings.restart_after_end,
                }
            }
        }
    }

    /// Record the latest interim text of a command being captured
    pub fn note_interim(&mut self, interim: &str, now: Instant) {
        self.pending = Some(PendingCommand {
            text: interim.trim().to_string(),
            deadline: now + self.timings.pause_finalize,
        });
    }

    /// Finalize with the last interim text after a pause
    ///
    /// Returns the command and the teardown effect; `None` when nothing
    /// non-empty was captured.
    pub fn finalize_pending(&mut self) -> Option<(String, Option<Effect>)> {
        let text = self.pending.take()?.text;
        if text.is_empty() {
            return None;
        }
        Some((text, self.stop()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asr::{RecognitionErrorCode, ResultSegment};

    fn controller() -> SpeechInputController {
        SpeechInputController::new(Language::English, Timings::default())
    }

    #[test]
    fn test_start_is_idempotent() {
        let mut input = controller();
        assert!(matches!(
            input.start(),
            Some(Effect::StartRecognition { session: 1, .. })
        ));
        assert!(input.start().is_none());
        assert!(input.is_active());

        assert_eq!(input.accept(1, RecognitionEvent::Started), InputSignal::Started);
        assert!(input.start().is_none());
    }

    #[test]
    fn test_stale_session_events_are_dropped() {
        let mut input = controller();
        input.start();
        input.stop();
        input.start();

        assert_eq!(input.accept(1, RecognitionEvent::Ended), InputSignal::Stale);
        assert!(input.is_active());
        assert_eq!(input.current_session(), Some(2));
    }

    #[test]
    fn test_result_batches_are_split_and_normalized() {
        let mut input = controller();
        input.start();
        let signal = input.accept(
            1,
            RecognitionEvent::Result(vec![
                ResultSegment::final_text(" Hey Krrish "),
                ResultSegment::interim("What's"),
            ]),
        );
        assert_eq!(
            signal,
            InputSignal::Transcript {
                interim: "what's".to_string(),
                final_text: "hey krrish".to_string(),
            }
        );
    }

    #[test]
    fn test_drop_delays() {
        let mut input = controller();
        input.start();
        assert_eq!(
            input.accept(1, RecognitionEvent::Ended),
            InputSignal::Dropped {
                restart_after: Duration::from_millis(500)
            }
        );
        assert!(!input.is_active());

        input.start();
        assert_eq!(
            input.accept(2, RecognitionEvent::Error(RecognitionErrorCode::NoSpeech)),
            InputSignal::Dropped {
                restart_after: Duration::from_secs(1)
            }
        );

        input.start();
        assert_eq!(
            input.accept(3, RecognitionEvent::Error(RecognitionErrorCode::Aborted)),
            InputSignal::Aborted
        );
    }

    #[test]
    fn test_pending_finalization_tears_down_once() {
        let mut input = controller();
        input.start();
        let now = Instant::now();
        input.note_interim("turn on the fan", now);
        assert_eq!(
            input.pending().unwrap().deadline(),
            now + Duration::from_secs(2)
        );

        let (command, teardown) = input.finalize_pending().unwrap();
        assert_eq!(command, "turn on the fan");
        assert_eq!(teardown, Some(Effect::StopRecognition));
        assert!(input.finalize_pending().is_none());
        assert!(input.stop().is_none());
    }

    #[test]
    fn test_stop_discards_pending() {
        let mut input = controller();
        input.start();
        input.note_interim("half a command", Instant::now());
        input.stop();
        assert!(input.pending().is_none());
    }
}
