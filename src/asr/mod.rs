//! ASR (Automatic Speech Recognition) Module
//!
//! The speech input boundary: a continuous, interim-enabled recognizer that
//! reports start, result batches, errors and end. Backends push their events
//! into the assistant's event queue tagged with the session id they were
//! started with.

pub mod console;

use crate::error::KrrishResult;
use crate::i18n::Language;

pub use console::{ConsoleFeed, ConsoleRecognizer};

/// Identifies one recognition session from `start` to its end
pub type SessionId = u64;

/// Mode flags handed to the recognizer on start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecognizerOptions {
    pub language: Language,
    pub continuous: bool,
    pub interim_results: bool,
}

impl RecognizerOptions {
    pub fn continuous(language: Language) -> Self {
        Self {
            language,
            continuous: true,
            interim_results: true,
        }
    }
}

/// One partial in a delivered result batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSegment {
    pub transcript: String,
    pub is_final: bool,
}

impl ResultSegment {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            transcript: text.into(),
            is_final: false,
        }
    }

    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            transcript: text.into(),
            is_final: true,
        }
    }
}

/// Error codes a recognizer may report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionErrorCode {
    /// Expected after an intentional stop
    Aborted,
    NoSpeech,
    AudioCapture,
    Network,
    NotAllowed,
    Other(String),
}

impl RecognitionErrorCode {
    pub fn from_code(code: &str) -> Self {
        match code {
            "aborted" => Self::Aborted,
            "no-speech" => Self::NoSpeech,
            "audio-capture" => Self::AudioCapture,
            "network" => Self::Network,
            "not-allowed" => Self::NotAllowed,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// Events emitted by a recognition session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Started,
    Result(Vec<ResultSegment>),
    Error(RecognitionErrorCode),
    Ended,
}

/// Split a result batch into (interim, final) concatenations
pub fn split_results(segments: &[ResultSegment]) -> (String, String) {
    let mut interim = String::new();
    let mut final_text = String::new();
    for segment in segments {
        if segment.is_final {
            final_text.push_str(&segment.transcript);
        } else {
            interim.push_str(&segment.transcript);
        }
    }
    (interim, final_text)
}

/// Trait for continuous speech recognizers
pub trait SpeechRecognizer: Send {
    /// Begin a session; events must be tagged with `session`
    fn start(&mut self, session: SessionId, options: RecognizerOptions) -> KrrishResult<()>;

    /// Stop the current session, if any
    fn stop(&mut self);

    /// Get the recognizer name
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_results_concatenates_by_kind() {
        let batch = vec![
            ResultSegment::final_text("hey krrish "),
            ResultSegment::interim("what's "),
            ResultSegment::final_text("play"),
            ResultSegment::interim("the weather"),
        ];
        let (interim, final_text) = split_results(&batch);
        assert_eq!(interim, "what's the weather");
        assert_eq!(final_text, "hey krrish play");
    }

    #[test]
    fn test_error_codes() {
        assert!(RecognitionErrorCode::from_code("aborted").is_aborted());
        assert_eq!(
            RecognitionErrorCode::from_code("no-speech"),
            RecognitionErrorCode::NoSpeech
        );
        assert_eq!(
            RecognitionErrorCode::from_code("service-not-allowed"),
            RecognitionErrorCode::Other("service-not-allowed".to_string())
        );
    }
}
