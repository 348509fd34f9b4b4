//! Voice Session State
//!
//! The one session object of the assistant. Only the state machine writes
//! it; everything else sees clones or shared references.

use serde::Serialize;
use std::fmt;

use crate::i18n::Language;
use crate::tts::VoiceId;

/// What the assistant is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    ListeningForWake,
    CapturingCommand,
    Dispatching,
    Speaking,
    Paused,
}

impl Mode {
    /// Modes in which a recognition session may run
    pub fn accepts_input(self) -> bool {
        matches!(
            self,
            Mode::ListeningForWake | Mode::CapturingCommand | Mode::Speaking
        )
    }

    /// Modes in which the live transcript may be shown
    pub fn shows_live_transcript(self) -> bool {
        matches!(self, Mode::ListeningForWake | Mode::CapturingCommand)
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::ListeningForWake => "Listening for wake word",
            Mode::CapturingCommand => "Listening for command",
            Mode::Dispatching => "Thinking",
            Mode::Speaking => "Speaking",
            Mode::Paused => "Paused",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Process-wide assistant session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub(crate) mode: Mode,
    pub(crate) language: Language,
    pub(crate) preferred_voice: Option<VoiceId>,
    pub(crate) live_transcript: String,
    pub(crate) pending_filler: Option<String>,
    pub(crate) online: bool,
}

impl Session {
    pub fn new(language: Language) -> Self {
        Self {
            mode: Mode::ListeningForWake,
            language,
            preferred_voice: None,
            live_transcript: String::new(),
            pending_filler: None,
            online: true,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Id of the synthesizer voice to use; owned by the synthesizer's catalog
    pub fn preferred_voice(&self) -> Option<&VoiceId> {
        self.preferred_voice.as_ref()
    }

    pub fn live_transcript(&self) -> &str {
        &self.live_transcript
    }

    /// Filler phrase playing while a backend call is in flight
    pub fn pending_filler(&self) -> Option<&str> {
        self.pending_filler.as_deref()
    }

    pub fn is_online(&self) -> bool {
        self.online
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Language::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_defaults() {
        let session = Session::new(Language::Telugu);
        assert_eq!(session.mode(), Mode::ListeningForWake);
        assert_eq!(session.language(), Language::Telugu);
        assert!(session.live_transcript().is_empty());
        assert!(session.pending_filler().is_none());
        assert!(session.is_online());
    }

    #[test]
    fn test_mode_input_gating() {
        assert!(Mode::ListeningForWake.accepts_input());
        assert!(Mode::Speaking.accepts_input());
        assert!(!Mode::Dispatching.accepts_input());
        assert!(!Mode::Paused.accepts_input());
        assert!(!Mode::Speaking.shows_live_transcript());
    }
}
