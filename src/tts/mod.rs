//! TTS (Text-to-Speech) Module
//!
//! The speech output boundary: a synthesizer that plays one utterance at a
//! time and reports start, end and error for it. Backends push their events
//! into the assistant's event queue tagged with the utterance id.

use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::KrrishResult;
use crate::i18n::Language;
use crate::machine::Event;

pub mod silent;
pub mod speechd;
pub mod system;

/// Identifies one queued utterance
pub type UtteranceId = u64;

/// Identifier of a voice in the synthesizer's catalog
pub type VoiceId = String;

/// A voice offered by the synthesizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceInfo {
    pub id: VoiceId,
    pub name: String,
    /// Locale tag as reported by the backend, e.g. "en-IN" or "hi"
    pub lang: String,
}

/// Why an utterance is being spoken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceKind {
    /// Placeholder while the backend call is in flight
    Filler,
    /// Assistant reply or apology
    Reply,
}

/// Prosody for one utterance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceSettings {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl VoiceSettings {
    pub const FILLER: VoiceSettings = VoiceSettings {
        rate: 1.0,
        pitch: 1.1,
        volume: 0.8,
    };

    pub const REPLY: VoiceSettings = VoiceSettings {
        rate: 0.95,
        pitch: 1.15,
        volume: 0.9,
    };
}

/// A single utterance handed to the synthesizer
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub id: UtteranceId,
    pub kind: UtteranceKind,
    pub text: String,
    pub voice: Option<VoiceId>,
    pub settings: VoiceSettings,
}

/// Events emitted for a queued utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisEvent {
    Started,
    Ended,
    Error(String),
}

/// Trait for speech synthesizers
pub trait SpeechSynthesizer: Send {
    /// Queue an utterance; events must be tagged with `request.id`
    fn speak(&mut self, request: SpeechRequest) -> KrrishResult<()>;

    /// Abort current playback
    fn cancel(&mut self);

    /// Voices currently available
    fn voices(&self) -> Vec<VoiceInfo> {
        Vec::new()
    }

    /// Get the engine name
    fn name(&self) -> &str;
}

/// Pick the preferred voice for a language from a catalog
///
/// Order: a voice for the language itself, then en-IN voices with a
/// female-sounding name, any en-IN voice, English voices with a
/// female-sounding name, any English voice, and finally the first voice.
pub fn select_voice(voices: &[VoiceInfo], language: Language) -> Option<&VoiceInfo> {
    const EN_IN_NAMES: &[&str] = &["female", "woman", "priya", "aditi"];
    const EN_NAMES: &[&str] = &["female", "woman", "samantha", "karen", "susan"];

    let name_has = |voice: &VoiceInfo, hints: &[&str]| {
        let name = voice.name.to_lowercase();
        hints.iter().any(|hint| name.contains(hint))
    };

    let native = if language == Language::English {
        None
    } else {
        voices
            .iter()
            .find(|v| v.lang.contains(language.primary()) || v.lang.contains(language.tag()))
    };

    native
        .or_else(|| {
            voices
                .iter()
                .find(|v| v.lang.contains("en-IN") && name_has(v, EN_IN_NAMES))
        })
        .or_else(|| voices.iter().find(|v| v.lang.contains("en-IN")))
        .or_else(|| {
            voices
                .iter()
                .find(|v| v.lang.starts_with("en") && name_has(v, EN_NAMES))
        })
        .or_else(|| voices.iter().find(|v| v.lang.starts_with("en")))
        .or_else(|| voices.first())
}

/// Factory to create the configured synthesizer
pub async fn create_engine(
    config: &Config,
    events: UnboundedSender<Event>,
) -> KrrishResult<Box<dyn SpeechSynthesizer>> {
    info!("🛠️ Creating TTS engine: {}", config.tts_engine);
    let engine: Box<dyn SpeechSynthesizer> = match config.tts_engine.as_str() {
        "speechd_ng" | "speechd" => match speechd::SpeechdSynthesizer::connect(events.clone()).await
        {
            Ok(engine) => Box::new(engine),
            Err(e) => {
                warn!("  - speechd-ng unavailable ({}), falling back to System", e);
                Box::new(system::SystemSynthesizer::discover(events).await)
            }
        },
        "system" => Box::new(system::SystemSynthesizer::discover(events).await),
        "none" | "silent" => Box::new(silent::SilentSynthesizer::new(events)),
        other => {
            warn!("  - Unknown engine '{}', falling back to System", other);
            Box::new(system::SystemSynthesizer::discover(events).await)
        }
    };
    info!("✅ TTS engine '{}' initialized", engine.name());
    Ok(engine)
}

/// Event sender handed to the synthesizer backends
#[derive(Debug, Clone)]
pub(crate) struct SynthesisSink {
    events: UnboundedSender<Event>,
}

impl SynthesisSink {
    pub(crate) fn new(events: UnboundedSender<Event>) -> Self {
        Self { events }
    }

    pub(crate) fn emit(&self, utterance: UtteranceId, event: SynthesisEvent) {
        // A closed queue means the assistant is shutting down
        let _ = self.events.send(Event::Synthesis { utterance, event });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(id: &str, name: &str, lang: &str) -> VoiceInfo {
        VoiceInfo {
            id: id.to_string(),
            name: name.to_string(),
            lang: lang.to_string(),
        }
    }

    #[test]
    fn test_native_voice_preferred() {
        let voices = vec![
            voice("a", "Priya Female", "en-IN"),
            voice("b", "Lekha", "hi-IN"),
        ];
        assert_eq!(select_voice(&voices, Language::Hindi).unwrap().id, "b");
        assert_eq!(select_voice(&voices, Language::English).unwrap().id, "a");
    }

    #[test]
    fn test_fallback_chain() {
        let voices = vec![
            voice("de", "Anna", "de-DE"),
            voice("us", "Alex", "en-US"),
            voice("us-f", "Samantha", "en-US"),
        ];
        assert_eq!(select_voice(&voices, Language::Tamil).unwrap().id, "us-f");

        let voices = vec![voice("de", "Anna", "de-DE"), voice("us", "Alex", "en-US")];
        assert_eq!(select_voice(&voices, Language::Tamil).unwrap().id, "us");

        let voices = vec![voice("de", "Anna", "de-DE")];
        assert_eq!(select_voice(&voices, Language::Tamil).unwrap().id, "de");
        assert!(select_voice(&[], Language::Tamil).is_none());
    }

    #[test]
    fn test_en_in_plain_before_other_english() {
        let voices = vec![
            voice("us-f", "Karen", "en-US"),
            voice("in", "Ravi", "en-IN"),
        ];
        assert_eq!(select_voice(&voices, Language::English).unwrap().id, "in");
    }
}
