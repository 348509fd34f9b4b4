//! Speech Output Controller
//!
//! Queues filler phrases and replies on the synthesizer, tracks which
//! utterance is current and whether anything is audibly playing, and drops
//! synthesis events for utterances it has already replaced.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::machine::Effect;
use crate::tts::{
    select_voice, SpeechRequest, SynthesisEvent, UtteranceId, UtteranceKind, VoiceId, VoiceInfo,
    VoiceSettings,
};
use crate::i18n::Language;

/// Phrases played while a backend call is in flight
pub const FILLER_PHRASES: &[&str] = &[
    "Hmm, let me check that for you...",
    "One second, I'm thinking...",
    "Got it, here's what I found...",
    "Let me process that...",
    "Interesting question, give me a moment...",
    "I'm working on that for you...",
    "Just a sec while I figure this out...",
];

/// Choose one filler phrase
pub fn pick_filler<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    FILLER_PHRASES
        .choose(rng)
        .copied()
        .unwrap_or(FILLER_PHRASES[0])
}

/// What a synthesis event means for the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSignal {
    /// Event for an utterance that is no longer current
    Stale,
    Started(UtteranceKind),
    /// Playback ended or failed
    Finished(UtteranceKind),
}

#[derive(Debug, Default)]
pub struct SpeechOutputController {
    next_id: UtteranceId,
    current: Option<(UtteranceId, UtteranceKind)>,
    speaking: bool,
    voices: Vec<VoiceInfo>,
}

impl SpeechOutputController {
    pub fn new() -> Self {
        Self::default()
    }

    /// True between `Started` and `Ended`/`Error` of the current utterance
    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// Replace the voice catalog
    pub fn set_voices(&mut self, voices: Vec<VoiceInfo>) {
        self.voices = voices;
    }

    /// Preferred voice id for a language from the current catalog
    pub fn preferred_voice(&self, language: Language) -> Option<VoiceId> {
        select_voice(&self.voices, language).map(|voice| voice.id.clone())
    }

    /// Queue a filler phrase
    pub fn speak_filler(&mut self, text: &str, voice: Option<VoiceId>) -> Vec<Effect> {
        self.speak(UtteranceKind::Filler, text, voice, VoiceSettings::FILLER)
    }

    /// Cancel whatever is playing and queue a reply
    pub fn speak_reply(&mut self, text: &str, voice: Option<VoiceId>) -> Vec<Effect> {
        self.speak(UtteranceKind::Reply, text, voice, VoiceSettings::REPLY)
    }

    fn speak(
        &mut self,
        kind: UtteranceKind,
        text: &str,
        voice: Option<VoiceId>,
        settings: VoiceSettings,
    ) -> Vec<Effect> {
        let mut effects = self.cancel();
        self.next_id += 1;
        let id = self.next_id;
        self.current = Some((id, kind));
        effects.push(Effect::Speak(SpeechRequest {
            id,
            kind,
            text: text.to_string(),
            voice,
            settings,
        }));
        effects
    }

    /// Abort current playback; no effect when nothing is queued
    pub fn cancel(&mut self) -> Vec<Effect> {
        self.speaking = false;
        match self.current.take() {
            Some(_) => vec![Effect::CancelSpeech],
            None => Vec::new(),
        }
    }

    /// Route one synthesizer event
    pub fn accept(&mut self, utterance: UtteranceId, event: SynthesisEvent) -> OutputSignal {
        let Some((current, kind)) = self.current else {
            debug!("Dropping {:?} for utterance {}, nothing queued", event, utterance);
            return OutputSignal::Stale;
        };
        if current != utterance {
            debug!("Dropping {:?} for replaced utterance {}", event, utterance);
            return OutputSignal::Stale;
        }

        match event {
            SynthesisEvent::Started => {
                self.speaking = true;
                OutputSignal::Started(kind)
            }
            SynthesisEvent::Ended => {
                self.speaking = false;
                self.current = None;
                OutputSignal::Finished(kind)
            }
            SynthesisEvent::Error(reason) => {
                debug!("Speech synthesis error: {}", reason);
                self.speaking = false;
                self.current = None;
                OutputSignal::Finished(kind)
            }
        }
    }
}
