//! Silent TTS engine for headless use
//!
//! Reports every utterance as started and finished without playing audio.

use super::{SpeechRequest, SpeechSynthesizer, SynthesisEvent, SynthesisSink};
use crate::error::KrrishResult;
use crate::machine::Event;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

#[derive(Debug)]
pub struct SilentSynthesizer {
    sink: SynthesisSink,
}

impl SilentSynthesizer {
    pub fn new(events: UnboundedSender<Event>) -> Self {
        Self {
            sink: SynthesisSink::new(events),
        }
    }
}

impl SpeechSynthesizer for SilentSynthesizer {
    fn speak(&mut self, request: SpeechRequest) -> KrrishResult<()> {
        debug!("Silent speaking: {}", request.text);
        self.sink.emit(request.id, SynthesisEvent::Started);
        self.sink.emit(request.id, SynthesisEvent::Ended);
        Ok(())
    }

    fn cancel(&mut self) {}

    fn name(&self) -> &str {
        "silent"
    }
}
