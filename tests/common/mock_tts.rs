//! Mock Speech Synthesizer for Testing
//!
//! Records every utterance and plays it for a fixed duration.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use krrish::error::{KrrishError, KrrishResult};
use krrish::machine::Event;
use krrish::tts::{SpeechRequest, SpeechSynthesizer, SynthesisEvent, VoiceInfo};

/// Mock synthesizer that records spoken requests
pub struct MockTts {
    events: UnboundedSender<Event>,
    playing: Option<JoinHandle<()>>,
    duration: Duration,
    voices: Vec<VoiceInfo>,
    /// All requests that were "spoken"
    pub spoken: Arc<Mutex<Vec<SpeechRequest>>>,
    /// Number of cancel calls
    pub cancels: Arc<Mutex<usize>>,
    /// Simulate failure on next speak
    pub should_fail: Arc<Mutex<bool>>,
}

impl MockTts {
    pub fn new(events: UnboundedSender<Event>) -> Self {
        Self {
            events,
            playing: None,
            duration: Duration::from_millis(300),
            voices: Vec::new(),
            spoken: Arc::new(Mutex::new(Vec::new())),
            cancels: Arc::new(Mutex::new(0)),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_voices(mut self, voices: Vec<VoiceInfo>) -> Self {
        self.voices = voices;
        self
    }
}

impl SpeechSynthesizer for MockTts {
    fn speak(&mut self, request: SpeechRequest) -> KrrishResult<()> {
        if *self.should_fail.lock().unwrap() {
            return Err(KrrishError::Synthesis("Mock TTS failure".to_string()));
        }
        self.spoken.lock().unwrap().push(request.clone());

        let events = self.events.clone();
        let duration = self.duration;
        let utterance = request.id;
        self.playing = Some(tokio::spawn(async move {
            let _ = events.send(Event::Synthesis {
                utterance,
                event: SynthesisEvent::Started,
            });
            tokio::time::sleep(duration).await;
            let _ = events.send(Event::Synthesis {
                utterance,
                event: SynthesisEvent::Ended,
            });
        }));
        Ok(())
    }

    fn cancel(&mut self) {
        *self.cancels.lock().unwrap() += 1;
        if let Some(playing) = self.playing.take() {
            playing.abort();
        }
    }

    fn voices(&self) -> Vec<VoiceInfo> {
        self.voices.clone()
    }

    fn name(&self) -> &str {
        "mock"
    }
}
