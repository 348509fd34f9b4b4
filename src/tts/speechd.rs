//! Speechd-ng TTS backend using D-Bus
//!
//! The service exposes no stop call and takes no rate, pitch or volume, so
//! `VoiceSettings` are ignored here and `cancel` only stops waiting for the
//! current call. Audio already queued on the service plays to the end:
//! interrupting playback and barge-in only cut speech short with the
//! `system` engine.

use super::{SpeechRequest, SpeechSynthesizer, SynthesisEvent, SynthesisSink};
use crate::error::{KrrishError, KrrishResult};
use crate::machine::Event;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zbus::{proxy, Connection};

#[proxy(
    interface = "org.speech.Service",
    default_service = "org.speech.Service",
    default_path = "/org/speech/Service"
)]
trait SpeechService {
    fn speak(&self, text: &str) -> zbus::Result<()>;
    fn speak_voice(&self, text: &str, voice: &str) -> zbus::Result<()>;
    fn ping(&self) -> zbus::Result<String>;
}

pub struct SpeechdSynthesizer {
    proxy: SpeechServiceProxy<'static>,
    sink: SynthesisSink,
    playing: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SpeechdSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechdSynthesizer").finish()
    }
}

impl SpeechdSynthesizer {
    pub async fn connect(events: UnboundedSender<Event>) -> KrrishResult<Self> {
        let connection = Connection::session()
            .await
            .map_err(|e| KrrishError::Synthesis(e.to_string()))?;
        let proxy = SpeechServiceProxy::new(&connection)
            .await
            .map_err(|e| KrrishError::Synthesis(e.to_string()))?;

        match proxy.ping().await {
            Ok(response) => {
                info!("🔊 Connected to speechd-ng: {}", response);
            }
            Err(e) => {
                warn!("⚠️ speechd-ng not responding: {}", e);
                return Err(KrrishError::Synthesis(format!(
                    "speechd-ng not responding: {e}"
                )));
            }
        }

        Ok(Self {
            proxy,
            sink: SynthesisSink::new(events),
            playing: None,
        })
    }
}

impl SpeechSynthesizer for SpeechdSynthesizer {
    fn speak(&mut self, request: SpeechRequest) -> KrrishResult<()> {
        self.cancel();

        let proxy = self.proxy.clone();
        let sink = self.sink.clone();
        self.playing = Some(tokio::spawn(async move {
            debug!("speechd-ng speaking: {}", request.text);
            sink.emit(request.id, SynthesisEvent::Started);
            let spoken = match &request.voice {
                Some(voice) => proxy.speak_voice(&request.text, voice).await,
                None => proxy.speak(&request.text).await,
            };
            match spoken {
                Ok(()) => sink.emit(request.id, SynthesisEvent::Ended),
                Err(e) => sink.emit(request.id, SynthesisEvent::Error(e.to_string())),
            }
        }));
        Ok(())
    }

    /// Forget the in-flight call; the service keeps speaking
    fn cancel(&mut self) {
        if let Some(task) = self.playing.take() {
            task.abort();
        }
    }

    fn name(&self) -> &str {
        "speechd_ng"
    }
}
