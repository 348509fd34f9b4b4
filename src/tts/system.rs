//! System fallback TTS engine
//!
//! Speaks through `espeak-ng`, falling back to `spd-say`, one child process
//! per utterance. Cancelling drops the playback task, which kills the child.

use super::{SpeechRequest, SpeechSynthesizer, SynthesisEvent, SynthesisSink, VoiceInfo};
use crate::error::KrrishResult;
use crate::machine::Event;
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// espeak-ng words per minute at rate 1.0
const BASE_WPM: f32 = 175.0;

#[derive(Debug)]
pub struct SystemSynthesizer {
    sink: SynthesisSink,
    voices: Vec<VoiceInfo>,
    playing: Option<JoinHandle<()>>,
}

impl SystemSynthesizer {
    pub fn new(events: UnboundedSender<Event>, voices: Vec<VoiceInfo>) -> Self {
        Self {
            sink: SynthesisSink::new(events),
            voices,
            playing: None,
        }
    }

    /// Build the engine and read the espeak-ng voice list
    pub async fn discover(events: UnboundedSender<Event>) -> Self {
        let voices = match Command::new("espeak-ng").arg("--voices").output().await {
            Ok(output) if output.status.success() => {
                parse_voice_list(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(_) | Err(_) => {
                debug!("espeak-ng voice list unavailable");
                Vec::new()
            }
        };
        debug!("System TTS found {} voices", voices.len());
        Self::new(events, voices)
    }
}

/// Parse `espeak-ng --voices` output
///
/// Columns: Pty Language Age/Gender VoiceName File Other Languages
fn parse_voice_list(listing: &str) -> Vec<VoiceInfo> {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 5 {
                return None;
            }
            Some(VoiceInfo {
                id: cols[1].to_string(),
                name: format!("{} {}", cols[3], cols[2]),
                lang: cols[1].to_string(),
            })
        })
        .collect()
}

fn espeak_args(request: &SpeechRequest) -> Vec<String> {
    let settings = request.settings;
    let mut args = vec![
        "-s".to_string(),
        ((BASE_WPM * settings.rate).round() as u32).to_string(),
        "-p".to_string(),
        ((50.0 * settings.pitch).round().clamp(0.0, 99.0) as u32).to_string(),
        "-a".to_string(),
        ((100.0 * settings.volume).round().clamp(0.0, 200.0) as u32).to_string(),
    ];
    if let Some(voice) = &request.voice {
        args.push("-v".to_string());
        args.push(voice.clone());
    }
    args.push(request.text.clone());
    args
}

impl SpeechSynthesizer for SystemSynthesizer {
    fn speak(&mut self, request: SpeechRequest) -> KrrishResult<()> {
        debug!("System speaking: {}", request.text);

        // One utterance at a time: a new request replaces the old one
        self.cancel();

        let sink = self.sink.clone();
        let args = espeak_args(&request);
        let id = request.id;
        let text = request.text;

        self.playing = Some(tokio::spawn(async move {
            let child = Command::new("espeak-ng")
                .args(&args)
                .stdout(Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .or_else(|_| {
                    Command::new("spd-say")
                        .arg("--wait")
                        .arg(&text)
                        .kill_on_drop(true)
                        .spawn()
                });

            let mut child = match child {
                Ok(child) => child,
                Err(e) => {
                    warn!("No system TTS command found (tried espeak-ng, spd-say): {}", e);
                    sink.emit(id, SynthesisEvent::Error(e.to_string()));
                    return;
                }
            };

            sink.emit(id, SynthesisEvent::Started);
            match child.wait().await {
                Ok(status) if status.success() => sink.emit(id, SynthesisEvent::Ended),
                Ok(status) => sink.emit(id, SynthesisEvent::Error(format!("exit {status}"))),
                Err(e) => sink.emit(id, SynthesisEvent::Error(e.to_string())),
            }
        }));
        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(task) = self.playing.take() {
            task.abort();
        }
    }

    fn voices(&self) -> Vec<VoiceInfo> {
        self.voices.clone()
    }

    fn name(&self) -> &str {
        "system"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tts::{UtteranceKind, VoiceSettings};

    #[test]
    fn test_parse_voice_list() {
        let listing = "Pty Language       Age/Gender VoiceName          File                 Other Languages\n\
                       5  en-gb           --/M      English_(Great_Britain) gmw/en               (en 2)\n\
                       5  hi              --/M      Hindi              inc/hi\n";
        let voices = parse_voice_list(listing);
        assert_eq!(voices.len(), 2);
        assert_eq!(voices[1].id, "hi");
        assert_eq!(voices[1].lang, "hi");
    }

    #[test]
    fn test_espeak_args_scale_settings() {
        let request = SpeechRequest {
            id: 1,
            kind: UtteranceKind::Filler,
            text: "hello".to_string(),
            voice: Some("en-gb".to_string()),
            settings: VoiceSettings::FILLER,
        };
        let args = espeak_args(&request);
        assert_eq!(&args[..6], ["-s", "175", "-p", "55", "-a", "80"]);
        assert_eq!(&args[6..], ["-v", "en-gb", "hello"]);
    }
}
