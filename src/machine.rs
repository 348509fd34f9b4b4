//! Voice Session State Machine
//!
//! The single writer of the assistant session. Every external happening is
//! translated into an [`Event`], handled one at a time, and answered with a
//! list of [`Effect`]s for the runtime to carry out. The machine performs no
//! I/O of its own, which keeps each transition testable without speech
//! hardware or a network.
//!
//! Out-of-order delivery is tolerated by tagging: recognition events carry
//! the session id they were started with, synthesis events the utterance
//! id, backend replies the dispatch sequence, and timers a per-kind token.
//! Anything carrying an id the machine no longer owns is dropped.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::asr::{RecognitionEvent, RecognizerOptions, SessionId};
use crate::backend::{BackendError, ChatReply, ChatRequest};
use crate::classifier::{classify, detect_wake_word, Classification};
use crate::config::{Config, Timings};
use crate::conversation::Conversation;
use crate::i18n::{Catalog, Language, Message};
use crate::input::{InputSignal, SpeechInputController};
use crate::output::{pick_filler, OutputSignal, SpeechOutputController};
use crate::session::{Mode, Session};
use crate::tts::{SpeechRequest, SynthesisEvent, UtteranceId, UtteranceKind, VoiceInfo};

/// Sequence number of one backend call
pub type DispatchSeq = u64;

/// Token identifying one scheduling of a timer
pub type TimerToken = u64;

/// Debounce timers owned by the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Finalize a command from interim text after a pause
    PauseFinalize,
    /// Bring a dropped recognition session back
    Restart,
    /// Re-arm listening if synthesis never reports in
    DispatchFallback,
    /// Return to wake-word listening after playback
    PostSpeech,
}

impl TimerKind {
    pub const ALL: [TimerKind; 4] = [
        TimerKind::PauseFinalize,
        TimerKind::Restart,
        TimerKind::DispatchFallback,
        TimerKind::PostSpeech,
    ];
}

/// Explicit user requests
#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    TogglePause,
    NewConversation,
    SetLanguage(Language),
    StopSpeaking,
    /// Typed message; skips wake detection and the filler phrase
    SubmitText(String),
    /// Resume a stored conversation
    LoadConversation(Box<Conversation>),
}

/// Everything the machine reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Boot,
    Recognition {
        session: SessionId,
        event: RecognitionEvent,
    },
    Synthesis {
        utterance: UtteranceId,
        event: SynthesisEvent,
    },
    BackendReplied {
        seq: DispatchSeq,
        result: Result<ChatReply, BackendError>,
    },
    TimerFired {
        timer: TimerKind,
        token: TimerToken,
    },
    User(UserAction),
    ConnectivityChanged(bool),
    VoicesChanged(Vec<VoiceInfo>),
    Shutdown,
}

/// Work the runtime performs on the machine's behalf
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartRecognition {
        session: SessionId,
        options: RecognizerOptions,
    },
    StopRecognition,
    Speak(SpeechRequest),
    CancelSpeech,
    Dispatch {
        seq: DispatchSeq,
        request: ChatRequest,
    },
    /// Arm a timer; replaces any pending timer of the same kind
    ScheduleTimer {
        timer: TimerKind,
        token: TimerToken,
        delay: Duration,
    },
    CancelTimer(TimerKind),
    /// The conversation gained an utterance
    ConversationChanged,
    /// The conversation was replaced wholesale
    ConversationReset,
}

/// Pending timer tokens, one per kind
#[derive(Debug, Default)]
struct Timers {
    pending: HashMap<TimerKind, TimerToken>,
    last_token: TimerToken,
}

impl Timers {
    fn schedule(&mut self, timer: TimerKind, delay: Duration) -> Effect {
        self.last_token += 1;
        self.pending.insert(timer, self.last_token);
        Effect::ScheduleTimer {
            timer,
            token: self.last_token,
            delay,
        }
    }

    fn cancel(&mut self, timer: TimerKind) -> Option<Effect> {
        self.pending
            .remove(&timer)
            .map(|_| Effect::CancelTimer(timer))
    }

    fn cancel_all(&mut self) -> Vec<Effect> {
        TimerKind::ALL
            .into_iter()
            .filter_map(|timer| self.cancel(timer))
            .collect()
    }

    /// Consume a firing; false if the token was superseded or cancelled
    fn fire(&mut self, timer: TimerKind, token: TimerToken) -> bool {
        if self.pending.get(&timer) == Some(&token) {
            self.pending.remove(&timer);
            true
        } else {
            false
        }
    }

    fn is_pending(&self, timer: TimerKind) -> bool {
        self.pending.contains_key(&timer)
    }
}

/// Text logged for a user command
///
/// Commands that mention neither "hey" nor "krrish" are prefixed so the log
/// reads as if the wake phrase had been spoken.
pub fn display_form(raw: &str) -> String {
    let lower = raw.to_lowercase();
    if lower.contains("hey") || lower.contains("krrish") {
        raw.to_string()
    } else {
        format!("Hey Krrish, {raw}")
    }
}

pub struct VoiceSessionStateMachine {
    session: Session,
    conversation: Conversation,
    input: SpeechInputController,
    output: SpeechOutputController,
    timers: Timers,
    timings: Timings,
    catalogs: HashMap<Language, Catalog>,
    dispatch_seq: DispatchSeq,
    in_flight: Option<DispatchSeq>,
    history_limit: usize,
    rng: StdRng,
}

impl VoiceSessionStateMachine {
    pub fn new(config: &Config) -> Self {
        let language = config.language;
        let timings = config.timings();
        Self {
            session: Session::new(language),
            conversation: Conversation::new(&Catalog::builtin(language).tr(Message::Greeting)),
            input: SpeechInputController::new(language, timings),
            output: SpeechOutputController::new(),
            timers: Timers::default(),
            timings,
            catalogs: HashMap::new(),
            dispatch_seq: 0,
            in_flight: None,
            history_limit: config.history_limit,
            rng: StdRng::from_entropy(),
        }
    }

    /// Use loaded translations; the greeting is regenerated if untouched
    pub fn with_catalogs(mut self, catalogs: impl IntoIterator<Item = Catalog>) -> Self {
        self.catalogs = catalogs
            .into_iter()
            .map(|catalog| (catalog.language(), catalog))
            .collect();
        if !self.conversation.has_exchange() {
            self.conversation = Conversation::new(&self.tr(Message::Greeting));
        }
        self
    }

    /// Deterministic filler choice
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn mode(&self) -> Mode {
        self.session.mode
    }

    /// Whether a recognition session is starting or running
    pub fn is_capturing_audio(&self) -> bool {
        self.input.is_active()
    }

    pub fn is_speaking(&self) -> bool {
        self.output.is_speaking()
    }

    /// Sequence of the backend call awaiting its reply
    pub fn in_flight(&self) -> Option<DispatchSeq> {
        self.in_flight
    }

    pub fn timer_pending(&self, timer: TimerKind) -> bool {
        self.timers.is_pending(timer)
    }

    fn tr(&self, message: Message) -> String {
        let language = self.session.language;
        match self.catalogs.get(&language) {
            Some(catalog) => catalog.tr(message),
            None => Catalog::builtin(language).tr(message),
        }
    }

    /// Apply one event
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::Boot => self.boot(),
            Event::Recognition { session, event } => self.on_recognition(session, event),
            Event::Synthesis { utterance, event } => self.on_synthesis(utterance, event),
            Event::BackendReplied { seq, result } => self.on_backend_reply(seq, result),
            Event::TimerFired { timer, token } => {
                if self.timers.fire(timer, token) {
                    self.on_timer(timer)
                } else {
                    debug!("Ignoring superseded {:?} timer ({})", timer, token);
                    Vec::new()
                }
            }
            Event::User(action) => self.on_user(action),
            Event::ConnectivityChanged(online) => {
                if self.session.online != online {
                    if online {
                        info!("🌐 Back online");
                    } else {
                        warn!("📴 Connectivity lost");
                    }
                }
                self.session.online = online;
                Vec::new()
            }
            Event::VoicesChanged(voices) => {
                self.output.set_voices(voices);
                self.session.preferred_voice = self.output.preferred_voice(self.session.language);
                debug!("Preferred voice: {:?}", self.session.preferred_voice);
                Vec::new()
            }
            Event::Shutdown => {
                let mut effects = self.teardown();
                effects.extend(self.output.cancel());
                self.in_flight = None;
                self.session.pending_filler = None;
                effects
            }
        }
    }

    fn boot(&mut self) -> Vec<Effect> {
        info!("🎧 {} ({})", self.session.mode, self.session.language);
        if self.session.mode == Mode::Paused {
            return Vec::new();
        }
        self.session.mode = Mode::ListeningForWake;
        self.input.start().into_iter().collect()
    }

    /// Stop input and every timer
    fn teardown(&mut self) -> Vec<Effect> {
        let mut effects: Vec<Effect> = self.input.stop().into_iter().collect();
        effects.extend(self.timers.cancel_all());
        effects
    }

    /// Stop input and the timers that would bring it back
    fn teardown_input(&mut self) -> Vec<Effect> {
        let mut effects: Vec<Effect> = self.input.stop().into_iter().collect();
        effects.extend(self.timers.cancel(TimerKind::PauseFinalize));
        effects.extend(self.timers.cancel(TimerKind::Restart));
        effects
    }

    fn set_mode(&mut self, mode: Mode) {
        if self.session.mode != mode {
            info!("🔄 {} → {}", self.session.mode, mode);
            self.session.mode = mode;
        }
        if !mode.shows_live_transcript() {
            self.session.live_transcript.clear();
        }
    }

    /// Start capture if nothing forbids it
    fn resume_capture(&mut self) -> Vec<Effect> {
        if !self.session.mode.accepts_input() || self.output.is_speaking() {
            return Vec::new();
        }
        self.input.start().into_iter().collect()
    }

    fn schedule_restart(&mut self, delay: Duration) -> Vec<Effect> {
        if !self.session.mode.accepts_input() {
            return Vec::new();
        }
        vec![self.timers.schedule(TimerKind::Restart, delay)]
    }

    fn on_recognition(&mut self, session: SessionId, event: RecognitionEvent) -> Vec<Effect> {
        match self.input.accept(session, event) {
            InputSignal::Stale | InputSignal::Started | InputSignal::Aborted => Vec::new(),
            InputSignal::Dropped { restart_after } => self.schedule_restart(restart_after),
            InputSignal::Transcript {
                interim,
                final_text,
            } => self.on_transcript(interim, final_text),
        }
    }

    fn on_transcript(&mut self, interim: String, final_text: String) -> Vec<Effect> {
        match self.session.mode {
            Mode::ListeningForWake => {
                if !interim.is_empty() {
                    self.session.live_transcript = interim.clone();
                }
                if final_text.is_empty() {
                    return Vec::new();
                }
                self.session.live_transcript.clear();
                let mut effects = self.on_wake_candidate(&final_text);
                effects.extend(self.capture_interim(interim));
                effects
            }
            Mode::CapturingCommand => {
                if !final_text.is_empty() {
                    debug!("Final command text: {}", final_text);
                    return self.dispatch(&final_text, display_form(&final_text), true);
                }
                self.capture_interim(interim)
            }
            Mode::Speaking => {
                if final_text.is_empty() || !detect_wake_word(&final_text, self.session.language) {
                    return Vec::new();
                }
                info!("✋ Barge-in: {}", final_text);
                let mut effects = self.output.cancel();
                effects.extend(self.timers.cancel(TimerKind::DispatchFallback));
                effects.extend(self.timers.cancel(TimerKind::PostSpeech));
                self.set_mode(Mode::ListeningForWake);
                effects.extend(self.on_wake_candidate(&final_text));
                effects.extend(self.capture_interim(interim));
                effects
            }
            Mode::Dispatching | Mode::Paused => {
                debug!("Ignoring transcript while {}", self.session.mode);
                Vec::new()
            }
        }
    }

    /// Hold interim command text and (re)arm the pause timer
    ///
    /// Only applies while capturing; the wake word may have arrived as a
    /// final in the same batch as the interim command.
    fn capture_interim(&mut self, interim: String) -> Vec<Effect> {
        if self.session.mode != Mode::CapturingCommand || interim.is_empty() {
            return Vec::new();
        }
        self.input.note_interim(&interim, Instant::now());
        self.session.live_transcript = interim;
        vec![self
            .timers
            .schedule(TimerKind::PauseFinalize, self.timings.pause_finalize)]
    }

    fn on_wake_candidate(&mut self, transcript: &str) -> Vec<Effect> {
        match classify(transcript, self.session.language) {
            Classification::NoWake => {
                debug!("No wake word in: {}", transcript);
                Vec::new()
            }
            Classification::WakeOnly => {
                info!("👂 Wake word heard, waiting for command");
                self.set_mode(Mode::CapturingCommand);
                Vec::new()
            }
            Classification::WakeWithCommand(command) => {
                self.dispatch(&command, display_form(transcript), true)
            }
        }
    }

    /// Log the command, start the filler and issue the backend call
    fn dispatch(&mut self, command: &str, display: String, with_filler: bool) -> Vec<Effect> {
        let mut effects = self.teardown();
        self.session.live_transcript.clear();

        self.conversation.append_user(display);
        let history = self.conversation.recent(self.history_limit).to_vec();
        effects.push(Effect::ConversationChanged);
        info!("🗣️ Command: {}", command);

        if !self.session.online {
            warn!("📴 Offline, answering without the backend");
            self.in_flight = None;
            effects.extend(self.deliver_reply(Err(BackendError::Offline)));
            return effects;
        }

        if with_filler {
            let phrase = pick_filler(&mut self.rng);
            self.session.pending_filler = Some(phrase.to_string());
            let voice = self.session.preferred_voice.clone();
            effects.extend(self.output.speak_filler(phrase, voice));
        } else {
            self.session.pending_filler = None;
            effects.extend(self.output.cancel());
        }

        self.dispatch_seq += 1;
        self.in_flight = Some(self.dispatch_seq);
        self.set_mode(Mode::Dispatching);
        effects.push(Effect::Dispatch {
            seq: self.dispatch_seq,
            request: ChatRequest {
                message: command.to_string(),
                conversation_history: history,
                language: self.session.language,
            },
        });
        effects
    }

    fn on_backend_reply(
        &mut self,
        seq: DispatchSeq,
        result: Result<ChatReply, BackendError>,
    ) -> Vec<Effect> {
        if self.in_flight != Some(seq) {
            debug!("Discarding reply for superseded dispatch {}", seq);
            return Vec::new();
        }
        self.in_flight = None;
        self.deliver_reply(result)
    }

    /// Log and speak the reply or apology, then enter Speaking
    fn deliver_reply(&mut self, result: Result<ChatReply, BackendError>) -> Vec<Effect> {
        let text = match result {
            Ok(reply) => reply.response,
            Err(e) => {
                warn!("❌ Backend error: {}", e);
                self.tr(e.apology())
            }
        };
        self.session.pending_filler = None;
        self.conversation.append_assistant(text.clone());

        let mut effects = vec![Effect::ConversationChanged];
        let voice = self.session.preferred_voice.clone();
        effects.extend(self.output.speak_reply(&text, voice));
        self.set_mode(Mode::Speaking);
        effects.push(
            self.timers
                .schedule(TimerKind::DispatchFallback, self.timings.dispatch_fallback),
        );
        effects
    }

    fn on_synthesis(&mut self, utterance: UtteranceId, event: SynthesisEvent) -> Vec<Effect> {
        match self.output.accept(utterance, event) {
            OutputSignal::Stale | OutputSignal::Started(UtteranceKind::Filler) => Vec::new(),
            OutputSignal::Started(UtteranceKind::Reply) => {
                // Listen through the reply so a wake word can interrupt it
                if self.session.mode == Mode::Speaking {
                    self.input.start().into_iter().collect()
                } else {
                    Vec::new()
                }
            }
            OutputSignal::Finished(UtteranceKind::Filler) => {
                self.session.pending_filler = None;
                Vec::new()
            }
            OutputSignal::Finished(UtteranceKind::Reply) => {
                if self.session.mode == Mode::Speaking {
                    vec![self
                        .timers
                        .schedule(TimerKind::PostSpeech, self.timings.post_speech)]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn on_timer(&mut self, timer: TimerKind) -> Vec<Effect> {
        match timer {
            TimerKind::PauseFinalize => {
                if self.session.mode != Mode::CapturingCommand {
                    return Vec::new();
                }
                match self.input.finalize_pending() {
                    Some((command, teardown)) => {
                        debug!("Pause detected, finalizing: {}", command);
                        let mut effects: Vec<Effect> = teardown.into_iter().collect();
                        effects.extend(self.dispatch(&command, display_form(&command), true));
                        effects
                    }
                    None => Vec::new(),
                }
            }
            TimerKind::Restart => self.resume_capture(),
            TimerKind::DispatchFallback => {
                if self.session.mode != Mode::Speaking {
                    return Vec::new();
                }
                if !self.output.is_speaking() {
                    self.set_mode(Mode::ListeningForWake);
                }
                self.input.start().into_iter().collect()
            }
            TimerKind::PostSpeech => {
                if self.session.mode != Mode::Speaking {
                    return Vec::new();
                }
                self.set_mode(Mode::ListeningForWake);
                self.resume_capture()
            }
        }
    }

    fn on_user(&mut self, action: UserAction) -> Vec<Effect> {
        match action {
            UserAction::TogglePause => self.toggle_pause(),
            UserAction::NewConversation => {
                info!("🆕 New conversation");
                let conversation = Conversation::new(&self.tr(Message::Greeting));
                self.replace_conversation(conversation)
            }
            UserAction::LoadConversation(conversation) => {
                info!("📂 Loading conversation '{}'", conversation.title);
                self.replace_conversation(*conversation)
            }
            UserAction::SetLanguage(language) => self.set_language(language),
            UserAction::StopSpeaking => {
                let mut effects = self.output.cancel();
                self.session.pending_filler = None;
                if self.session.mode == Mode::Speaking {
                    effects.push(
                        self.timers
                            .schedule(TimerKind::PostSpeech, self.timings.post_speech),
                    );
                }
                effects
            }
            UserAction::SubmitText(text) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    return Vec::new();
                }
                match self.session.mode {
                    Mode::ListeningForWake | Mode::CapturingCommand | Mode::Speaking => {
                        self.dispatch(&text, text.clone(), false)
                    }
                    Mode::Dispatching | Mode::Paused => {
                        warn!("⚠️ Ignoring typed message while {}", self.session.mode);
                        Vec::new()
                    }
                }
            }
        }
    }

    fn toggle_pause(&mut self) -> Vec<Effect> {
        match self.session.mode {
            Mode::ListeningForWake => {
                let effects = self.teardown();
                self.set_mode(Mode::Paused);
                info!("⏸️ Listening paused");
                effects
            }
            Mode::Paused => {
                self.set_mode(Mode::ListeningForWake);
                info!("▶️ Listening resumed");
                self.resume_capture()
            }
            Mode::CapturingCommand => {
                info!("🚫 Command capture cancelled");
                let mut effects = self.teardown();
                self.set_mode(Mode::ListeningForWake);
                self.session.live_transcript.clear();
                effects.extend(self.schedule_restart(self.timings.restart_after_end));
                effects
            }
            Mode::Dispatching | Mode::Speaking => {
                debug!("Pause toggle ignored while {}", self.session.mode);
                Vec::new()
            }
        }
    }

    fn replace_conversation(&mut self, conversation: Conversation) -> Vec<Effect> {
        let mut effects = self.teardown();
        effects.extend(self.output.cancel());
        self.in_flight = None;
        self.session.pending_filler = None;
        self.conversation = conversation;
        effects.push(Effect::ConversationReset);

        if self.session.mode != Mode::Paused {
            self.set_mode(Mode::ListeningForWake);
            self.session.live_transcript.clear();
            effects.extend(self.schedule_restart(self.timings.restart_after_end));
        }
        effects
    }

    fn set_language(&mut self, language: Language) -> Vec<Effect> {
        if language == self.session.language {
            return Vec::new();
        }
        info!("🌐 Language: {} → {}", self.session.language, language);

        let mut effects = self.teardown_input();
        self.session.language = language;
        self.input.set_language(language);
        self.session.preferred_voice = self.output.preferred_voice(language);

        match self.session.mode {
            Mode::ListeningForWake | Mode::CapturingCommand => {
                self.set_mode(Mode::ListeningForWake);
                self.session.live_transcript.clear();
                effects.extend(self.schedule_restart(self.timings.restart_after_language));
            }
            // Playback paths restart capture when they finish
            Mode::Dispatching | Mode::Speaking | Mode::Paused => {}
        }
        effects
    }
}
