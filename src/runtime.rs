//! Assistant Runtime
//!
//! A single tokio task that owns the state machine and the speech and
//! backend adapters. Adapter callbacks, backend replies and timer firings
//! are all funnelled through one event queue and handled strictly one at a
//! time; effects returned by the machine are carried out here.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::asr::{RecognitionErrorCode, RecognitionEvent, SpeechRecognizer};
use crate::backend::BackendGateway;
use crate::conversation::Conversation;
use crate::error::{KrrishError, KrrishResult};
use crate::machine::{Effect, Event, TimerKind, UserAction, VoiceSessionStateMachine};
use crate::session::Session;
use crate::storage::ChatStorage;
use crate::tts::{SpeechSynthesizer, SynthesisEvent};

/// Create the event queue shared by the runtime and its adapters
pub fn event_channel() -> (UnboundedSender<Event>, UnboundedReceiver<Event>) {
    mpsc::unbounded_channel()
}

/// Read-only view of the assistant published after every event
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub session: Session,
    pub conversation: Conversation,
    /// A recognition session is starting or running
    pub capturing_audio: bool,
}

impl Snapshot {
    fn of(machine: &VoiceSessionStateMachine) -> Self {
        Self {
            session: machine.session().clone(),
            conversation: machine.conversation().clone(),
            capturing_audio: machine.is_capturing_audio(),
        }
    }
}

/// Cloneable handle for UI layers
#[derive(Debug, Clone)]
pub struct AssistantHandle {
    events: UnboundedSender<Event>,
    state: watch::Receiver<Snapshot>,
}

impl AssistantHandle {
    /// Queue a user action
    pub fn send(&self, action: UserAction) -> KrrishResult<()> {
        self.post(Event::User(action))
    }

    /// Queue any event, e.g. from an external adapter
    pub fn post(&self, event: Event) -> KrrishResult<()> {
        self.events.send(event).map_err(|_| KrrishError::Closed)
    }

    pub fn shutdown(&self) -> KrrishResult<()> {
        self.post(Event::Shutdown)
    }

    /// Latest published state
    pub fn snapshot(&self) -> Snapshot {
        self.state.borrow().clone()
    }

    /// Receiver that is notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.state.clone()
    }

    /// Remove a stored conversation
    ///
    /// Deleting the active conversation first replaces it with a new one
    /// and waits for the switch, so a later save cannot bring it back.
    pub async fn delete_conversation(&self, storage: &ChatStorage, id: &str) -> KrrishResult<()> {
        if self.snapshot().conversation.id == id {
            info!("🗑️ Deleting the active conversation, starting a new one");
            let mut state = self.subscribe();
            self.send(UserAction::NewConversation)?;
            state
                .wait_for(|snapshot| snapshot.conversation.id != id)
                .await
                .map(|_| ())
                .map_err(|_| KrrishError::Closed)?;
        }
        storage.delete_conversation(id)
    }
}

pub struct Runtime {
    machine: VoiceSessionStateMachine,
    recognizer: Box<dyn SpeechRecognizer>,
    synthesizer: Box<dyn SpeechSynthesizer>,
    gateway: Arc<dyn BackendGateway>,
    storage: Option<ChatStorage>,
    events: UnboundedSender<Event>,
    queue: UnboundedReceiver<Event>,
    timers: HashMap<TimerKind, JoinHandle<()>>,
    state: watch::Sender<Snapshot>,
    probe_interval: Option<Duration>,
}

impl Runtime {
    pub fn new(
        machine: VoiceSessionStateMachine,
        channel: (UnboundedSender<Event>, UnboundedReceiver<Event>),
        recognizer: Box<dyn SpeechRecognizer>,
        synthesizer: Box<dyn SpeechSynthesizer>,
        gateway: Arc<dyn BackendGateway>,
    ) -> Self {
        let (events, queue) = channel;
        let (state, _) = watch::channel(Snapshot::of(&machine));
        Self {
            machine,
            recognizer,
            synthesizer,
            gateway,
            storage: None,
            events,
            queue,
            timers: HashMap::new(),
            state,
            probe_interval: None,
        }
    }

    /// Persist the conversation after every exchange
    pub fn with_storage(mut self, storage: ChatStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Periodically ask the gateway whether the backend is reachable
    pub fn with_connectivity_probe(mut self, interval: Duration) -> Self {
        self.probe_interval = Some(interval);
        self
    }

    pub fn handle(&self) -> AssistantHandle {
        AssistantHandle {
            events: self.events.clone(),
            state: self.state.subscribe(),
        }
    }

    /// Run until a `Shutdown` event is handled
    pub async fn run(mut self) -> KrrishResult<()> {
        info!(
            "🚀 Assistant running (recognizer: {}, synthesizer: {}, backend: {})",
            self.recognizer.name(),
            self.synthesizer.name(),
            self.gateway.name()
        );

        let probe = self.probe_interval.map(|interval| self.spawn_probe(interval));

        let voices = self.synthesizer.voices();
        if !voices.is_empty() {
            self.apply(Event::VoicesChanged(voices));
        }
        self.apply(Event::Boot);

        while let Some(event) = self.queue.recv().await {
            let shutdown = matches!(event, Event::Shutdown);
            self.apply(event);
            if shutdown {
                break;
            }
        }

        if let Some(probe) = probe {
            probe.abort();
        }
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        info!("👋 Assistant stopped");
        Ok(())
    }

    fn apply(&mut self, event: Event) {
        for effect in self.machine.handle(event) {
            self.execute(effect);
        }
        self.state.send_replace(Snapshot::of(&self.machine));
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::StartRecognition { session, options } => {
                if let Err(e) = self.recognizer.start(session, options) {
                    warn!("⚠️ Failed to start recognition: {}", e);
                    // Surface as a session error so the restart path takes over
                    self.post(Event::Recognition {
                        session,
                        event: RecognitionEvent::Error(RecognitionErrorCode::Other(e.to_string())),
                    });
                }
            }
            Effect::StopRecognition => self.recognizer.stop(),
            Effect::Speak(request) => {
                let utterance = request.id;
                debug!("🔊 Speaking ({:?}): {}", request.kind, request.text);
                if let Err(e) = self.synthesizer.speak(request) {
                    warn!("⚠️ Speech synthesis failed: {}", e);
                    self.post(Event::Synthesis {
                        utterance,
                        event: SynthesisEvent::Error(e.to_string()),
                    });
                }
            }
            Effect::CancelSpeech => self.synthesizer.cancel(),
            Effect::Dispatch { seq, request } => {
                let gateway = self.gateway.clone();
                let events = self.events.clone();
                tokio::spawn(async move {
                    let result = gateway.send(&request).await;
                    let _ = events.send(Event::BackendReplied { seq, result });
                });
            }
            Effect::ScheduleTimer {
                timer,
                token,
                delay,
            } => {
                let events = self.events.clone();
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = events.send(Event::TimerFired { timer, token });
                });
                if let Some(previous) = self.timers.insert(timer, handle) {
                    previous.abort();
                }
            }
            Effect::CancelTimer(timer) => {
                if let Some(handle) = self.timers.remove(&timer) {
                    handle.abort();
                }
            }
            Effect::ConversationChanged => self.persist(),
            Effect::ConversationReset => {
                debug!(
                    "Conversation reset ({} messages)",
                    self.machine.conversation().len()
                );
            }
        }
    }

    fn persist(&self) {
        let Some(storage) = &self.storage else {
            return;
        };
        let conversation = self.machine.conversation();
        if !conversation.has_exchange() {
            return;
        }
        if let Err(e) = storage.save_conversation(conversation) {
            warn!("⚠️ Failed to save conversation: {}", e);
        }
    }

    fn post(&self, event: Event) {
        let _ = self.events.send(event);
    }

    fn spawn_probe(&self, interval: Duration) -> JoinHandle<()> {
        let gateway = self.gateway.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            loop {
                let online = gateway.health_check().await;
                if events.send(Event::ConnectivityChanged(online)).is_err() {
                    break;
                }
                tokio::time::sleep(interval).await;
            }
        })
    }
}
