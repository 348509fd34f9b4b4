#![allow(dead_code)]

pub mod mock_asr;
pub mod mock_backend;
pub mod mock_tts;

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use krrish::backend::BackendGateway;
use krrish::config::Config;
use krrish::error::KrrishResult;
use krrish::machine::VoiceSessionStateMachine;
use krrish::runtime::{event_channel, AssistantHandle, Runtime, Snapshot};
use krrish::storage::ChatStorage;
use krrish::tts::{SpeechRequest, VoiceInfo};

use mock_asr::{MockMicrophone, MockRecognizer, RecognizerCall};
use mock_backend::MockGateway;
use mock_tts::MockTts;

/// A running assistant wired to mocks, with history in a temp dir
pub struct TestContext {
    pub temp_dir: TempDir,
    pub handle: AssistantHandle,
    pub microphone: MockMicrophone,
    pub recognizer_calls: Arc<Mutex<Vec<RecognizerCall>>>,
    pub spoken: Arc<Mutex<Vec<SpeechRequest>>>,
    pub gateway: Arc<MockGateway>,
    pub storage: ChatStorage,
    task: JoinHandle<KrrishResult<()>>,
}

impl TestContext {
    pub fn start(gateway: MockGateway) -> Self {
        Self::start_with_voices(gateway, Vec::new())
    }

    pub fn start_with_voices(gateway: MockGateway, voices: Vec<VoiceInfo>) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let storage = ChatStorage::new(temp_dir.path().join("chat-history.json"));

        let channel = event_channel();
        let (recognizer, microphone) = MockRecognizer::new(channel.0.clone());
        let recognizer_calls = recognizer.calls.clone();
        let synthesizer = MockTts::new(channel.0.clone()).with_voices(voices);
        let spoken = synthesizer.spoken.clone();
        let gateway = Arc::new(gateway);

        let machine = VoiceSessionStateMachine::new(&Config::default()).with_seed(7);
        let runtime = Runtime::new(
            machine,
            channel,
            Box::new(recognizer),
            Box::new(synthesizer),
            gateway.clone() as Arc<dyn BackendGateway>,
        )
        .with_storage(storage.clone())
        .with_connectivity_probe(Duration::from_secs(60));

        let handle = runtime.handle();
        let task = tokio::spawn(runtime.run());

        Self {
            temp_dir,
            handle,
            microphone,
            recognizer_calls,
            spoken,
            gateway,
            storage,
            task,
        }
    }

    /// Wait until the published state satisfies `predicate`
    pub async fn wait_until(&self, predicate: impl FnMut(&Snapshot) -> bool) -> Snapshot {
        let mut state = self.handle.subscribe();
        let snapshot = tokio::time::timeout(Duration::from_secs(30), state.wait_for(predicate))
            .await
            .expect("Timed out waiting for assistant state")
            .expect("Assistant stopped");
        Snapshot::clone(&snapshot)
    }

    /// Wait for a running recognition session
    pub async fn wait_listening(&self) -> Snapshot {
        self.wait_until(|s| s.capturing_audio && self.microphone.active_session().is_some())
            .await
    }

    pub fn spoken_texts(&self) -> Vec<String> {
        self.spoken
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.text.clone())
            .collect()
    }

    pub async fn stop(self) {
        self.handle.shutdown().expect("Assistant already stopped");
        self.task
            .await
            .expect("Assistant task panicked")
            .expect("Assistant returned an error");
    }
}
