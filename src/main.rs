//! Krrish - Wake-word voice assistant
//!
//! Terminal front-end: typed lines stand in for the microphone, replies are
//! printed and spoken through the configured synthesizer.

use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use krrish::asr::{ConsoleFeed, ConsoleRecognizer};
use krrish::backend;
use krrish::config::Config;
use krrish::i18n::{Catalog, Language};
use krrish::machine::{UserAction, VoiceSessionStateMachine};
use krrish::runtime::{event_channel, AssistantHandle, Runtime};
use krrish::storage::ChatStorage;
use krrish::tts;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Recognition and reply language (en-IN, te-IN, hi-IN, kn-IN, ta-IN)
    #[arg(short, long)]
    language: Option<Language>,

    /// Backend gateway ("http" or "ollama")
    #[arg(long)]
    backend: Option<String>,

    /// Chat endpoint for the http backend
    #[arg(long)]
    backend_url: Option<String>,

    /// TTS engine ("system", "speechd", "silent")
    #[arg(long)]
    tts: Option<String>,

    /// Do not write conversation history
    #[arg(long)]
    no_history: bool,
}

/// One line typed at the prompt
#[derive(Debug, Clone, PartialEq)]
enum ConsoleCommand {
    Final(String),
    Interim(String),
    Action(UserAction),
    History,
    Load(usize),
    Delete(usize),
    Quit,
    Invalid(String),
}

fn parse_line(line: &str) -> Option<ConsoleCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if let Some(interim) = line.strip_prefix('~') {
        return Some(ConsoleCommand::Interim(interim.trim().to_string()));
    }
    let Some(command) = line.strip_prefix('/') else {
        return Some(ConsoleCommand::Final(line.to_string()));
    };

    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((command, ""));
    let parsed = match name {
        "pause" => ConsoleCommand::Action(UserAction::TogglePause),
        "new" => ConsoleCommand::Action(UserAction::NewConversation),
        "stop" => ConsoleCommand::Action(UserAction::StopSpeaking),
        "say" if !rest.is_empty() => {
            ConsoleCommand::Action(UserAction::SubmitText(rest.to_string()))
        }
        "lang" => match rest.parse::<Language>() {
            Ok(language) => ConsoleCommand::Action(UserAction::SetLanguage(language)),
            Err(e) => ConsoleCommand::Invalid(e.to_string()),
        },
        "history" => ConsoleCommand::History,
        "load" | "delete" => match rest.parse::<usize>() {
            Ok(n) if n > 0 && name == "load" => ConsoleCommand::Load(n),
            Ok(n) if n > 0 => ConsoleCommand::Delete(n),
            _ => ConsoleCommand::Invalid(format!("Usage: /{name} <number from /history>")),
        },
        "quit" | "exit" => ConsoleCommand::Quit,
        _ => ConsoleCommand::Invalid(format!("Unknown command: /{name}")),
    };
    Some(parsed)
}

/// Print new utterances and mode changes as they are published
fn spawn_printer(handle: &AssistantHandle) -> tokio::task::JoinHandle<()> {
    let mut state = handle.subscribe();
    tokio::spawn(async move {
        let mut conversation_id = String::new();
        let mut printed = 0;
        let mut mode = None;

        loop {
            let snapshot = state.borrow_and_update().clone();
            if snapshot.conversation.id != conversation_id {
                conversation_id = snapshot.conversation.id.clone();
                printed = 0;
                println!("── {} ──", snapshot.conversation.title);
            }
            for message in snapshot.conversation.messages.iter().skip(printed) {
                let speaker = if message.is_from_user { "you" } else { "krrish" };
                println!("{speaker:>7} › {}", message.text);
            }
            printed = snapshot.conversation.messages.len();

            if mode != Some(snapshot.session.mode()) {
                mode = Some(snapshot.session.mode());
                println!("        [{}]", snapshot.session.mode());
            }

            if state.changed().await.is_err() {
                break;
            }
        }
    })
}

async fn deliver(
    feed: &ConsoleFeed,
    handle: &AssistantHandle,
    storage: Option<&ChatStorage>,
    command: ConsoleCommand,
) -> bool {
    match command {
        ConsoleCommand::Final(text) => {
            if !feed.push_final(&text) {
                println!("        (not listening)");
            }
        }
        ConsoleCommand::Interim(text) => {
            if !feed.push_interim(&text) {
                println!("        (not listening)");
            }
        }
        ConsoleCommand::Action(action) => {
            if handle.send(action).is_err() {
                return false;
            }
        }
        ConsoleCommand::History => {
            let Some(storage) = storage else {
                println!("        (history disabled)");
                return true;
            };
            for (i, conversation) in storage.get_conversations().iter().enumerate() {
                println!(
                    "{:>7}. {} ({} messages, {})",
                    i + 1,
                    conversation.title,
                    conversation.len(),
                    conversation.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        ConsoleCommand::Load(n) => {
            let conversation = storage.and_then(|s| s.get_conversations().into_iter().nth(n - 1));
            match conversation {
                Some(conversation) => {
                    let action = UserAction::LoadConversation(Box::new(conversation));
                    if handle.send(action).is_err() {
                        return false;
                    }
                }
                None => println!("        No conversation #{n}"),
            }
        }
        ConsoleCommand::Delete(n) => {
            let Some(storage) = storage else {
                println!("        (history disabled)");
                return true;
            };
            match storage.get_conversations().get(n - 1) {
                Some(conversation) => {
                    match handle.delete_conversation(storage, &conversation.id).await {
                        Ok(()) => println!("        Deleted '{}'", conversation.title),
                        Err(e) => warn!("⚠️ Failed to delete conversation: {}", e),
                    }
                }
                None => println!("        No conversation #{n}"),
            }
        }
        ConsoleCommand::Invalid(reason) => println!("        {reason}"),
        ConsoleCommand::Quit => return false,
    }
    true
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("🎙️ Krrish v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load()?;
    if let Some(language) = args.language {
        config.language = language;
    }
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    if let Some(url) = args.backend_url {
        config.backend_url = url;
    }
    if let Some(tts) = args.tts {
        config.tts_engine = tts;
    }

    let channel = event_channel();
    let (recognizer, feed) = ConsoleRecognizer::new(channel.0.clone());
    let synthesizer = tts::create_engine(&config, channel.0.clone()).await?;
    let gateway = backend::create_gateway(&config);

    let machine = VoiceSessionStateMachine::new(&config)
        .with_catalogs(Language::ALL.into_iter().map(Catalog::load));

    let mut runtime = Runtime::new(
        machine,
        channel,
        Box::new(recognizer),
        synthesizer,
        gateway,
    )
    .with_connectivity_probe(Duration::from_secs(config.connectivity_probe_secs));
    let storage = (!args.no_history).then(|| ChatStorage::new(&config.history_path));
    if let Some(storage) = &storage {
        runtime = runtime.with_storage(storage.clone());
    }

    let handle = runtime.handle();
    let assistant = tokio::spawn(runtime.run());
    let printer = spawn_printer(&handle);

    info!("✅ Krrish ready - type what you would say, e.g. 'hey krrish what's the time'");
    info!("   Commands: ~interim, /pause, /new, /lang <tag>, /stop, /say <text>, /quit");
    info!("   History: /history, /load <n>, /delete <n>");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = parse_line(&line) else {
            continue;
        };
        if !deliver(&feed, &handle, storage.as_ref(), command).await {
            break;
        }
    }

    if handle.shutdown().is_err() {
        warn!("Assistant already stopped");
    }
    assistant.await??;
    printer.abort();
    Ok(())
}
