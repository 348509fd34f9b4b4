//! Internationalization (i18n) Support
//!
//! Supported locale tags, their wake tokens, and the message catalog used
//! for spoken apologies and the greeting. English strings are built in;
//! per-language overrides are loaded from JSON locale files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;

use crate::error::KrrishError;

/// Wake tokens shared by every language, in match priority order
pub const CANONICAL_WAKE_TOKENS: &[&str] = &["hey krrish", "krrish", "hey krish", "krish"];

/// Locale tags the assistant can listen and answer in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en-IN")]
    English,
    #[serde(rename = "te-IN")]
    Telugu,
    #[serde(rename = "hi-IN")]
    Hindi,
    #[serde(rename = "kn-IN")]
    Kannada,
    #[serde(rename = "ta-IN")]
    Tamil,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::English,
        Language::Telugu,
        Language::Hindi,
        Language::Kannada,
        Language::Tamil,
    ];

    /// BCP 47 tag handed to the recognizer and the backend
    pub fn tag(self) -> &'static str {
        match self {
            Language::English => "en-IN",
            Language::Telugu => "te-IN",
            Language::Hindi => "hi-IN",
            Language::Kannada => "kn-IN",
            Language::Tamil => "ta-IN",
        }
    }

    /// Two-letter primary subtag, used when matching synthesizer voices
    pub fn primary(self) -> &'static str {
        &self.tag()[..2]
    }

    /// Native display name
    pub fn name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Telugu => "తెలుగు",
            Language::Hindi => "हिंदी",
            Language::Kannada => "ಕನ್ನಡ",
            Language::Tamil => "தமிழ்",
        }
    }

    /// Localized greeting+name compound and bare name token
    pub fn localized_wake_tokens(self) -> &'static [&'static str] {
        match self {
            Language::English => &[],
            Language::Telugu => &["హే కృష్", "కృష్"],
            Language::Hindi => &["हे कृष", "कृष"],
            Language::Kannada => &["ಹೇ ಕೃಷ್", "ಕೃಷ್"],
            Language::Tamil => &["ஹே கிருஷ்", "கிருஷ்"],
        }
    }

    /// All wake tokens for this language in match priority order
    pub fn wake_tokens(self) -> impl Iterator<Item = &'static str> {
        CANONICAL_WAKE_TOKENS
            .iter()
            .chain(self.localized_wake_tokens().iter())
            .copied()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Language {
    type Err = KrrishError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Language::ALL
            .into_iter()
            .find(|lang| lang.tag().eq_ignore_ascii_case(wanted) || lang.primary() == wanted)
            .ok_or_else(|| KrrishError::Language(s.to_string()))
    }
}

/// Catalog entries the assistant speaks on its own behalf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Message {
    Greeting,
    ApologyOffline,
    ApologyConfiguration,
    ApologyRateLimited,
    ApologyService,
    ApologyMalformed,
    ApologyNetwork,
}

impl Message {
    /// Key used in locale files
    pub fn key(self) -> &'static str {
        match self {
            Message::Greeting => "greeting",
            Message::ApologyOffline => "apology.offline",
            Message::ApologyConfiguration => "apology.configuration",
            Message::ApologyRateLimited => "apology.rate_limited",
            Message::ApologyService => "apology.service",
            Message::ApologyMalformed => "apology.malformed",
            Message::ApologyNetwork => "apology.network",
        }
    }

    fn english(self) -> &'static str {
        match self {
            Message::Greeting => {
                "Hello! I'm Krrish, your AI voice assistant. Say 'Hey Krrish' or just 'Krrish' followed by your question to get started!"
            }
            Message::ApologyOffline => {
                "I'm currently offline. Please check your internet connection and try again."
            }
            Message::ApologyConfiguration => {
                "I'm not properly configured yet. Please contact the administrator to set up the required API keys."
            }
            Message::ApologyRateLimited => {
                "I'm receiving too many requests right now. Please wait a moment and try again."
            }
            Message::ApologyService => {
                "I'm experiencing technical difficulties. Please try again in a few moments."
            }
            Message::ApologyMalformed => {
                "I'm sorry, I'm having trouble processing your request right now. Please try again later."
            }
            Message::ApologyNetwork => {
                "I'm having trouble connecting to my services. Please check your internet connection and try again."
            }
        }
    }
}

/// Translations for one language, falling back to English
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    language: Language,
    entries: HashMap<String, String>,
}

impl Catalog {
    /// Catalog with only the built-in English strings
    pub fn builtin(language: Language) -> Self {
        Self {
            language,
            entries: HashMap::new(),
        }
    }

    /// Catalog with explicit overrides
    pub fn with_entries(language: Language, entries: HashMap<String, String>) -> Self {
        Self { language, entries }
    }

    /// Load overrides for a language from the standard locale directories
    pub fn load(language: Language) -> Self {
        let locale_dirs = [
            dirs::data_local_dir().map(|p| p.join("krrish/locale")),
            Some(PathBuf::from("/usr/local/share/locale")),
            Some(PathBuf::from("locale")),
        ];

        for dir in locale_dirs.iter().flatten() {
            let path = dir.join(format!("{}/LC_MESSAGES/krrish.json", language.tag()));
            if !path.exists() {
                continue;
            }
            if let Ok(content) = std::fs::read_to_string(&path) {
                if let Ok(entries) = serde_json::from_str::<HashMap<String, String>>(&content) {
                    debug!("Loaded {} translations for '{}'", entries.len(), language);
                    return Self::with_entries(language, entries);
                }
            }
        }

        debug!("No translations found for '{}', using English", language);
        Self::builtin(language)
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Translate a catalog entry
    pub fn tr(&self, message: Message) -> String {
        self.entries
            .get(message.key())
            .cloned()
            .unwrap_or_else(|| message.english().to_string())
    }
}
