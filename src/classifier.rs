//! Transcript Classification
//!
//! Decides whether a transcript contains the wake phrase and what command
//! text follows it. Matching is plain case-insensitive substring
//! containment, so "krish" also matches inside longer words.

use crate::i18n::Language;

/// Outcome of classifying one finalized transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// No wake token present
    NoWake,
    /// Wake token present with nothing after it
    WakeOnly,
    /// Wake token followed by a command in the same utterance
    WakeWithCommand(String),
}

/// Returns true if any wake token for `language` occurs in the transcript
pub fn detect_wake_word(transcript: &str, language: Language) -> bool {
    let lower = transcript.to_lowercase();
    language.wake_tokens().any(|token| lower.contains(token))
}

/// Returns the trimmed text after the first matching wake token
///
/// Tokens are tried in priority order and the first one found wins, even
/// if a lower-priority token occurs earlier in the transcript. Returns an
/// empty string when no token matches or nothing follows it.
pub fn extract_command(transcript: &str, language: Language) -> String {
    let lower = transcript.to_lowercase();
    language
        .wake_tokens()
        .find_map(|token| lower.find(token).map(|idx| idx + token.len()))
        .map(|end| lower[end..].trim().to_string())
        .unwrap_or_default()
}

/// Classify a transcript in one pass
pub fn classify(transcript: &str, language: Language) -> Classification {
    if !detect_wake_word(transcript, language) {
        return Classification::NoWake;
    }
    let command = extract_command(transcript, language);
    if command.is_empty() {
        Classification::WakeOnly
    } else {
        Classification::WakeWithCommand(command)
    }
}
