//! Krrish Library
//!
//! Core modules for the Krrish wake-word voice assistant: transcript
//! classification, speech input/output control, the voice session state
//! machine and the event loop that drives it.

pub mod asr;
pub mod backend;
pub mod classifier;
pub mod config;
pub mod conversation;
pub mod error;
pub mod i18n;
pub mod input;
pub mod machine;
pub mod output;
pub mod runtime;
pub mod session;
pub mod storage;
pub mod tts;
