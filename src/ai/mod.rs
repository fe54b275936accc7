//! AI Module
//!
//! Post text comes from a configured CLI provider (Claude Code, OpenClaw)
//! spawned as a subprocess. Provider-specific logic is encapsulated in
//! `cli::CliProvider`; the generation loop sees only `TextGenerator`.

pub mod cli;
pub mod generator;
pub mod prompt;

// Re-export main types
pub use cli::{detect_provider, select_provider, CliProvider, DetectedCli};
pub use generator::{CliGenerator, TextGenerator};
pub use prompt::build_prompt;
