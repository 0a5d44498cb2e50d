//! Chat application module for dual-channel streaming conversations.
//!
//! One user submission drives two independent conversational channels
//! against the same endpoint: the main reply and a secondary assistant
//! log, each with its own model and developer message. Both stream
//! concurrently; an error on one channel never disturbs the other.
//!
//! # Architecture
//!
//! - `channel`: conversation histories and in-place turn replacement
//! - `session`: the dual-channel orchestrator
//! - `config`: CLI argument parsing and configuration
//! - `commands`: slash command parsing for the REPL

mod channel;
mod commands;
mod config;
mod session;

pub use channel::{ChannelSink, LogChannel, LogEntry, MainChannel, Origin, Turn, TurnHandle};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use session::{
    DuplexSession, LOG_DEVELOPER_MESSAGE, MAIN_DEVELOPER_MESSAGE, SubmissionHandle,
};
