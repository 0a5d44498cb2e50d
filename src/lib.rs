// Public modules
pub mod chat;
pub mod client;
pub mod cumulative;
pub mod error;
pub mod observability;
pub mod settings;

// Re-exports
pub use chat::{DuplexSession, LogChannel, LogEntry, MainChannel, Origin, SubmissionHandle, Turn};
pub use client::{ChatBackend, ChatClient, ChatRequest, TextStream};
pub use cumulative::CumulativeStream;
pub use error::{Error, Result};
pub use settings::{
    DEFAULT_MODEL, FileSettings, MemorySettings, Settings, SettingsStore,
};
