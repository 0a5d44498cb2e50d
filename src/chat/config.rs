//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling the REPL.

use std::path::PathBuf;

use arrrg_derive::CommandLine;

/// Command-line arguments for the duplex-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base URL of the chat endpoint.
    #[arrrg(optional, "Endpoint base URL (default: http://localhost:8000/api/)", "URL")]
    pub endpoint: Option<String>,

    /// Access token forwarded with every request.
    #[arrrg(optional, "Access token for the inference provider", "TOKEN")]
    pub token: Option<String>,

    /// Model identifier for the main channel.
    #[arrrg(optional, "Main-channel model identifier", "MODEL")]
    pub main_model: Option<String>,

    /// Model identifier for the assistant log channel.
    #[arrrg(optional, "Assistant-log model identifier", "MODEL")]
    pub assistant_model: Option<String>,

    /// Path to the JSON settings file.
    #[arrrg(optional, "Persist settings to this JSON file", "PATH")]
    pub settings: Option<String>,
}

/// Configuration for the chat REPL.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments. Model and token values are overrides written
/// into the settings store at startup; absent values leave the store
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatConfig {
    /// Base URL of the chat endpoint; `None` uses the client default.
    pub endpoint: Option<String>,

    /// Access token override.
    pub token: Option<String>,

    /// Main-channel model override.
    pub main_model: Option<String>,

    /// Assistant-log model override.
    pub assistant_model: Option<String>,

    /// Settings file to persist preferences across runs; `None` keeps
    /// settings in memory for the process lifetime.
    pub settings_path: Option<PathBuf>,
}

impl ChatConfig {
    /// Creates a configuration with no overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the endpoint base URL.
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Sets the access token override.
    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    /// Sets the main-channel model override.
    pub fn with_main_model(mut self, model: String) -> Self {
        self.main_model = Some(model);
        self
    }

    /// Sets the assistant-log model override.
    pub fn with_assistant_model(mut self, model: String) -> Self {
        self.assistant_model = Some(model);
        self
    }

    /// Sets the settings file path.
    pub fn with_settings_path(mut self, path: PathBuf) -> Self {
        self.settings_path = Some(path);
        self
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        ChatConfig {
            endpoint: args.endpoint,
            token: args.token,
            main_model: args.main_model,
            assistant_model: args.assistant_model,
            settings_path: args.settings.map(PathBuf::from),
        }
    }
}
