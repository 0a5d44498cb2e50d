//! Interactive dual-channel chat application.
//!
//! This binary provides a streaming REPL against a chat endpoint. Every
//! message is answered twice: a main reply streamed to the terminal and a
//! concise assistant log printed once its stream settles.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage against the default local endpoint
//! duplex-chat
//!
//! # Point at another endpoint and persist settings
//! duplex-chat --endpoint https://chat.example.com/api/ --settings prefs.json
//!
//! # Override the models for this run
//! duplex-chat --main-model org/model-a --assistant-model org/model-b
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/clear` - Clear both channel histories
//! - `/token [TOKEN]` - Set or clear the access token
//! - `/main-model <id>` / `/assistant-model <id>` - Change models
//! - `/settings` - Show the settings currently in effect
//! - `/health` - Probe the endpoint health check
//! - `/quit` - Exit the application

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use duplex::chat::{ChatArgs, ChatCommand, ChatConfig, help_text, parse_command};
use duplex::settings::{KEY_ASSISTANT_MODEL, KEY_HF_TOKEN, KEY_MAIN_MODEL};
use duplex::{
    ChatClient, DuplexSession, FileSettings, MainChannel, MemorySettings, Settings,
    SettingsStore, SubmissionHandle,
};

/// Main entry point for the duplex-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("duplex-chat [OPTIONS]");
    let config = ChatConfig::from(args);

    let store: Arc<dyn SettingsStore> = match &config.settings_path {
        Some(path) => Arc::new(FileSettings::open(path)?),
        None => Arc::new(MemorySettings::new()),
    };
    if let Some(token) = &config.token {
        store.set(KEY_HF_TOKEN, token)?;
    }
    if let Some(model) = &config.main_model {
        store.set(KEY_MAIN_MODEL, model)?;
    }
    if let Some(model) = &config.assistant_model {
        store.set(KEY_ASSISTANT_MODEL, model)?;
    }

    let client = ChatClient::with_options(config.endpoint.clone(), None)?;
    let session = Arc::new(DuplexSession::new(
        Arc::new(client.clone()),
        Arc::clone(&store),
    ));

    // Ctrl+C during a streaming response cancels the in-flight sessions
    // instead of killing the process.
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    let ctrlc_session = Arc::clone(&session);
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
        ctrlc_session.cancel();
    })?;

    let mut rl = DefaultEditor::new()?;

    println!("duplex chat (endpoint: {})", client.base_url());
    println!("Type /help for commands, /quit to exit\n");

    loop {
        // Reset interrupt flag before each input
        interrupted.store(false, Ordering::Relaxed);

        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Clear => {
                            session.clear();
                            println!("Histories cleared.");
                        }
                        ChatCommand::Token(Some(token)) => {
                            store.set(KEY_HF_TOKEN, &token)?;
                            println!("Access token updated.");
                        }
                        ChatCommand::Token(None) => {
                            store.set(KEY_HF_TOKEN, "")?;
                            println!("Access token cleared.");
                        }
                        ChatCommand::MainModel(model) => {
                            store.set(KEY_MAIN_MODEL, &model)?;
                            println!("Main-channel model set to: {model}");
                        }
                        ChatCommand::AssistantModel(model) => {
                            store.set(KEY_ASSISTANT_MODEL, &model)?;
                            println!("Assistant-log model set to: {model}");
                        }
                        ChatCommand::Settings => {
                            print_settings(&*store);
                        }
                        ChatCommand::Health => match client.health().await {
                            Ok(status) => println!("Endpoint health: {status}"),
                            Err(err) => println!("Health check failed: {err}"),
                        },
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::Invalid(message) => {
                            println!("{message}");
                        }
                    }
                    continue;
                }

                // Regular message - fan out to both channels
                if let Some(handle) = session.submit(line) {
                    stream_to_stdout(&session, handle).await;
                }
            }
            Err(ReadlineError::Interrupted) => {
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Readline error: {err}");
                break;
            }
        }
    }

    Ok(())
}

/// Prints the main channel's response as it streams, then echoes the
/// assistant log entry once its own stream settles.
async fn stream_to_stdout(session: &DuplexSession, handle: SubmissionHandle) {
    let main = session.main_channel();
    let SubmissionHandle {
        main: mut main_task,
        log: log_task,
    } = handle;

    println!("Assistant:");
    let mut printed = String::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(50));
    loop {
        tokio::select! {
            _ = &mut main_task => {
                print_tail_delta(&main, &mut printed);
                break;
            }
            _ = ticker.tick() => {
                print_tail_delta(&main, &mut printed);
            }
        }
    }
    println!();

    let _ = log_task.await;
    if let Some(entry) = session.log_channel().entries().last() {
        println!("Log: {}\n", entry.text);
    }
}

/// Prints whatever the main channel's tail turn has gained since the last
/// call. Cumulative snapshots only grow, so printing the new suffix is
/// enough; an error replaces the turn wholesale and is reprinted in full.
fn print_tail_delta(main: &MainChannel, printed: &mut String) {
    let turns = main.turns();
    let Some(turn) = turns.last() else {
        return;
    };
    if turn.text == MainChannel::PLACEHOLDER || turn.text == *printed {
        return;
    }
    if let Some(suffix) = turn.text.strip_prefix(printed.as_str()) {
        print!("{suffix}");
    } else {
        println!();
        print!("{}", turn.text);
    }
    *printed = turn.text.clone();
    let _ = std::io::stdout().flush();
}

/// Prints the resolved settings, with the token redacted to presence.
fn print_settings(store: &dyn SettingsStore) {
    let settings = Settings::load(store);
    let token = if settings.hf_token.is_some() {
        "set"
    } else {
        "unset"
    };
    println!("Access token:     {token}");
    println!("Main model:       {}", settings.main_model);
    println!("Assistant model:  {}", settings.assistant_model);
}
