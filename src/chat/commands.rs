//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! letting users adjust settings and control the session without sending
//! messages to the endpoint.

/// A parsed chat command.
///
/// These commands control the session and are not sent to the endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Clear both channel histories.
    Clear,

    /// Set or clear the access token.
    /// `None` clears the stored token.
    Token(Option<String>),

    /// Change the main-channel model.
    MainModel(String),

    /// Change the assistant-log model.
    AssistantModel(String),

    /// Show the settings currently in effect.
    Settings,

    /// Probe the endpoint's health check.
    Health,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use duplex::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/main-model org/some-model").is_some());
/// assert!(parse_command("Hello!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    if !input.starts_with('/') {
        return None;
    }

    let mut parts = input[1..].splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "clear" => ChatCommand::Clear,
        "token" => ChatCommand::Token(argument.map(|s| s.to_string())),
        "main-model" => match argument {
            Some(model) => ChatCommand::MainModel(model.to_string()),
            None => ChatCommand::Invalid("/main-model requires a model identifier".to_string()),
        },
        "assistant-model" => match argument {
            Some(model) => ChatCommand::AssistantModel(model.to_string()),
            None => {
                ChatCommand::Invalid("/assistant-model requires a model identifier".to_string())
            }
        },
        "settings" => ChatCommand::Settings,
        "health" => ChatCommand::Health,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        unknown => ChatCommand::Invalid(format!("Unknown command: /{unknown}")),
    };

    Some(result)
}

/// Returns the help text describing available commands.
pub fn help_text() -> &'static str {
    "Available commands:
  /clear                     Clear both channel histories
  /token [TOKEN]             Set the access token (no argument clears it)
  /main-model MODEL          Set the main-channel model
  /assistant-model MODEL     Set the assistant-log model
  /settings                  Show the settings currently in effect
  /health                    Probe the endpoint health check
  /help, /?                  Show this help
  /quit, /exit, /q           Exit"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_messages_are_not_commands() {
        assert!(parse_command("Hello!").is_none());
        assert!(parse_command("what does /help do?").is_none());
        assert!(parse_command("").is_none());
    }

    #[test]
    fn parses_simple_commands() {
        assert_eq!(parse_command("/clear"), Some(ChatCommand::Clear));
        assert_eq!(parse_command("/settings"), Some(ChatCommand::Settings));
        assert_eq!(parse_command("/health"), Some(ChatCommand::Health));
        assert_eq!(parse_command("/help"), Some(ChatCommand::Help));
        assert_eq!(parse_command("/?"), Some(ChatCommand::Help));
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
    }

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!(
            parse_command("/token hf_secret"),
            Some(ChatCommand::Token(Some("hf_secret".to_string())))
        );
        assert_eq!(parse_command("/token"), Some(ChatCommand::Token(None)));
        assert_eq!(
            parse_command("/main-model org/model-a"),
            Some(ChatCommand::MainModel("org/model-a".to_string()))
        );
        assert_eq!(
            parse_command("/assistant-model org/model-b"),
            Some(ChatCommand::AssistantModel("org/model-b".to_string()))
        );
    }

    #[test]
    fn missing_required_argument_is_invalid() {
        assert!(matches!(
            parse_command("/main-model"),
            Some(ChatCommand::Invalid(_))
        ));
        assert!(matches!(
            parse_command("/assistant-model   "),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn unknown_command_is_invalid() {
        assert!(matches!(
            parse_command("/frobnicate"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn commands_are_case_insensitive() {
        assert_eq!(parse_command("/QUIT"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/Clear"), Some(ChatCommand::Clear));
    }
}
