//! Dual-channel session orchestration.
//!
//! One user submission fans out into two concurrent streaming sessions:
//! the main conversational reply and the assistant log, each driven by its
//! own model and developer message but fed the same user text. Neither
//! session blocks the other, and neither blocks the caller: `submit`
//! returns as soon as both driver tasks are spawned.

use std::sync::{Arc, Mutex};

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::chat::channel::{ChannelSink, LogChannel, MainChannel, TurnHandle};
use crate::client::{ChatBackend, ChatRequest};
use crate::cumulative::CumulativeStream;
use crate::observability::{SESSIONS_STARTED, STALE_UPDATES};
use crate::settings::{Settings, SettingsStore};

/// Developer message establishing the main channel's behavior.
pub const MAIN_DEVELOPER_MESSAGE: &str = "You are a helpful AI assistant in a corrupt terminal.";

/// Developer message establishing the assistant log's behavior.
pub const LOG_DEVELOPER_MESSAGE: &str = "You are a helpful AI assistant providing concise logs.";

/// A dual-channel chat session.
///
/// Owns both channel histories and fans each submission out to two
/// concurrent streaming sessions. Settings are re-read from the injected
/// store on every submission, so a mid-session change takes effect on the
/// next message.
pub struct DuplexSession {
    backend: Arc<dyn ChatBackend>,
    settings: Arc<dyn SettingsStore>,
    main: Arc<MainChannel>,
    log: Arc<LogChannel>,
    main_cancel: Mutex<CancellationToken>,
    log_cancel: Mutex<CancellationToken>,
}

/// Join handles for one submission's pair of driver tasks.
///
/// The caller never has to await these for the channels to update; they
/// exist so interactive frontends and tests can wait for a turn to settle.
pub struct SubmissionHandle {
    /// Driver task for the main channel's session.
    pub main: JoinHandle<()>,
    /// Driver task for the assistant log's session.
    pub log: JoinHandle<()>,
}

impl SubmissionHandle {
    /// Waits until both channels' sessions reach a terminal state.
    pub async fn join(self) {
        let _ = self.main.await;
        let _ = self.log.await;
    }
}

impl DuplexSession {
    /// Creates a session over a backend and a settings store.
    pub fn new(backend: Arc<dyn ChatBackend>, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            backend,
            settings,
            main: Arc::new(MainChannel::new()),
            log: Arc::new(LogChannel::new()),
            main_cancel: Mutex::new(CancellationToken::new()),
            log_cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Returns the main conversation channel.
    pub fn main_channel(&self) -> Arc<MainChannel> {
        Arc::clone(&self.main)
    }

    /// Returns the assistant log channel.
    pub fn log_channel(&self) -> Arc<LogChannel> {
        Arc::clone(&self.log)
    }

    /// Handles one user submission.
    ///
    /// Empty or whitespace-only input is silently ignored: no turn is
    /// appended and no request is issued. Otherwise the current settings
    /// are read once, both channels receive their placeholder turns, and
    /// one driver task per channel is spawned. Any session still in
    /// flight on a channel is cancelled and its turn frozen as-is; the
    /// new session can never interleave with it.
    pub fn submit(&self, input: &str) -> Option<SubmissionHandle> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        let settings = Settings::load(&*self.settings);
        SESSIONS_STARTED.click();

        let main_handle = self.main.submit(input);
        let log_handle = self.log.submit();
        let main_token = rotate_token(&self.main_cancel);
        let log_token = rotate_token(&self.log_cancel);

        let main_request = ChatRequest {
            developer_message: MAIN_DEVELOPER_MESSAGE.to_string(),
            user_message: input.to_string(),
            model: settings.main_model,
            hf_token: settings.hf_token.clone(),
        };
        let log_request = ChatRequest {
            developer_message: LOG_DEVELOPER_MESSAGE.to_string(),
            user_message: input.to_string(),
            model: settings.assistant_model,
            hf_token: settings.hf_token,
        };

        let main = spawn_driver(
            Arc::clone(&self.backend),
            Arc::clone(&self.main),
            main_handle,
            main_request,
            main_token,
        );
        let log = spawn_driver(
            Arc::clone(&self.backend),
            Arc::clone(&self.log),
            log_handle,
            log_request,
            log_token,
        );

        Some(SubmissionHandle { main, log })
    }

    /// Cancels any in-flight sessions, freezing both channels' live turns
    /// at their current text.
    pub fn cancel(&self) {
        let main_cancel = self.main_cancel.lock().unwrap_or_else(|e| e.into_inner());
        main_cancel.cancel();
        let log_cancel = self.log_cancel.lock().unwrap_or_else(|e| e.into_inner());
        log_cancel.cancel();
    }

    /// Cancels in-flight sessions and clears both channel histories.
    pub fn clear(&self) {
        self.cancel();
        self.main.clear();
        self.log.clear();
    }
}

/// Swaps in a fresh cancellation token, cancelling whatever session held
/// the previous one.
fn rotate_token(slot: &Mutex<CancellationToken>) -> CancellationToken {
    let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());
    guard.cancel();
    let fresh = CancellationToken::new();
    *guard = fresh.clone();
    fresh
}

fn spawn_driver<C>(
    backend: Arc<dyn ChatBackend>,
    channel: Arc<C>,
    handle: TurnHandle,
    request: ChatRequest,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    C: ChannelSink + 'static,
{
    tokio::spawn(async move {
        drive(backend, channel, handle, request, cancel).await;
    })
}

/// Drives one streaming session into its channel.
///
/// Every cumulative snapshot replaces the session's turn; the first
/// failure (request setup, transport, or decode) replaces it with an
/// error rendering instead. All failures terminate here; nothing
/// propagates out of the task.
async fn drive<C>(
    backend: Arc<dyn ChatBackend>,
    channel: Arc<C>,
    handle: TurnHandle,
    request: ChatRequest,
    cancel: CancellationToken,
) where
    C: ChannelSink + 'static,
{
    let stream = match backend.open_stream(request).await {
        Ok(stream) => stream,
        Err(err) => {
            channel.apply_error(&handle, &err.to_string());
            channel.complete(&handle);
            return;
        }
    };

    let (mut snapshots, _final_text) = CumulativeStream::new(stream);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            item = snapshots.next() => match item {
                Some(Ok(text)) => {
                    if !channel.apply_chunk(&handle, &text) {
                        STALE_UPDATES.click();
                        break;
                    }
                }
                Some(Err(err)) => {
                    channel.apply_error(&handle, &err.to_string());
                    break;
                }
                None => break,
            },
        }
    }
    channel.complete(&handle);
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use futures::stream;

    use super::*;
    use crate::chat::channel::Origin;
    use crate::client::TextStream;
    use crate::error::{Error, Result};
    use crate::settings::{
        DEFAULT_MODEL, KEY_ASSISTANT_MODEL, KEY_HF_TOKEN, KEY_MAIN_MODEL, MemorySettings,
    };

    #[derive(Clone)]
    enum Script {
        /// Yield each chunk after the given delay.
        Chunks(Duration, Vec<&'static str>),
        /// Refuse the request with an API error.
        Fail(u16, &'static str),
    }

    /// Backend that answers from per-model scripts and records every
    /// request it receives.
    struct ScriptedBackend {
        scripts: Mutex<HashMap<String, Script>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedBackend {
        fn new() -> Self {
            Self {
                scripts: Mutex::new(HashMap::new()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn script(self, model: &str, script: Script) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .insert(model.to_string(), script);
            self
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn open_stream(&self, request: ChatRequest) -> Result<TextStream> {
            let script = self
                .scripts
                .lock()
                .unwrap()
                .get(&request.model)
                .cloned()
                .unwrap_or_else(|| Script::Chunks(Duration::ZERO, vec!["ok"]));
            self.requests.lock().unwrap().push(request);

            match script {
                Script::Fail(status, body) => Err(Error::api(status, body)),
                Script::Chunks(delay, chunks) => {
                    let stream = stream::unfold(chunks.into_iter(), move |mut chunks| async move {
                        let chunk = chunks.next()?;
                        tokio::time::sleep(delay).await;
                        Some((Ok::<String, Error>(chunk.to_string()), chunks))
                    });
                    Ok(Box::pin(stream) as TextStream)
                }
            }
        }
    }

    fn session_with(backend: ScriptedBackend, settings: MemorySettings) -> DuplexSession {
        DuplexSession::new(Arc::new(backend), Arc::new(settings))
    }

    #[tokio::test]
    async fn submission_lands_final_text_in_both_channels() {
        let backend = ScriptedBackend::new()
            .script(DEFAULT_MODEL, Script::Chunks(Duration::ZERO, vec!["Hel", "lo"]));
        let session = session_with(backend, MemorySettings::new());

        let handle = session.submit("hi there").unwrap();
        handle.join().await;

        let turns = session.main_channel().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].text, "hi there");
        assert_eq!(turns[0].origin, Origin::User);
        assert_eq!(turns[1].text, "Hello");
        assert_eq!(turns[1].origin, Origin::System);

        let entries = session.log_channel().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].text, "Hello");
    }

    #[tokio::test]
    async fn empty_input_is_a_no_op() {
        let backend = ScriptedBackend::new();
        let session = DuplexSession::new(
            Arc::new(backend),
            Arc::new(MemorySettings::new()),
        );

        assert!(session.submit("").is_none());
        assert!(session.submit("   ").is_none());

        assert!(session.main_channel().turns().is_empty());
        assert_eq!(session.log_channel().entries().len(), 1);
    }

    #[tokio::test]
    async fn empty_input_issues_no_request() {
        let backend = Arc::new(ScriptedBackend::new());
        let session = DuplexSession::new(
            Arc::clone(&backend) as Arc<dyn ChatBackend>,
            Arc::new(MemorySettings::new()),
        );

        assert!(session.submit("  \t ").is_none());
        assert!(backend.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn placeholder_shows_until_first_chunk() {
        let backend = ScriptedBackend::new().script(
            DEFAULT_MODEL,
            Script::Chunks(Duration::from_millis(50), vec!["streamed"]),
        );
        let session = session_with(backend, MemorySettings::new());

        let handle = session.submit("hi").unwrap();

        assert_eq!(
            session.main_channel().turns()[1].text,
            MainChannel::PLACEHOLDER
        );
        assert_eq!(
            session.log_channel().entries()[1].text,
            LogChannel::PLACEHOLDER
        );

        handle.join().await;
        assert_eq!(session.main_channel().turns()[1].text, "streamed");
        assert_eq!(session.log_channel().entries()[1].text, "streamed");
    }

    #[tokio::test]
    async fn channel_error_does_not_disturb_the_other_channel() {
        let settings = MemorySettings::new();
        settings.set(KEY_MAIN_MODEL, "models/failing").unwrap();
        settings.set(KEY_ASSISTANT_MODEL, "models/healthy").unwrap();

        let backend = ScriptedBackend::new()
            .script("models/failing", Script::Fail(500, "boom"))
            .script(
                "models/healthy",
                Script::Chunks(Duration::ZERO, vec!["all", " good"]),
            );
        let session = session_with(backend, settings);

        let handle = session.submit("hi").unwrap();
        handle.join().await;

        let turns = session.main_channel().turns();
        assert_eq!(turns[1].text, "Error: 500 - boom");

        let entries = session.log_channel().entries();
        assert_eq!(entries[1].text, "all good");
    }

    #[tokio::test(start_paused = true)]
    async fn channels_complete_independently() {
        let settings = MemorySettings::new();
        settings.set(KEY_MAIN_MODEL, "models/slow").unwrap();
        settings.set(KEY_ASSISTANT_MODEL, "models/fast").unwrap();

        let backend = ScriptedBackend::new()
            .script(
                "models/slow",
                Script::Chunks(Duration::from_secs(10), vec!["slow answer"]),
            )
            .script(
                "models/fast",
                Script::Chunks(Duration::from_millis(1), vec!["fast log"]),
            );
        let session = session_with(backend, settings);

        let handle = session.submit("hi").unwrap();
        let _ = handle.log.await;

        // The log finished; the main channel is still on its placeholder.
        assert_eq!(session.log_channel().entries()[1].text, "fast log");
        assert_eq!(
            session.main_channel().turns()[1].text,
            MainChannel::PLACEHOLDER
        );

        let _ = handle.main.await;
        assert_eq!(session.main_channel().turns()[1].text, "slow answer");
        assert_eq!(session.log_channel().entries()[1].text, "fast log");
    }

    #[tokio::test]
    async fn default_model_requested_when_settings_absent() {
        let backend = Arc::new(ScriptedBackend::new());
        let session = DuplexSession::new(
            Arc::clone(&backend) as Arc<dyn ChatBackend>,
            Arc::new(MemorySettings::new()),
        );

        session.submit("hi").unwrap().join().await;

        let requests = backend.requests();
        assert_eq!(requests.len(), 2);
        for request in &requests {
            assert_eq!(request.model, DEFAULT_MODEL);
            assert_eq!(request.user_message, "hi");
            assert_eq!(request.hf_token, None);
        }
        let developers: Vec<&str> = requests
            .iter()
            .map(|r| r.developer_message.as_str())
            .collect();
        assert!(developers.contains(&MAIN_DEVELOPER_MESSAGE));
        assert!(developers.contains(&LOG_DEVELOPER_MESSAGE));
    }

    #[tokio::test]
    async fn token_and_settings_changes_apply_to_next_submission() {
        let backend = Arc::new(ScriptedBackend::new());
        let settings = Arc::new(MemorySettings::new());
        let session = DuplexSession::new(
            Arc::clone(&backend) as Arc<dyn ChatBackend>,
            Arc::clone(&settings) as Arc<dyn SettingsStore>,
        );

        session.submit("first").unwrap().join().await;

        settings.set(KEY_HF_TOKEN, "hf_secret").unwrap();
        settings.set(KEY_MAIN_MODEL, "models/other").unwrap();
        session.submit("second").unwrap().join().await;

        let requests = backend.requests();
        assert_eq!(requests[0].hf_token, None);
        assert_eq!(requests[0].model, DEFAULT_MODEL);

        let second_main = requests
            .iter()
            .find(|r| r.user_message == "second" && r.developer_message == MAIN_DEVELOPER_MESSAGE)
            .unwrap();
        assert_eq!(second_main.hf_token.as_deref(), Some("hf_secret"));
        assert_eq!(second_main.model, "models/other");
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_submission_freezes_the_superseded_turn() {
        let backend = ScriptedBackend::new().script(
            DEFAULT_MODEL,
            Script::Chunks(Duration::from_secs(1), vec!["a", "b", "c"]),
        );
        let session = session_with(backend, MemorySettings::new());

        let first = session.submit("one").unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(session.main_channel().turns()[1].text, "a");

        let second = session.submit("two").unwrap();
        first.join().await;
        second.join().await;

        let turns = session.main_channel().turns();
        assert_eq!(turns.len(), 4);
        // The superseded turn keeps the partial text it had when the new
        // submission arrived.
        assert_eq!(turns[1].text, "a");
        assert_eq!(turns[2].text, "two");
        assert_eq!(turns[3].text, "abc");
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_freezes_live_turns() {
        let backend = ScriptedBackend::new().script(
            DEFAULT_MODEL,
            Script::Chunks(Duration::from_secs(1), vec!["a", "b", "c"]),
        );
        let session = session_with(backend, MemorySettings::new());

        let handle = session.submit("hi").unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        session.cancel();
        handle.join().await;

        assert_eq!(session.main_channel().turns()[1].text, "a");
    }
}
