//! Conversation channels and in-place turn replacement.
//!
//! Each channel owns an append-only history. A submission appends a
//! placeholder entry and returns a [`TurnHandle`] naming that entry by id;
//! streaming updates replace the entry wholesale through the handle. Only
//! the most recently issued handle is live: a handle superseded by a newer
//! submission is ignored, so a late callback from an old session can never
//! touch the history.

use std::sync::Mutex;

/// Who produced a main-channel turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// Text the user typed.
    User,
    /// Text produced by the system (streamed response, placeholder, or
    /// error).
    System,
}

/// One turn in the main conversation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    /// The turn's full text.
    pub text: String,
    /// Who produced the turn.
    pub origin: Origin,
}

/// One entry in the assistant log. The log is single-party, so no origin
/// tag is carried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    /// The entry's full text.
    pub text: String,
}

/// Names a specific history entry for in-place replacement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TurnHandle {
    id: u64,
}

/// The target of a streaming driver: apply cumulative text, surface an
/// error, or mark the session complete.
///
/// Both channel shapes implement this so one generic driver serves both.
pub trait ChannelSink: Send + Sync {
    /// Replaces the handle's entry with cumulative response text.
    /// Returns false when the handle has been superseded.
    fn apply_chunk(&self, handle: &TurnHandle, text: &str) -> bool;

    /// Replaces the handle's entry with an error rendering.
    /// Returns false when the handle has been superseded.
    fn apply_error(&self, handle: &TurnHandle, message: &str) -> bool;

    /// Marks the handle's session complete, freezing its entry.
    fn complete(&self, handle: &TurnHandle);
}

/// Append-only history with a single live slot, addressed by id.
#[derive(Debug)]
struct History<T> {
    entries: Vec<(u64, T)>,
    next_id: u64,
    live: Option<u64>,
}

impl<T> History<T> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
            live: None,
        }
    }

    /// Appends an entry that is frozen immediately.
    fn push_frozen(&mut self, entry: T) {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, entry));
    }

    /// Appends an entry and makes it the live slot, superseding any
    /// previous live slot.
    fn begin(&mut self, entry: T) -> TurnHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, entry));
        self.live = Some(id);
        TurnHandle { id }
    }

    /// Replaces the handle's entry wholesale, but only while that handle
    /// is the live slot.
    fn replace(&mut self, handle: &TurnHandle, entry: T) -> bool {
        if self.live != Some(handle.id) {
            return false;
        }
        if let Some(slot) = self.entries.iter_mut().rfind(|(id, _)| *id == handle.id) {
            slot.1 = entry;
            true
        } else {
            false
        }
    }

    /// Clears the live slot if the handle still owns it.
    fn complete(&mut self, handle: &TurnHandle) {
        if self.live == Some(handle.id) {
            self.live = None;
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.live = None;
    }
}

impl<T: Clone> History<T> {
    fn snapshot(&self) -> Vec<T> {
        self.entries.iter().map(|(_, entry)| entry.clone()).collect()
    }
}

/// The main conversation channel: user turns interleaved with streamed
/// system turns.
#[derive(Debug)]
pub struct MainChannel {
    history: Mutex<History<Turn>>,
}

impl MainChannel {
    /// Placeholder text shown until the first chunk arrives.
    pub const PLACEHOLDER: &'static str = "Processing...";

    /// Creates an empty main channel.
    pub fn new() -> Self {
        Self {
            history: Mutex::new(History::new()),
        }
    }

    /// Records a user submission: appends the user's turn, then a
    /// placeholder system turn that becomes the live slot.
    pub fn submit(&self, user_text: &str) -> TurnHandle {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.push_frozen(Turn {
            text: user_text.to_string(),
            origin: Origin::User,
        });
        history.begin(Turn {
            text: Self::PLACEHOLDER.to_string(),
            origin: Origin::System,
        })
    }

    /// Returns a snapshot of the conversation.
    pub fn turns(&self) -> Vec<Turn> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.snapshot()
    }

    /// Clears the conversation history.
    pub fn clear(&self) {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.clear();
    }
}

impl Default for MainChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelSink for MainChannel {
    fn apply_chunk(&self, handle: &TurnHandle, text: &str) -> bool {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.replace(
            handle,
            Turn {
                text: text.to_string(),
                origin: Origin::System,
            },
        )
    }

    fn apply_error(&self, handle: &TurnHandle, message: &str) -> bool {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.replace(
            handle,
            Turn {
                text: format!("Error: {message}"),
                origin: Origin::System,
            },
        )
    }

    fn complete(&self, handle: &TurnHandle) {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.complete(handle);
    }
}

/// The assistant log channel: a single-party stream of log entries.
#[derive(Debug)]
pub struct LogChannel {
    history: Mutex<History<LogEntry>>,
}

impl LogChannel {
    /// Placeholder text shown until the first chunk arrives.
    pub const PLACEHOLDER: &'static str = "Thinking...";

    /// Greeting seeded as the log's first entry.
    pub const GREETING: &'static str = "Hello! I am your AI assistant.";

    /// Creates a log channel seeded with the greeting entry.
    pub fn new() -> Self {
        let mut history = History::new();
        history.push_frozen(LogEntry {
            text: Self::GREETING.to_string(),
        });
        Self {
            history: Mutex::new(history),
        }
    }

    /// Records a submission: appends a placeholder entry that becomes the
    /// live slot. The user's text drives the request but is not echoed
    /// into the log.
    pub fn submit(&self) -> TurnHandle {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.begin(LogEntry {
            text: Self::PLACEHOLDER.to_string(),
        })
    }

    /// Returns a snapshot of the log.
    pub fn entries(&self) -> Vec<LogEntry> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.snapshot()
    }

    /// Clears the log and re-seeds the greeting.
    pub fn clear(&self) {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.clear();
        history.push_frozen(LogEntry {
            text: Self::GREETING.to_string(),
        });
    }
}

impl Default for LogChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelSink for LogChannel {
    fn apply_chunk(&self, handle: &TurnHandle, text: &str) -> bool {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.replace(
            handle,
            LogEntry {
                text: text.to_string(),
            },
        )
    }

    fn apply_error(&self, handle: &TurnHandle, message: &str) -> bool {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.replace(
            handle,
            LogEntry {
                text: format!("Error: {message}"),
            },
        )
    }

    fn complete(&self, handle: &TurnHandle) {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.complete(handle);
    }
}
