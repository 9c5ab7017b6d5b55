//! Thread persistence layer.
//!
//! Threads are stored in the workspace under `.priceyy/chat/<threadId>/`:
//!
//! ```text
//! .priceyy/chat/
//! ├── current              # Id of the selected thread
//! └── <threadId>/
//!     ├── thread.json      # Id, title, last activity
//!     └── messages.jsonl   # Append-only message log
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::WORKSPACE_DIR;
use crate::error::{ChatError, ChatResult};
use crate::types::{Message, Thread, ThreadId, ThreadSummary};

const THREAD_FILE: &str = "thread.json";
const MESSAGES_FILE: &str = "messages.jsonl";
const CURRENT_FILE: &str = "current";

/// Metadata kept in `thread.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredThread {
    id: ThreadId,
    title: String,
    timestamp: DateTime<Utc>,
}

/// Persistence manager for chat threads
#[derive(Debug, Clone)]
pub struct ThreadPersistence {
    /// Root path of the workspace
    workspace_root: PathBuf,
}

impl ThreadPersistence {
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            workspace_root: workspace_root.as_ref().to_path_buf(),
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    fn chat_dir(&self) -> PathBuf {
        self.workspace_root.join(WORKSPACE_DIR).join("chat")
    }

    /// Directory of a thread. Ids that could name anything outside
    /// `.priceyy/chat/<id>` are treated as unknown threads.
    fn thread_dir(&self, thread_id: &str) -> ChatResult<PathBuf> {
        if !is_valid_thread_id(thread_id) {
            return Err(ChatError::ThreadNotFound(thread_id.to_string()));
        }
        Ok(self.chat_dir().join(thread_id))
    }

    pub fn exists(&self, thread_id: &str) -> bool {
        self.thread_dir(thread_id)
            .map(|dir| dir.join(THREAD_FILE).exists())
            .unwrap_or(false)
    }

    /// Write the metadata of a thread and rewrite its message log.
    pub fn save_thread(&self, thread: &Thread) -> ChatResult<()> {
        let dir = self.thread_dir(&thread.id)?;
        fs::create_dir_all(&dir)?;

        self.save_metadata(thread)?;

        let mut file = File::create(dir.join(MESSAGES_FILE))?;
        for message in thread.messages() {
            writeln!(file, "{}", serde_json::to_string(message)?)?;
        }
        debug!(thread_id = %thread.id, messages = thread.len(), "Saved thread");
        Ok(())
    }

    /// Write `thread.json` only.
    pub fn save_metadata(&self, thread: &Thread) -> ChatResult<()> {
        let dir = self.thread_dir(&thread.id)?;
        fs::create_dir_all(&dir)?;

        let stored = StoredThread {
            id: thread.id.clone(),
            title: thread.title.clone(),
            timestamp: thread.timestamp,
        };
        fs::write(dir.join(THREAD_FILE), serde_json::to_string_pretty(&stored)?)?;
        Ok(())
    }

    /// Append messages to a thread's log.
    pub fn append_messages(&self, thread_id: &str, messages: &[Message]) -> ChatResult<()> {
        if messages.is_empty() {
            return Ok(());
        }
        let dir = self.thread_dir(thread_id)?;
        fs::create_dir_all(&dir)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(MESSAGES_FILE))?;
        for message in messages {
            writeln!(file, "{}", serde_json::to_string(message)?)?;
        }
        Ok(())
    }

    /// Load a thread with all of its messages.
    pub fn load_thread(&self, thread_id: &str) -> ChatResult<Thread> {
        let stored = self.load_metadata(thread_id)?;
        let messages = self.load_messages(thread_id)?;
        Ok(Thread::from_parts(
            stored.id,
            stored.title,
            stored.timestamp,
            messages,
        ))
    }

    fn load_metadata(&self, thread_id: &str) -> ChatResult<StoredThread> {
        let path = self.thread_dir(thread_id)?.join(THREAD_FILE);
        if !path.exists() {
            return Err(ChatError::ThreadNotFound(thread_id.to_string()));
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load the message log of a thread.
    pub fn load_messages(&self, thread_id: &str) -> ChatResult<Vec<Message>> {
        let path = self.thread_dir(thread_id)?.join(MESSAGES_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(path)?);
        let mut messages = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                messages.push(serde_json::from_str(&line)?);
            }
        }
        Ok(messages)
    }

    /// All stored threads, most recent first.
    pub fn list_threads(&self) -> ChatResult<Vec<ThreadSummary>> {
        let dir = self.chat_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut summaries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().to_string();
            match self.load_thread(&id) {
                Ok(thread) => summaries.push(thread.summary()),
                Err(e) => warn!(thread_id = %id, error = %e, "Skipping unreadable thread"),
            }
        }

        summaries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(summaries)
    }

    /// Delete a thread; clears the current pointer if it named this thread.
    pub fn delete_thread(&self, thread_id: &str) -> ChatResult<()> {
        let dir = self.thread_dir(thread_id)?;
        if !dir.is_dir() {
            return Err(ChatError::ThreadNotFound(thread_id.to_string()));
        }
        fs::remove_dir_all(dir)?;

        if self.current_thread_id()?.as_deref() == Some(thread_id) {
            self.clear_current()?;
        }
        Ok(())
    }

    /// Id of the selected thread, if any.
    pub fn current_thread_id(&self) -> ChatResult<Option<ThreadId>> {
        let path = self.chat_dir().join(CURRENT_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let id = fs::read_to_string(path)?.trim().to_string();
        Ok(if id.is_empty() { None } else { Some(id) })
    }

    pub fn set_current(&self, thread_id: &str) -> ChatResult<()> {
        if !is_valid_thread_id(thread_id) {
            return Err(ChatError::ThreadNotFound(thread_id.to_string()));
        }
        let dir = self.chat_dir();
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(CURRENT_FILE), thread_id)?;
        Ok(())
    }

    pub fn clear_current(&self) -> ChatResult<()> {
        let path = self.chat_dir().join(CURRENT_FILE);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// A single path component of ASCII letters, digits, `-` or `_`.
fn is_valid_thread_id(thread_id: &str) -> bool {
    !thread_id.is_empty()
        && thread_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
