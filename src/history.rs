use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::models::{ChatTurn, Speaker};
use crate::response::ERROR_NOTICE;

const USER_PREFIX: &str = "User: ";
const ASSISTANT_PREFIX: &str = "Assistant: ";

/// Append-only transcript file with `User: ` / `Assistant: ` lines.
/// Lines without a prefix continue the previous turn.
pub struct History {
    file_path: PathBuf,
}

impl History {
    pub fn new(file_path: impl AsRef<Path>) -> Self {
        History {
            file_path: file_path.as_ref().to_path_buf(),
        }
    }

    pub fn save_turn(&self, turn: &ChatTurn) -> io::Result<()> {
        let prefix = match turn.role {
            Speaker::User => USER_PREFIX,
            Speaker::Assistant => ASSISTANT_PREFIX,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        writeln!(file, "{}{}", prefix, turn.content)?;
        Ok(())
    }

    pub fn load_turns(&self) -> io::Result<Vec<ChatTurn>> {
        let content = match std::fs::read_to_string(&self.file_path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut turns: Vec<ChatTurn> = Vec::new();
        for line in content.lines() {
            if let Some(rest) = line.strip_prefix(USER_PREFIX) {
                turns.push(ChatTurn::user(rest));
            } else if let Some(rest) = line.strip_prefix(ASSISTANT_PREFIX) {
                turns.push(ChatTurn::assistant(rest));
            } else if let Some(last) = turns.last_mut() {
                last.content.push('\n');
                last.content.push_str(line);
            }
        }
        Ok(turns)
    }
}

/// In-memory transcript of a session, mirrored to a [`History`] file when set.
pub struct Transcript {
    turns: Vec<ChatTurn>,
    file: Option<History>,
}

impl Transcript {
    pub fn new(file: Option<History>) -> Self {
        Transcript {
            turns: Vec::new(),
            file,
        }
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn file(&self) -> Option<&History> {
        self.file.as_ref()
    }

    /// Shown only, never written to the file.
    pub fn push_greeting(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    pub fn record(&mut self, turn: ChatTurn) {
        if let Some(file) = &self.file {
            if let Err(e) = file.save_turn(&turn) {
                eprintln!("Failed to save transcript: {}", e);
            }
        }
        self.turns.push(turn);
    }

    /// Answers the pending user turn with the error notice.
    pub fn record_failure(&mut self) {
        self.record(ChatTurn::assistant(ERROR_NOTICE));
    }
}
