use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::turns::{Author, PayloadKind, Turn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPath {
    /// Single-shot multimodal call; prior turns are not consulted.
    Image,
    /// Multi-turn chat seeded with the projected history.
    Text,
}

impl DispatchPath {
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchPath::Image => "image",
            DispatchPath::Text => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSummary {
    pub mime_type: String,
    pub bytes: usize,
    pub sha256: String,
}

/// Everything a chat session records in its `events.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted,
    TurnAppended {
        index: usize,
        author: Author,
        payload_kind: PayloadKind,
        text_chars: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        image: Option<ImageSummary>,
    },
    RemoteCallStarted {
        path: DispatchPath,
        provider: String,
        model: String,
        history_entries: usize,
    },
    RemoteCallFinished {
        path: DispatchPath,
        reply_chars: usize,
        elapsed_ms: u64,
    },
    RemoteCallFailed {
        path: DispatchPath,
        kind: String,
        error: String,
        elapsed_ms: u64,
    },
    SessionReset {
        cleared_turns: usize,
    },
    SessionFinished {
        turns: usize,
        completed_cycles: u64,
        failed_cycles: u64,
        resets: u64,
    },
}

impl SessionEvent {
    pub fn turn_appended(index: usize, turn: &Turn) -> Self {
        SessionEvent::TurnAppended {
            index,
            author: turn.author,
            payload_kind: turn.payload.kind(),
            text_chars: turn.text().chars().count(),
            image: turn.payload.image().map(|image| ImageSummary {
                mime_type: image.mime_type.clone(),
                bytes: image.len(),
                sha256: image.sha256_hex(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::SessionStarted => "session_started",
            SessionEvent::TurnAppended { .. } => "turn_appended",
            SessionEvent::RemoteCallStarted { .. } => "remote_call_started",
            SessionEvent::RemoteCallFinished { .. } => "remote_call_finished",
            SessionEvent::RemoteCallFailed { .. } => "remote_call_failed",
            SessionEvent::SessionReset { .. } => "session_reset",
            SessionEvent::SessionFinished { .. } => "session_finished",
        }
    }
}

#[derive(Serialize)]
struct EventLine<'a> {
    session_id: &'a str,
    ts: String,
    #[serde(flatten)]
    event: &'a SessionEvent,
}

/// Append-only `events.jsonl` for one session, one compact object per line.
#[derive(Debug)]
pub struct SessionEventLog {
    session_id: String,
    file: File,
}

impl SessionEventLog {
    /// Opens (or creates) the log, creating parent directories as needed.
    pub fn open(path: impl Into<PathBuf>, session_id: impl Into<String>) -> anyhow::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open event log {}", path.display()))?;
        Ok(Self {
            session_id: session_id.into(),
            file,
        })
    }

    pub fn record(&self, event: &SessionEvent) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(&EventLine {
            session_id: &self.session_id,
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
            event,
        })?;
        line.push('\n');
        (&self.file)
            .write_all(line.as_bytes())
            .with_context(|| format!("failed to write {} event", event.name()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use serde_json::{json, Value};

    use super::*;
    use crate::turns::ImageAttachment;

    fn read_lines(path: &std::path::Path) -> anyhow::Result<Vec<Value>> {
        let raw = fs::read_to_string(path)?;
        raw.lines()
            .map(|line| serde_json::from_str(line).map_err(anyhow::Error::from))
            .collect()
    }

    #[test]
    fn record_writes_tagged_line_with_session_and_timestamp() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let log = SessionEventLog::open(&path, "session-123")?;

        log.record(&SessionEvent::RemoteCallStarted {
            path: DispatchPath::Text,
            provider: "gemini".to_string(),
            model: "gemini-flash-latest".to_string(),
            history_entries: 2,
        })?;

        let lines = read_lines(&path)?;
        assert_eq!(lines.len(), 1);
        let row = &lines[0];
        assert_eq!(row["type"], "remote_call_started");
        assert_eq!(row["session_id"], "session-123");
        assert_eq!(row["path"], "text");
        assert_eq!(row["history_entries"], 2);
        DateTime::parse_from_rfc3339(row["ts"].as_str().unwrap_or(""))?;
        Ok(())
    }

    #[test]
    fn unit_event_carries_only_envelope_fields() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        SessionEventLog::open(&path, "session-123")?.record(&SessionEvent::SessionStarted)?;

        let row = read_lines(&path)?.remove(0);
        let mut keys = row
            .as_object()
            .map(|object| object.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        keys.sort();
        assert_eq!(keys, vec!["session_id", "ts", "type"]);
        Ok(())
    }

    #[test]
    fn turn_appended_summarises_image_without_bytes() {
        let turn = Turn::user_with_image(
            "Explain this circuit",
            ImageAttachment::new("image/png", b"abc".to_vec()),
        );
        let event = SessionEvent::turn_appended(0, &turn);
        let value = serde_json::to_value(&event).unwrap_or_default();
        assert_eq!(
            value,
            json!({
                "type": "turn_appended",
                "index": 0,
                "author": "user",
                "payload_kind": "text_with_image",
                "text_chars": 20,
                "image": {
                    "mime_type": "image/png",
                    "bytes": 3,
                    "sha256": "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
                },
            })
        );

        let text_only = serde_json::to_value(SessionEvent::turn_appended(1, &Turn::assistant_text("Hint")))
            .unwrap_or_default();
        assert!(text_only.get("image").is_none());
    }

    #[test]
    fn reopening_appends_and_creates_parent_dirs() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("events.jsonl");

        SessionEventLog::open(&path, "session-1")?.record(&SessionEvent::SessionStarted)?;
        SessionEventLog::open(&path, "session-1")?
            .record(&SessionEvent::SessionReset { cleared_turns: 4 })?;

        let lines = read_lines(&path)?;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "session_started");
        assert_eq!(lines[1]["type"], "session_reset");
        assert_eq!(lines[1]["cleared_turns"], 4);
        Ok(())
    }
}
