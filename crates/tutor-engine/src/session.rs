use std::path::PathBuf;

use tracing::{info, warn};
use tutor_contracts::events::{SessionEvent, SessionEventLog};
use tutor_contracts::turns::{Turn, TurnStore};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub turns: usize,
    pub completed_cycles: u64,
    pub failed_cycles: u64,
    pub resets: u64,
}

/// Only the dispatcher appends turns.
#[derive(Debug)]
pub struct ChatSession {
    session_id: String,
    started_at: String,
    store: TurnStore,
    events: Option<SessionEventLog>,
    completed_cycles: u64,
    failed_cycles: u64,
    resets: u64,
}

impl ChatSession {
    /// An event log that cannot be opened is reported and skipped.
    pub fn init(events_path: Option<PathBuf>) -> Self {
        let session_id = format!("session-{}", Uuid::new_v4());
        let events = events_path.and_then(|path| {
            match SessionEventLog::open(&path, session_id.clone()) {
                Ok(log) => Some(log),
                Err(err) => {
                    warn!(
                        %session_id,
                        path = %path.display(),
                        error = %format!("{err:#}"),
                        "session event log disabled"
                    );
                    None
                }
            }
        });
        let session = Self {
            session_id,
            started_at: now_utc_iso(),
            store: TurnStore::new(),
            events,
            completed_cycles: 0,
            failed_cycles: 0,
            resets: 0,
        };
        info!(session_id = %session.session_id, "chat session started");
        session.emit(SessionEvent::SessionStarted);
        session
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn snapshot(&self) -> &[Turn] {
        self.store.snapshot()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn reset(&mut self) {
        let cleared_turns = self.store.len();
        self.store.reset();
        self.resets += 1;
        info!(session_id = %self.session_id, cleared_turns, "chat session reset");
        self.emit(SessionEvent::SessionReset { cleared_turns });
    }

    pub fn teardown(self) -> SessionSummary {
        let summary = SessionSummary {
            session_id: self.session_id.clone(),
            started_at: self.started_at.clone(),
            finished_at: now_utc_iso(),
            turns: self.store.len(),
            completed_cycles: self.completed_cycles,
            failed_cycles: self.failed_cycles,
            resets: self.resets,
        };
        self.emit(SessionEvent::SessionFinished {
            turns: summary.turns,
            completed_cycles: summary.completed_cycles,
            failed_cycles: summary.failed_cycles,
            resets: summary.resets,
        });
        info!(session_id = %summary.session_id, turns = summary.turns, "chat session finished");
        summary
    }

    pub(crate) fn append(&mut self, turn: Turn) -> &Turn {
        self.emit(SessionEvent::turn_appended(self.store.len(), &turn));
        self.store.append(turn)
    }

    pub(crate) fn record_cycle(&mut self, succeeded: bool) {
        if succeeded {
            self.completed_cycles += 1;
        } else {
            self.failed_cycles += 1;
        }
    }

    /// Event logging never fails a cycle.
    pub(crate) fn emit(&self, event: SessionEvent) {
        let Some(log) = self.events.as_ref() else {
            return;
        };
        if let Err(err) = log.record(&event) {
            warn!(
                session_id = %self.session_id,
                event_type = event.name(),
                error = %format!("{err:#}"),
                "failed to write session event"
            );
        }
    }
}

fn now_utc_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false)
}
