//! Observability module for correlation and run progress
//!
//! A run pushes `ProgressEvent`s to whoever listens (CLI, UI, log file) and
//! keeps its own append-only `RunLog`. Neither is ever read back to make a
//! control decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::orchestrator::CreationState;
use crate::structured_logging::StructuredLogger;

/// Correlation ID for tracking one run across components
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Create a new correlation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

/// One timestamped, human-readable line of a run log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub state: CreationState,
    pub message: String,
}

impl std::fmt::Display for LogLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {:<5} {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.level.as_str(),
            self.message
        )
    }
}

/// What a presentation layer receives while a run progresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    StateChanged {
        from: CreationState,
        to: CreationState,
        at: DateTime<Utc>,
    },
    Log(LogLine),
}

/// Sender half handed to a run
pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;

/// Append-only log of one run
#[derive(Debug)]
pub struct RunLog {
    correlation_id: CorrelationId,
    state: CreationState,
    lines: Vec<LogLine>,
    events: Option<ProgressSender>,
    logger: StructuredLogger,
}

impl RunLog {
    pub fn new(events: Option<ProgressSender>) -> Self {
        let correlation_id = CorrelationId::new();
        Self {
            logger: StructuredLogger::new(correlation_id.to_string()),
            correlation_id,
            state: CreationState::Idle,
            lines: Vec::new(),
            events,
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn state(&self) -> CreationState {
        self.state
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    /// Record a state change. Transition rules are enforced by the caller.
    pub(crate) fn enter(&mut self, to: CreationState) {
        let from = self.state;
        self.state = to;
        self.logger.log_state_transition(from, to);
        self.emit(ProgressEvent::StateChanged {
            from,
            to,
            at: Utc::now(),
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Warn, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Error, message.into());
    }

    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<LogLine> {
        self.lines
    }

    fn push(&mut self, level: LogLevel, message: String) {
        let line = LogLine {
            timestamp: Utc::now(),
            level,
            state: self.state,
            message,
        };
        self.logger.log_line(&line);
        self.lines.push(line.clone());
        self.emit(ProgressEvent::Log(line));
    }

    fn emit(&mut self, event: ProgressEvent) {
        if let Some(tx) = &self.events {
            // Receiver gone: keep running, stop emitting
            if tx.send(event).is_err() {
                self.events = None;
            }
        }
    }
}
