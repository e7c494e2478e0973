//! Diagnostic logging for transfer sessions.
//!
//! Every session holds an `Arc<dyn TransferLogger>` and reports parse
//! failures, acknowledgments and lifecycle changes through it. Wire errors
//! never leave a session any other way.

use std::fmt;
use std::sync::Mutex;

use uuid::Uuid;

/// Which way the logged traffic was flowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
    System,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Incoming => "incoming",
            Self::Outgoing => "outgoing",
            Self::System => "system",
        })
    }
}

/// Structured log entry for a session operation.
#[derive(Debug, Clone)]
pub struct TransferLog {
    pub component: &'static str,
    pub session_id: Uuid,
    pub direction: Direction,
    pub event: LogEvent,
}

/// Events that can be logged.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    /// Session switched between send and receive
    ModeSwitched { mode: &'static str },
    /// Sender: message accepted and chunked
    DataSet {
        chars: usize,
        chunk_size: usize,
        chunks: usize,
    },
    /// Receiver: frame could not be parsed or applied
    FrameRejected { reason: String },
    /// Receiver: character range stored
    RangeReceived { start: usize, end: usize, total: usize },
    /// Receiver: indexed chunk stored
    ChunkReceived {
        index: usize,
        total: usize,
        received: usize,
    },
    /// Peer announced it is finished
    DoneSignal,
    /// Receiver: every piece is in
    TransferComplete { chars: usize },
    /// Receiver: acknowledgment produced for the backchannel
    AckSent { message: String },
    /// Sender: acknowledgment applied to the exclusion set
    AckApplied {
        summary: String,
        excluded_chunks: usize,
        total_chunks: usize,
    },
    /// Sender: acknowledgment dropped
    AckIgnored { reason: String },
    /// Sender: every chunk acknowledged
    AllAcknowledged { chunks: usize },
    /// Backchannel: message handed to the audio channel
    BurstSent { len: usize },
    /// Session state cleared
    Reset,
    /// Error occurred
    Error { message: String },
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModeSwitched { mode } => write!(f, "mode_switched mode={}", mode),
            Self::DataSet { chars, chunk_size, chunks } => {
                write!(f, "data_set chars={} chunk_size={} chunks={}", chars, chunk_size, chunks)
            }
            Self::FrameRejected { reason } => write!(f, "frame_rejected reason={}", reason),
            Self::RangeReceived { start, end, total } => {
                write!(f, "range_received range={}-{} total={}", start, end, total)
            }
            Self::ChunkReceived { index, total, received } => {
                write!(f, "chunk_received idx={} total={} received={}", index, total, received)
            }
            Self::DoneSignal => f.write_str("done_signal"),
            Self::TransferComplete { chars } => write!(f, "transfer_complete chars={}", chars),
            Self::AckSent { message } => write!(f, "ack_sent msg={}", message),
            Self::AckApplied { summary, excluded_chunks, total_chunks } => {
                write!(
                    f,
                    "ack_applied acked={} excluded={}/{}",
                    summary, excluded_chunks, total_chunks
                )
            }
            Self::AckIgnored { reason } => write!(f, "ack_ignored reason={}", reason),
            Self::AllAcknowledged { chunks } => write!(f, "all_acknowledged chunks={}", chunks),
            Self::BurstSent { len } => write!(f, "burst_sent len={}", len),
            Self::Reset => f.write_str("reset"),
            Self::Error { message } => write!(f, "error: {}", message),
        }
    }
}

/// Trait for transfer logging. Implementations can write to tracing, keep
/// entries for a UI message log, or discard them.
pub trait TransferLogger: Send + Sync {
    fn log(&self, entry: TransferLog);
}

/// Logger that uses the `tracing` crate.
pub struct TracingLogger;

impl TransferLogger for TracingLogger {
    fn log(&self, entry: TransferLog) {
        let sid = entry.session_id.hyphenated().to_string();
        match &entry.event {
            LogEvent::FrameRejected { .. } | LogEvent::AckIgnored { .. } | LogEvent::Error { .. } => {
                tracing::warn!(
                    component = entry.component,
                    session_id = %sid,
                    direction = %entry.direction,
                    "{}",
                    entry.event,
                );
            }
            LogEvent::ModeSwitched { .. }
            | LogEvent::DataSet { .. }
            | LogEvent::DoneSignal
            | LogEvent::TransferComplete { .. }
            | LogEvent::AllAcknowledged { .. }
            | LogEvent::Reset => {
                tracing::info!(
                    component = entry.component,
                    session_id = %sid,
                    direction = %entry.direction,
                    "{}",
                    entry.event,
                );
            }
            // per-frame noise
            _ => {
                tracing::debug!(
                    component = entry.component,
                    session_id = %sid,
                    direction = %entry.direction,
                    "{}",
                    entry.event,
                );
            }
        }
    }
}

/// No-op logger that discards all log entries.
pub struct NullLogger;

impl TransferLogger for NullLogger {
    fn log(&self, _entry: TransferLog) {}
}

/// Keeps every entry in memory, for message-log panels and tests.
#[derive(Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<TransferLog>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<TransferLog> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Entries whose event satisfies `pred`.
    pub fn count(&self, pred: impl Fn(&LogEvent) -> bool) -> usize {
        self.entries().iter().filter(|e| pred(&e.event)).count()
    }
}

impl TransferLogger for MemoryLogger {
    fn log(&self, entry: TransferLog) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

/// Ties a logger to one component of one session.
#[derive(Clone)]
pub(crate) struct LogContext {
    pub(crate) logger: std::sync::Arc<dyn TransferLogger>,
    pub(crate) component: &'static str,
    pub(crate) session_id: Uuid,
}

impl LogContext {
    pub(crate) fn new(
        logger: std::sync::Arc<dyn TransferLogger>,
        component: &'static str,
        session_id: Uuid,
    ) -> Self {
        Self {
            logger,
            component,
            session_id,
        }
    }

    pub(crate) fn log(&self, direction: Direction, event: LogEvent) {
        self.logger.log(TransferLog {
            component: self.component,
            session_id: self.session_id,
            direction,
            event,
        });
    }
}
