//! Range-variant sender.
//!
//! Owns the outbound chunk list and the exclusion set reported by the peer,
//! and picks the next frame to display on every request:
//!
//! ```text
//! idle --set_data--> cycling --DONE / full ack--> done
//!   ^                                               |
//!   +-------------------reset-----------------------+
//! ```

use std::sync::Arc;

use uuid::Uuid;

use crate::chunker::{Chunk, chunk};
use crate::config::{CompletionPolicy, RangeSessionConfig};
use crate::error::SessionError;
use crate::logging::{Direction, LogContext, LogEvent, TransferLogger};
use crate::protocol::{AckMessage, RangeFrame, validate_prefix};
use crate::ranges::RangeSet;

/// What a backchannel message did to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Malformed or unrecognised; logged and dropped.
    Ignored,
    /// Exclusion set replaced. `all_acknowledged` is true only on the
    /// message that first covers every chunk of the current transfer.
    Applied { all_acknowledged: bool },
    /// Explicit completion signal.
    Done,
}

pub struct RangeSender {
    prefix: String,
    policy: CompletionPolicy,
    total_len: usize,
    chunks: Vec<Chunk>,
    /// Ordinal of the chunk to try first on the next request.
    cursor: usize,
    exclusion: RangeSet,
    done: bool,
    all_acknowledged: bool,
    log: LogContext,
}

impl RangeSender {
    pub fn new(
        config: &RangeSessionConfig,
        logger: Arc<dyn TransferLogger>,
        session_id: Uuid,
    ) -> Result<Self, SessionError> {
        validate_prefix(&config.prefix)?;
        Ok(Self {
            prefix: config.prefix.clone(),
            policy: config.completion,
            total_len: 0,
            chunks: Vec::new(),
            cursor: 0,
            exclusion: RangeSet::new(),
            done: false,
            all_acknowledged: false,
            log: LogContext::new(logger, "sender", session_id),
        })
    }

    /// Chunk `message` and start a fresh transfer. Returns the chunk count.
    ///
    /// A blank message clears the sender and is rejected.
    pub fn set_data(&mut self, message: &str, chunk_size: usize) -> Result<usize, SessionError> {
        if message.trim().is_empty() {
            self.reset();
            return Err(SessionError::EmptyMessage);
        }
        let chunks = chunk(message, chunk_size)?;

        self.reset();
        self.total_len = message.chars().count();
        self.chunks = chunks;
        self.log.log(
            Direction::Outgoing,
            LogEvent::DataSet {
                chars: self.total_len,
                chunk_size,
                chunks: self.chunks.len(),
            },
        );
        Ok(self.chunks.len())
    }

    /// Frame to display now. Advances the cycle cursor on every data frame.
    pub fn current_frame(&mut self) -> RangeFrame {
        if self.chunks.is_empty() {
            return RangeFrame::Idle;
        }
        if self.done {
            return RangeFrame::Done;
        }

        let n = self.chunks.len();
        let start = self.cursor % n;
        let pick = (0..n)
            .map(|step| (start + step) % n)
            .find(|&i| !self.is_excluded(&self.chunks[i]))
            // everything acknowledged but no DONE yet: keep showing all of it
            .unwrap_or(start);

        self.cursor = (pick + 1) % n;
        let chunk = &self.chunks[pick];
        RangeFrame::Data {
            start: chunk.start,
            end: chunk.end,
            total: self.total_len,
            payload: chunk.payload.clone(),
        }
    }

    /// Encoded form of [`current_frame`](Self::current_frame).
    pub fn current_code(&mut self) -> String {
        self.current_frame().encode(&self.prefix)
    }

    /// Apply a backchannel message. Range reports replace the exclusion set
    /// wholesale.
    pub fn process_backchannel(&mut self, message: &str) -> AckOutcome {
        let ack = match AckMessage::decode(message) {
            Ok(ack) => ack,
            Err(e) => {
                self.log.log(
                    Direction::Incoming,
                    LogEvent::AckIgnored {
                        reason: format!("{}: {:?}", e, message),
                    },
                );
                return AckOutcome::Ignored;
            }
        };

        match ack {
            AckMessage::Done => {
                self.log.log(Direction::Incoming, LogEvent::DoneSignal);
                self.done = true;
                AckOutcome::Done
            }
            AckMessage::Ranges(ranges) => {
                self.exclusion = ranges;
                let excluded = self.excluded_chunk_count();
                self.log.log(
                    Direction::Incoming,
                    LogEvent::AckApplied {
                        summary: self.exclusion.to_string(),
                        excluded_chunks: excluded,
                        total_chunks: self.chunks.len(),
                    },
                );

                let first_full = !self.chunks.is_empty()
                    && excluded == self.chunks.len()
                    && !self.all_acknowledged;
                if first_full {
                    self.all_acknowledged = true;
                    self.log.log(
                        Direction::System,
                        LogEvent::AllAcknowledged {
                            chunks: self.chunks.len(),
                        },
                    );
                    if self.policy == CompletionPolicy::StopOnFullAck {
                        self.done = true;
                    }
                }
                AckOutcome::Applied {
                    all_acknowledged: first_full,
                }
            }
        }
    }

    fn is_excluded(&self, chunk: &Chunk) -> bool {
        self.exclusion.contains(chunk.start, chunk.end)
    }

    /// Chunks fully covered by the current exclusion set.
    pub fn excluded_chunk_count(&self) -> usize {
        self.chunks.iter().filter(|c| self.is_excluded(c)).count()
    }

    pub fn is_all_excluded(&self) -> bool {
        !self.chunks.is_empty() && self.excluded_chunk_count() == self.chunks.len()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn has_data(&self) -> bool {
        !self.chunks.is_empty()
    }

    pub fn exclusion(&self) -> &RangeSet {
        &self.exclusion
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Message length in characters.
    pub fn total_len(&self) -> usize {
        self.total_len
    }

    pub fn policy(&self) -> CompletionPolicy {
        self.policy
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn reset(&mut self) {
        self.total_len = 0;
        self.chunks.clear();
        self.cursor = 0;
        self.exclusion.clear();
        self.done = false;
        self.all_acknowledged = false;
    }
}
