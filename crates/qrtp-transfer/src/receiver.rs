//! Range-variant receiver.
//!
//! Reassembles character ranges into a space-filled buffer and reports the
//! covered ranges back over the backchannel.

use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::config::RangeSessionConfig;
use crate::error::{FrameError, SessionError};
use crate::logging::{Direction, LogContext, LogEvent, TransferLogger};
use crate::protocol::{AckMessage, RangeFrame, validate_prefix};
use crate::ranges::RangeSet;

const FILLER: char = ' ';

/// What an inbound frame did to the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Unparseable or inconsistent; logged and dropped.
    Rejected,
    Idle,
    /// The sender is showing its completion token.
    SenderDone,
    Data {
        start: usize,
        end: usize,
        payload: String,
        /// True only for the frame that completed the transfer.
        completed: bool,
    },
}

pub struct RangeReceiver {
    prefix: String,
    ranges: RangeSet,
    max_seen: usize,
    buffer: Vec<char>,
    complete: bool,
    sender_finished: bool,
    max_message_len: usize,
    report_interval: Duration,
    last_report: Option<Instant>,
    log: LogContext,
}

impl RangeReceiver {
    pub fn new(
        config: &RangeSessionConfig,
        logger: Arc<dyn TransferLogger>,
        session_id: Uuid,
    ) -> Result<Self, SessionError> {
        validate_prefix(&config.prefix)?;
        Ok(Self {
            prefix: config.prefix.clone(),
            ranges: RangeSet::new(),
            max_seen: 0,
            buffer: Vec::new(),
            complete: false,
            sender_finished: false,
            max_message_len: config.max_message_len,
            report_interval: config.backchannel_interval(),
            last_report: None,
            log: LogContext::new(logger, "receiver", session_id),
        })
    }

    /// Ingest one scanned frame. Never fails: bad frames are logged and
    /// leave the state untouched.
    pub fn process_frame(&mut self, code: &str) -> Inbound {
        let frame = match self.decode(code) {
            Ok(frame) => frame,
            Err(e) => {
                self.log.log(
                    Direction::Incoming,
                    LogEvent::FrameRejected {
                        reason: e.to_string(),
                    },
                );
                return Inbound::Rejected;
            }
        };

        match frame {
            RangeFrame::Idle => Inbound::Idle,
            RangeFrame::Done => {
                if !self.sender_finished {
                    self.log.log(Direction::Incoming, LogEvent::DoneSignal);
                }
                self.sender_finished = true;
                Inbound::SenderDone
            }
            RangeFrame::Data {
                start,
                end,
                total,
                payload,
            } => {
                let completed = self.store(start, end, total, &payload);
                Inbound::Data {
                    start,
                    end,
                    payload,
                    completed,
                }
            }
        }
    }

    /// Decode and bound-check. The buffer is sized from `end`, which the
    /// codec keeps below `total`, so capping `total` caps the allocation.
    fn decode(&self, code: &str) -> Result<RangeFrame, FrameError> {
        let frame = RangeFrame::decode(&self.prefix, code)?;
        if let RangeFrame::Data { total, .. } = &frame {
            if *total > self.max_message_len {
                return Err(FrameError::TooLarge {
                    declared: *total,
                    limit: self.max_message_len,
                });
            }
        }
        Ok(frame)
    }

    fn store(&mut self, start: usize, end: usize, total: usize, payload: &str) -> bool {
        self.max_seen = self.max_seen.max(total - 1);
        self.ranges.add(start, end);

        if self.buffer.len() <= end {
            self.buffer.resize(end + 1, FILLER);
        }
        for (slot, c) in self.buffer[start..=end].iter_mut().zip(payload.chars()) {
            *slot = c;
        }

        self.log.log(
            Direction::Incoming,
            LogEvent::RangeReceived { start, end, total },
        );

        if !self.complete && self.ranges.is_contiguous_through(self.max_seen) {
            self.complete = true;
            self.log.log(
                Direction::System,
                LogEvent::TransferComplete {
                    chars: self.max_seen + 1,
                },
            );
            return true;
        }
        false
    }

    /// Current acknowledgment, without rate limiting. `None` until
    /// something has been received.
    pub fn report(&self) -> Option<AckMessage> {
        if self.complete {
            return Some(AckMessage::Done);
        }
        if self.ranges.is_empty() {
            return None;
        }
        Some(AckMessage::Ranges(self.ranges.clone()))
    }

    /// Rate-limited backchannel message. Returns `None` when the last report
    /// was less than the configured interval ago, or when there is nothing
    /// to report yet. An empty report does not use up the interval.
    pub fn backchannel_message(&mut self, now: Instant) -> Option<String> {
        if let Some(last) = self.last_report {
            if now.saturating_duration_since(last) < self.report_interval {
                return None;
            }
        }
        let message = self.report()?.to_string();
        self.last_report = Some(now);
        self.log.log(
            Direction::Outgoing,
            LogEvent::AckSent {
                message: message.clone(),
            },
        );
        Some(message)
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Best-known reconstruction; gaps hold spaces.
    pub fn received_text(&self) -> String {
        self.buffer.iter().collect()
    }

    pub fn received_ranges(&self) -> &RangeSet {
        &self.ranges
    }

    /// Highest character offset the sender has declared so far.
    pub fn max_seen_index(&self) -> usize {
        self.max_seen
    }

    pub fn sender_finished(&self) -> bool {
        self.sender_finished
    }

    pub fn has_data(&self) -> bool {
        !self.ranges.is_empty()
    }

    pub fn reset(&mut self) {
        self.ranges.clear();
        self.max_seen = 0;
        self.buffer.clear();
        self.complete = false;
        self.sender_finished = false;
        self.last_report = None;
    }
}
