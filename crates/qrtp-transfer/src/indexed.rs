//! Indexed-variant session.
//!
//! Both devices run the same session and point their cameras at each
//! other. Each one shows its own outbound chunks and acknowledges what it
//! scanned from the peer, so one session holds an outbound half (chunks,
//! acknowledged set) and an inbound half (received chunks) at once.
//!
//! The outbound half finishes on its own once every chunk is acknowledged:
//! the cycle timer stops and `AllAcknowledged` fires.

use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::bitfield::ChunkBitfield;
use crate::chunker::{Chunk, chunk};
use crate::config::IndexedConfig;
use crate::error::{FrameError, SessionError};
use crate::events::{
    EventBus, IndexedSnapshot, Listener, ListenerId, Piece, SessionEvent, SessionSnapshot,
};
use crate::logging::{Direction, LogContext, LogEvent, TransferLogger};
use crate::protocol::{IndexedCodec, IndexedFrame};
use crate::timer::Timer;

#[derive(Default)]
struct OutboundHalf {
    chunks: Vec<Chunk>,
    char_len: usize,
    acked: ChunkBitfield,
    cursor: usize,
    done: bool,
}

#[derive(Default)]
struct InboundHalf {
    total: usize,
    received: ChunkBitfield,
    payloads: Vec<Option<String>>,
    complete: bool,
    peer_done: bool,
    /// Something arrived since the last acknowledgment was shown.
    ack_pending: bool,
}

impl InboundHalf {
    fn assembled(&self) -> String {
        self.payloads.iter().flatten().map(String::as_str).collect()
    }
}

pub struct IndexedSession {
    id: Uuid,
    config: IndexedConfig,
    codec: IndexedCodec,
    outbound: OutboundHalf,
    inbound: InboundHalf,
    cycle: Timer,
    events: EventBus,
    log: LogContext,
    disposed: bool,
}

impl IndexedSession {
    pub fn new(config: IndexedConfig, logger: Arc<dyn TransferLogger>) -> Result<Self, SessionError> {
        if config.chunk_size == 0 {
            return Err(SessionError::InvalidChunkSize);
        }
        let codec = IndexedCodec::new(&config.prefix)?;
        let id = Uuid::new_v4();
        Ok(Self {
            id,
            config,
            codec,
            outbound: OutboundHalf::default(),
            inbound: InboundHalf::default(),
            cycle: Timer::new(),
            events: EventBus::new(),
            log: LogContext::new(logger, "session", id),
            disposed: false,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Start sending `message`, replacing any outbound transfer. Inbound
    /// state is kept. Returns the chunk count.
    pub fn set_message(
        &mut self,
        message: &str,
        chunk_size: Option<usize>,
        now: Instant,
    ) -> Result<usize, SessionError> {
        let chunk_size = chunk_size.unwrap_or(self.config.chunk_size);
        if message.trim().is_empty() {
            self.outbound = OutboundHalf::default();
            self.cycle.cancel();
            return Err(SessionError::EmptyMessage);
        }
        let chunks = chunk(message, chunk_size)?;
        let total = chunks.len();

        self.outbound = OutboundHalf {
            chunks,
            char_len: message.chars().count(),
            acked: ChunkBitfield::new(total),
            cursor: 0,
            done: false,
        };
        self.cycle.arm_periodic(now, self.config.cycle_interval());

        self.log.log(
            Direction::Outgoing,
            LogEvent::DataSet {
                chars: self.outbound.char_len,
                chunk_size,
                chunks: total,
            },
        );
        self.events.emit(&SessionEvent::Init {
            total_chunks: total,
            total_len: self.outbound.char_len,
        });
        self.notify_change();
        Ok(total)
    }

    /// Code to display now, in priority order: a fresh acknowledgment, the
    /// next unacknowledged outbound chunk, a repeat of the acknowledgment,
    /// the completion token, the idle token.
    pub fn current_code(&mut self) -> String {
        if self.inbound.ack_pending {
            self.inbound.ack_pending = false;
            return self.ack_code();
        }
        if !self.outbound.chunks.is_empty() && !self.outbound.done {
            let frame = self.next_data_frame();
            return self.encode(&frame);
        }
        if self.inbound.total > 0 {
            return self.ack_code();
        }
        if self.outbound.done {
            return self.encode(&IndexedFrame::Done);
        }
        self.encode(&IndexedFrame::Idle)
    }

    fn next_data_frame(&mut self) -> IndexedFrame {
        let out = &mut self.outbound;
        let n = out.chunks.len();
        let start = out.cursor % n;
        let pick = (0..n)
            .map(|step| (start + step) % n)
            .find(|&i| !out.acked.get(i))
            .unwrap_or(start);
        out.cursor = (pick + 1) % n;
        IndexedFrame::Data {
            index: pick,
            total: n,
            payload: out.chunks[pick].payload.clone(),
        }
    }

    fn ack_code(&self) -> String {
        self.encode(&IndexedFrame::Ack(self.inbound.received.received_indices()))
    }

    fn encode(&self, frame: &IndexedFrame) -> String {
        match self.codec.encode(frame) {
            Ok(code) => code,
            Err(e) => {
                self.log.log(
                    Direction::Outgoing,
                    LogEvent::Error {
                        message: e.to_string(),
                    },
                );
                format!("{}:idle", self.config.prefix)
            }
        }
    }

    /// Scanner entry point. Anything unparseable is logged and dropped.
    pub fn parse_code(&mut self, code: &str) {
        let frame = match self.codec.decode(code) {
            Ok(frame) => frame,
            Err(e) => {
                self.reject(e);
                return;
            }
        };

        match frame {
            IndexedFrame::Idle => {}
            IndexedFrame::Done => {
                if !self.inbound.peer_done {
                    self.inbound.peer_done = true;
                    self.log.log(Direction::Incoming, LogEvent::DoneSignal);
                    self.notify_change();
                }
            }
            IndexedFrame::Ack(indices) => self.apply_ack(&indices),
            IndexedFrame::Data {
                index,
                total,
                payload,
            } => self.receive_chunk(index, total, payload),
        }
    }

    fn reject(&self, e: FrameError) {
        self.log.log(
            Direction::Incoming,
            LogEvent::FrameRejected {
                reason: e.to_string(),
            },
        );
    }

    fn receive_chunk(&mut self, index: usize, total: usize, payload: String) {
        // the first frame sizes the inbound buffers
        if total > self.config.max_chunks {
            self.reject(FrameError::TooLarge {
                declared: total,
                limit: self.config.max_chunks,
            });
            return;
        }
        let inb = &mut self.inbound;
        if inb.total == 0 {
            inb.total = total;
            inb.received.reset(total);
            inb.payloads = vec![None; total];
        } else if inb.total != total {
            let e = FrameError::TotalMismatch {
                expected: inb.total,
                got: total,
            };
            self.reject(e);
            return;
        }

        // duplicates still earn a fresh acknowledgment
        inb.ack_pending = true;
        if !inb.received.set(index) {
            return;
        }
        inb.payloads[index] = Some(payload.clone());
        let received = inb.received.received();

        self.log.log(
            Direction::Incoming,
            LogEvent::ChunkReceived {
                index,
                total,
                received,
            },
        );
        self.events.emit(&SessionEvent::Chunk {
            piece: Piece::Index(index),
            payload,
            received,
        });

        if !self.inbound.complete && self.inbound.received.is_complete() {
            self.inbound.complete = true;
            let message = self.inbound.assembled();
            self.log.log(
                Direction::System,
                LogEvent::TransferComplete {
                    chars: message.chars().count(),
                },
            );
            let pieces = (0..total).map(Piece::Index).collect();
            self.events.emit(&SessionEvent::Complete { message, pieces });
        }
        self.notify_change();
    }

    fn apply_ack(&mut self, indices: &[usize]) {
        let total = self.outbound.chunks.len();
        if total == 0 {
            self.log.log(
                Direction::Incoming,
                LogEvent::AckIgnored {
                    reason: "no outbound transfer".into(),
                },
            );
            return;
        }

        let (valid, stray): (Vec<usize>, Vec<usize>) = indices.iter().copied().partition(|&i| i < total);
        if !stray.is_empty() {
            self.log.log(
                Direction::Incoming,
                LogEvent::AckIgnored {
                    reason: format!("indices {:?} outside {} chunks", stray, total),
                },
            );
        }

        let newly: Vec<usize> = valid
            .into_iter()
            .filter(|&i| self.outbound.acked.set(i))
            .collect();
        if newly.is_empty() {
            return;
        }

        let acked = self.outbound.acked.received();
        self.log.log(
            Direction::Incoming,
            LogEvent::AckApplied {
                summary: join_indices(&newly),
                excluded_chunks: acked,
                total_chunks: total,
            },
        );
        self.events.emit(&SessionEvent::Acknowledged {
            pieces: newly.into_iter().map(Piece::Index).collect(),
        });

        if !self.outbound.done && self.outbound.acked.is_complete() {
            self.outbound.done = true;
            self.cycle.cancel();
            self.log.log(Direction::System, LogEvent::AllAcknowledged { chunks: total });
            self.events.emit(&SessionEvent::AllAcknowledged {
                total_chunks: total,
            });
        }
        self.notify_change();
    }

    /// Advance timers. Returns the code to display when the cycle fired.
    pub fn tick(&mut self, now: Instant) -> Option<String> {
        if !self.cycle.fire_if_due(now) {
            return None;
        }
        let code = self.current_code();
        self.notify_change();
        Some(code)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.cycle.deadline()
    }

    /// Every outbound chunk acknowledged.
    pub fn is_outbound_done(&self) -> bool {
        self.outbound.done
    }

    pub fn is_inbound_complete(&self) -> bool {
        self.inbound.complete
    }

    /// The peer is showing its completion token.
    pub fn peer_done(&self) -> bool {
        self.inbound.peer_done
    }

    /// Assembled inbound message, once complete.
    pub fn received_message(&self) -> Option<String> {
        self.inbound.complete.then(|| self.inbound.assembled())
    }

    pub fn snapshot(&self) -> IndexedSnapshot {
        IndexedSnapshot {
            outbound_chunks: self.outbound.chunks.len(),
            acknowledged: self.outbound.acked.received_indices(),
            outbound_done: self.outbound.done,
            inbound_total: self.inbound.total,
            received: self.inbound.received.received_indices(),
            inbound_complete: self.inbound.complete,
            received_message: self.received_message(),
        }
    }

    pub fn subscribe(&mut self, listener: Listener) -> ListenerId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Drop both halves and stop the cycle. Subscribers stay.
    pub fn reset(&mut self) {
        self.outbound = OutboundHalf::default();
        self.inbound = InboundHalf::default();
        self.cycle.cancel();
        self.log.log(Direction::System, LogEvent::Reset);
        self.events.emit(&SessionEvent::Reset);
        self.notify_change();
    }

    /// Reset and drop all subscribers. Further calls are no-ops.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.reset();
        self.events.clear();
        self.disposed = true;
    }

    fn notify_change(&mut self) {
        if self.events.is_empty() {
            return;
        }
        let snapshot = SessionSnapshot::Indexed(self.snapshot());
        self.events.emit(&SessionEvent::Changed(snapshot));
    }
}

fn join_indices(indices: &[usize]) -> String {
    indices
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
