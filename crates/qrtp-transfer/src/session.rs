//! Range-variant session: one device that is either showing or scanning.
//!
//! Wraps a [`RangeSender`] and a [`RangeReceiver`], switches between them,
//! owns the display cycle timer and publishes [`SessionEvent`]s.

use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::config::{CompletionPolicy, RangeSessionConfig};
use crate::error::SessionError;
use crate::events::{
    EventBus, Listener, ListenerId, Mode, Piece, RangeSnapshot, SessionEvent, SessionSnapshot,
};
use crate::logging::{Direction, LogContext, LogEvent, TransferLogger};
use crate::protocol::RangeFrame;
use crate::ranges::Range;
use crate::receiver::{Inbound, RangeReceiver};
use crate::sender::{AckOutcome, RangeSender};
use crate::timer::Timer;

pub struct RangeSession {
    id: Uuid,
    config: RangeSessionConfig,
    mode: Mode,
    chunk_size: usize,
    sender: RangeSender,
    receiver: RangeReceiver,
    cycle: Timer,
    events: EventBus,
    log: LogContext,
    disposed: bool,
}

impl RangeSession {
    /// New session in send mode.
    pub fn new(
        config: RangeSessionConfig,
        logger: Arc<dyn TransferLogger>,
    ) -> Result<Self, SessionError> {
        if config.chunk_size == 0 {
            return Err(SessionError::InvalidChunkSize);
        }
        let id = Uuid::new_v4();
        Ok(Self {
            id,
            sender: RangeSender::new(&config, logger.clone(), id)?,
            receiver: RangeReceiver::new(&config, logger.clone(), id)?,
            chunk_size: config.chunk_size,
            config,
            mode: Mode::Send,
            cycle: Timer::new(),
            events: EventBus::new(),
            log: LogContext::new(logger, "session", id),
            disposed: false,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switching mode discards all transfer state. Setting the current mode
    /// again does nothing.
    pub fn set_mode(&mut self, mode: Mode) {
        if self.mode == mode {
            return;
        }
        self.reset();
        self.mode = mode;
        self.log.log(
            Direction::System,
            LogEvent::ModeSwitched {
                mode: mode.as_str(),
            },
        );
        self.notify_change();
    }

    /// Start sending `message`. `chunk_size` overrides the configured size
    /// for this and later transfers. Starts the display cycle.
    pub fn set_data(
        &mut self,
        message: &str,
        chunk_size: Option<usize>,
        now: Instant,
    ) -> Result<usize, SessionError> {
        if self.mode != Mode::Send {
            self.log.log(
                Direction::System,
                LogEvent::Error {
                    message: "cannot set data in receive mode".into(),
                },
            );
            return Err(SessionError::WrongMode { expected: "send" });
        }

        let chunk_size = chunk_size.unwrap_or(self.chunk_size);
        if chunk_size == 0 {
            return Err(SessionError::InvalidChunkSize);
        }
        let chunks = match self.sender.set_data(message, chunk_size) {
            Ok(n) => n,
            Err(e) => {
                if e == SessionError::EmptyMessage {
                    self.reset();
                }
                return Err(e);
            }
        };
        self.chunk_size = chunk_size;

        self.cycle.arm_periodic(now, self.config.cycle_interval());
        self.events.emit(&SessionEvent::Init {
            total_chunks: chunks,
            total_len: self.sender.total_len(),
        });
        self.notify_change();
        Ok(chunks)
    }

    /// Frame the display should show now. In send mode each call advances
    /// the cycle; in receive mode this is always the idle token.
    pub fn current_frame(&mut self) -> String {
        match self.mode {
            Mode::Send => self.sender.current_code(),
            Mode::Receive => RangeFrame::Idle.encode(&self.config.prefix),
        }
    }

    /// Scanner entry point.
    pub fn process_received(&mut self, code: &str) {
        if self.mode != Mode::Receive {
            self.log.log(
                Direction::Incoming,
                LogEvent::FrameRejected {
                    reason: "not in receive mode".into(),
                },
            );
            return;
        }

        match self.receiver.process_frame(code) {
            Inbound::Rejected | Inbound::Idle => {}
            Inbound::SenderDone => self.notify_change(),
            Inbound::Data {
                start,
                end,
                payload,
                completed,
            } => {
                self.events.emit(&SessionEvent::Chunk {
                    piece: Piece::Range(Range::new(start, end)),
                    payload,
                    received: self.receiver.received_ranges().covered(),
                });
                if completed {
                    let pieces = self
                        .receiver
                        .received_ranges()
                        .iter()
                        .map(|r| Piece::Range(*r))
                        .collect();
                    self.events.emit(&SessionEvent::Complete {
                        message: self.receiver.received_text(),
                        pieces,
                    });
                }
                self.notify_change();
            }
        }
    }

    /// Backchannel entry point on the sending device.
    pub fn process_backchannel(&mut self, message: &str) {
        if self.mode != Mode::Send {
            self.log.log(
                Direction::Incoming,
                LogEvent::AckIgnored {
                    reason: "not in send mode".into(),
                },
            );
            return;
        }

        match self.sender.process_backchannel(message) {
            AckOutcome::Ignored => {}
            AckOutcome::Done => self.notify_change(),
            AckOutcome::Applied { all_acknowledged } => {
                let pieces = self
                    .sender
                    .exclusion()
                    .iter()
                    .map(|r| Piece::Range(*r))
                    .collect();
                self.events.emit(&SessionEvent::Acknowledged { pieces });
                if all_acknowledged {
                    self.events.emit(&SessionEvent::AllAcknowledged {
                        total_chunks: self.sender.chunks().len(),
                    });
                    if self.config.completion == CompletionPolicy::StopOnFullAck {
                        self.cycle.cancel();
                    }
                }
                self.notify_change();
            }
        }
    }

    /// Rate-limited acknowledgment for the backchannel, receive mode only.
    pub fn backchannel_message(&mut self, now: Instant) -> Option<String> {
        match self.mode {
            Mode::Receive => self.receiver.backchannel_message(now),
            Mode::Send => None,
        }
    }

    /// Advance timers. Returns the next frame to display when the cycle
    /// timer fired.
    pub fn tick(&mut self, now: Instant) -> Option<String> {
        if !self.cycle.fire_if_due(now) {
            return None;
        }
        let frame = self.current_frame();
        self.notify_change();
        Some(frame)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.cycle.deadline()
    }

    pub fn snapshot(&self) -> RangeSnapshot {
        let total_length = self.sender.total_len();
        let excluded_ranges = if self.sender.is_done() && total_length > 0 {
            vec![Range::new(0, total_length - 1)]
        } else {
            self.sender.exclusion().as_slice().to_vec()
        };
        RangeSnapshot {
            mode: self.mode,
            received_ranges: self.receiver.received_ranges().as_slice().to_vec(),
            max_seen_index: self.receiver.max_seen_index(),
            is_complete: self.receiver.is_complete(),
            received_text: self.receiver.received_text(),
            excluded_ranges,
            total_length,
            sender_done: self.sender.is_done(),
        }
    }

    pub fn subscribe(&mut self, listener: Listener) -> ListenerId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn sender(&self) -> &RangeSender {
        &self.sender
    }

    pub fn receiver(&self) -> &RangeReceiver {
        &self.receiver
    }

    /// Back to the state right after construction, keeping the mode and the
    /// subscribers. Safe to call at any time.
    pub fn reset(&mut self) {
        self.sender.reset();
        self.receiver.reset();
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
        let snapshot = SessionSnapshot::Range(self.snapshot());
        self.events.emit(&SessionEvent::Changed(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NullLogger;
    use crate::timer::{Clock, ManualClock};
    use std::sync::Mutex;
    use std::time::Duration;

    fn session() -> RangeSession {
        RangeSession::new(RangeSessionConfig::default(), Arc::new(NullLogger)).unwrap()
    }

    fn record(session: &mut RangeSession) -> Arc<Mutex<Vec<SessionEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        session.subscribe(Box::new(move |e| sink.lock().unwrap().push(e.clone())));
        events
    }

    #[test]
    fn test_set_data_requires_send_mode() {
        let mut s = session();
        s.set_mode(Mode::Receive);
        assert_eq!(
            s.set_data("hi", None, Instant::now()),
            Err(SessionError::WrongMode { expected: "send" })
        );
    }

    #[test]
    fn test_cycle_timer_drives_frames() {
        let clock = ManualClock::new();
        let mut s = session();
        s.set_data("Hello, world!", Some(5), clock.now()).unwrap();

        assert_eq!(s.tick(clock.now()), None);
        clock.advance(Duration::from_millis(250));
        assert_eq!(s.tick(clock.now()).as_deref(), Some("QRTPB:0-4/13:Hello"));
        clock.advance(Duration::from_millis(250));
        assert_eq!(s.tick(clock.now()).as_deref(), Some("QRTPB:5-9/13:, wor"));
        assert_eq!(s.next_deadline(), Some(clock.now() + Duration::from_millis(250)));
    }

    #[test]
    fn test_mode_switch_resets() {
        let mut s = session();
        s.set_data("abc", Some(1), Instant::now()).unwrap();
        s.set_mode(Mode::Receive);
        assert!(!s.sender().has_data());
        assert_eq!(s.next_deadline(), None);
        assert_eq!(s.current_frame(), "QRTPB:idle");

        s.process_received("QRTPB:0-0/1:x");
        assert!(s.snapshot().is_complete);
        s.set_mode(Mode::Receive);
        assert!(s.snapshot().is_complete, "same mode must not reset");
    }

    #[test]
    fn test_receive_events() {
        let mut s = session();
        s.set_mode(Mode::Receive);
        let events = record(&mut s);

        s.process_received("QRTPB:0-4/13:Hello");
        s.process_received("BADPREFIX:0-4/13:Hello");
        s.process_received("QRTPB:5-9/13:, wor");
        s.process_received("QRTPB:10-12/13:ld!");
        s.process_received("QRTPB:10-12/13:ld!");

        let events = events.lock().unwrap();
        let chunks = events.iter().filter(|e| matches!(e, SessionEvent::Chunk { .. })).count();
        assert_eq!(chunks, 4);
        let completes: Vec<&String> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Complete { message, .. } => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(completes, vec!["Hello, world!"]);
    }

    #[test]
    fn test_snapshot_reports_full_exclusion_when_done() {
        let mut s = session();
        s.set_data("Hello, world!", Some(5), Instant::now()).unwrap();
        s.process_backchannel("R:0-4");
        assert_eq!(s.snapshot().excluded_ranges, vec![Range::new(0, 4)]);
        s.process_backchannel("DONE");
        let snap = s.snapshot();
        assert_eq!(snap.excluded_ranges, vec![Range::new(0, 12)]);
        assert!(snap.sender_done);
        assert_eq!(s.current_frame(), "QRTPB:DONE");
    }

    #[test]
    fn test_all_acknowledged_fires_once() {
        let mut s = session();
        s.set_data("Hello, world!", Some(5), Instant::now()).unwrap();
        let events = record(&mut s);
        s.process_backchannel("R:0-12");
        s.process_backchannel("R:0-12");
        let n = events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, SessionEvent::AllAcknowledged { .. }))
            .count();
        assert_eq!(n, 1);
        // still cycling while waiting for DONE
        assert!(s.next_deadline().is_some());
    }

    #[test]
    fn test_stop_on_full_ack_cancels_cycle() {
        let config = RangeSessionConfig {
            completion: CompletionPolicy::StopOnFullAck,
            ..Default::default()
        };
        let mut s = RangeSession::new(config, Arc::new(NullLogger)).unwrap();
        s.set_data("Hello, world!", Some(5), Instant::now()).unwrap();
        s.process_backchannel("R:0-12");
        assert!(s.sender().is_done());
        assert_eq!(s.next_deadline(), None);
    }

    #[test]
    fn test_empty_message_resets() {
        let mut s = session();
        s.set_data("abc", None, Instant::now()).unwrap();
        assert_eq!(s.set_data("", None, Instant::now()), Err(SessionError::EmptyMessage));
        assert_eq!(s.current_frame(), "QRTPB:idle");
        assert_eq!(s.next_deadline(), None);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut s = session();
        let events = record(&mut s);
        s.set_data("abc", None, Instant::now()).unwrap();
        s.dispose();
        s.dispose();
        s.reset();
        assert_eq!(s.next_deadline(), None);

        let resets = events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, SessionEvent::Reset))
            .count();
        assert_eq!(resets, 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut s = session();
        s.set_mode(Mode::Receive);
        s.process_received("QRTPB:0-1/4:ab");
        let json = serde_json::to_value(SessionSnapshot::Range(s.snapshot())).unwrap();
        assert_eq!(json["variant"], "range");
        assert_eq!(json["mode"], "receive");
        assert_eq!(json["received_text"], "ab");
        assert_eq!(json["max_seen_index"], 3);
    }
}
