//! Acknowledgment backchannel.
//!
//! The receiving device reports progress to the sender over a slow audio
//! link. [`AckDebouncer`] batches bursts of inbound frames into a single
//! report, [`BackchannelDriver`] formats and interprets reports, and
//! [`AckSendQueue`] pushes them through an [`AudioChannel`] one at a time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::audio::{AudioReassembler, MAX_AUDIO_MESSAGE, frame_audio_message};
use crate::config::BackchannelConfig;
use crate::error::ChannelError;
use crate::logging::{Direction, LogContext, LogEvent, TransferLogger};
use crate::receiver::RangeReceiver;
use crate::sender::RangeSender;
use crate::session::RangeSession;
use crate::timer::Timer;

/// Callback for text decoded off the audio channel.
pub type AudioCallback = Box<dyn Fn(String) + Send + Sync>;

/// Opaque audio modem. Modulation lives outside this crate.
pub trait AudioChannel: Send + Sync {
    /// Play `text` at `volume` (0 to 100). Resolves when playback ends.
    fn send(&self, text: &str, volume: u8) -> BoxFuture<'static, Result<(), ChannelError>>;

    fn start_listening(&self, callback: AudioCallback);

    fn stop_listening(&self);
}

/// Anything that accepts decoded backchannel messages.
pub trait AckSink {
    fn apply_ack(&mut self, message: &str);
}

impl AckSink for RangeSender {
    fn apply_ack(&mut self, message: &str) {
        self.process_backchannel(message);
    }
}

impl AckSink for RangeSession {
    fn apply_ack(&mut self, message: &str) {
        self.process_backchannel(message);
    }
}

/// Decides when the receiver should acknowledge.
///
/// The first frame after a report arms a one-shot timer; frames arriving
/// while it is armed are folded into the same report. A report is never
/// released sooner than `min_interval` after the previous one.
#[derive(Debug, Clone)]
pub struct AckDebouncer {
    debounce: Duration,
    min_interval: Duration,
    timer: Timer,
    last_sent: Option<Instant>,
}

impl AckDebouncer {
    pub fn new(debounce: Duration, min_interval: Duration) -> Self {
        Self {
            debounce,
            min_interval,
            timer: Timer::new(),
            last_sent: None,
        }
    }

    pub fn note_progress(&mut self, now: Instant) {
        if !self.timer.is_armed() {
            self.timer.arm_once(now, self.debounce);
        }
    }

    /// True when a report should go out now.
    pub fn poll(&mut self, now: Instant) -> bool {
        if !self.timer.fire_if_due(now) {
            return false;
        }
        if let Some(last) = self.last_sent {
            let earliest = last + self.min_interval;
            if now < earliest {
                self.timer.arm_once(now, earliest - now);
                return false;
            }
        }
        self.last_sent = Some(now);
        true
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    pub fn cancel(&mut self) {
        self.timer.cancel();
    }

    pub fn reset(&mut self) {
        self.timer.cancel();
        self.last_sent = None;
    }
}

/// Formats reports on the receiving device and interprets them on the
/// sending device.
pub struct BackchannelDriver {
    debouncer: AckDebouncer,
    reassembler: AudioReassembler,
    log: LogContext,
}

impl BackchannelDriver {
    pub fn new(config: &BackchannelConfig, logger: Arc<dyn TransferLogger>, session_id: Uuid) -> Self {
        Self {
            debouncer: AckDebouncer::new(config.debounce(), config.min_interval()),
            reassembler: AudioReassembler::new(),
            log: LogContext::new(logger, "backchannel", session_id),
        }
    }

    /// Receiver side: a frame was scanned.
    pub fn on_frame(&mut self, now: Instant) {
        self.debouncer.note_progress(now);
    }

    /// Receiver side: the report to send now, if one is due.
    pub fn poll(&mut self, now: Instant, receiver: &RangeReceiver) -> Option<String> {
        if !self.debouncer.poll(now) {
            return None;
        }
        let message = receiver.report()?.to_string();
        self.log.log(
            Direction::Outgoing,
            LogEvent::AckSent {
                message: message.clone(),
            },
        );
        Some(message)
    }

    /// Sender side: feed one audio burst. Returns true when it completed a
    /// message and the message was handed to `sink`.
    pub fn interpret(&mut self, burst: &str, sink: &mut impl AckSink) -> bool {
        match self.reassembler.push(burst) {
            Some(message) => {
                sink.apply_ack(&message);
                true
            }
            None => false,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.next_deadline()
    }

    pub fn reset(&mut self) {
        self.debouncer.reset();
        self.reassembler.clear();
    }
}

/// Serialised sender for backchannel messages.
///
/// A single task drains the queue: each message is framed into bursts,
/// every burst is awaited before the next starts, and the queue pauses
/// for the inter-message delay after each message, so transmissions never
/// overlap.
pub struct AckSendQueue {
    tx: Option<mpsc::UnboundedSender<String>>,
    task: Option<JoinHandle<()>>,
}

impl AckSendQueue {
    /// Spawn the drain task on the current tokio runtime.
    pub fn spawn(
        channel: Arc<dyn AudioChannel>,
        config: &BackchannelConfig,
        logger: Arc<dyn TransferLogger>,
        session_id: Uuid,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let volume = config.volume;
        let delay = config.inter_message_delay();
        let log = LogContext::new(logger, "backchannel", session_id);

        let task = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                for burst in frame_audio_message(&message, MAX_AUDIO_MESSAGE) {
                    match channel.send(&burst, volume).await {
                        Ok(()) => log.log(Direction::Outgoing, LogEvent::BurstSent { len: burst.len() }),
                        Err(e) => {
                            log.log(
                                Direction::Outgoing,
                                LogEvent::Error {
                                    message: format!("audio send failed: {}", e),
                                },
                            );
                            break;
                        }
                    }
                }
                tokio::time::sleep(delay).await;
            }
        });

        Self {
            tx: Some(tx),
            task: Some(task),
        }
    }

    pub fn enqueue(&self, message: impl Into<String>) -> Result<(), ChannelError> {
        let tx = self.tx.as_ref().ok_or(ChannelError::Closed)?;
        tx.send(message.into()).map_err(|_| ChannelError::Closed)
    }

    /// Stop accepting messages, then wait until the queued ones are sent.
    pub async fn shutdown(&mut self) {
        self.tx.take();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for AckSendQueue {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
