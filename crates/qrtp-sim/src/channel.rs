//! Simulated lossy links between the two devices.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use qrtp_transfer::audio::MAX_AUDIO_MESSAGE;
use qrtp_transfer::{AudioCallback, AudioChannel, ChannelError};

/// Camera pointed at a screen: each shown frame is scanned or missed.
pub struct FrameLink {
    rng: StdRng,
    loss: f64,
    pub shown: u64,
    pub delivered: u64,
}

impl FrameLink {
    pub fn new(loss: f64, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            loss,
            shown: 0,
            delivered: 0,
        }
    }

    /// Returns the frame if the scanner caught it.
    pub fn transmit<'a>(&mut self, frame: &'a str) -> Option<&'a str> {
        self.shown += 1;
        if self.rng.random_bool(self.loss) {
            debug!(frame = %truncate(frame), "frame lost");
            return None;
        }
        self.delivered += 1;
        Some(frame)
    }
}

/// Speaker and microphone. Bursts take time to play and may be lost.
pub struct LossyAudio {
    rng: Mutex<StdRng>,
    loss: f64,
    per_char: Duration,
    listener: Arc<Mutex<Option<AudioCallback>>>,
}

impl LossyAudio {
    pub fn new(loss: f64, seed: u64, per_char: Duration) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            loss,
            per_char,
            listener: Arc::new(Mutex::new(None)),
        }
    }

    fn lost(&self) -> bool {
        match self.rng.lock() {
            Ok(mut rng) => rng.random_bool(self.loss),
            Err(poisoned) => poisoned.into_inner().random_bool(self.loss),
        }
    }
}

impl AudioChannel for LossyAudio {
    fn send(&self, text: &str, volume: u8) -> BoxFuture<'static, Result<(), ChannelError>> {
        let len = text.chars().count();
        if len > MAX_AUDIO_MESSAGE {
            return Box::pin(async move {
                Err(ChannelError::TooLong {
                    len,
                    max: MAX_AUDIO_MESSAGE,
                })
            });
        }

        let lost = self.lost();
        let play_time = self.per_char * len as u32;
        let listener = self.listener.clone();
        let text = text.to_string();
        Box::pin(async move {
            tokio::time::sleep(play_time).await;
            if lost {
                debug!(burst = %text, volume, "audio burst lost");
                return Ok(());
            }
            let guard = listener
                .lock()
                .map_err(|_| ChannelError::Send("listener lock poisoned".into()))?;
            if let Some(callback) = guard.as_ref() {
                callback(text);
            }
            Ok(())
        })
    }

    fn start_listening(&self, callback: AudioCallback) {
        if let Ok(mut slot) = self.listener.lock() {
            *slot = Some(callback);
        }
    }

    fn stop_listening(&self) {
        if let Ok(mut slot) = self.listener.lock() {
            slot.take();
        }
    }
}

fn truncate(frame: &str) -> String {
    let mut out: String = frame.chars().take(32).collect();
    if frame.chars().count() > 32 {
        out.push_str("...");
    }
    out
}
