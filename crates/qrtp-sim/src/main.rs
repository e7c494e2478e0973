mod channel;
mod config;

use std::sync::Arc;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tracing::{info, warn};

use qrtp_transfer::{
    AckSendQueue, AudioChannel, BackchannelConfig, BackchannelDriver, IndexedConfig,
    IndexedSession, Mode, RangeSession, RangeSessionConfig, SessionEvent, TracingLogger,
    TransferLogger, earliest,
};

use crate::channel::{FrameLink, LossyAudio};
use crate::config::{SimConfig, Variant};

/// Audio modem playback speed.
const AUDIO_MS_PER_CHAR: u64 = 8;

#[derive(Debug, Default)]
struct Stats {
    frames_shown: u64,
    frames_delivered: u64,
    acks_sent: u64,
    events: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qrtp_sim=info,qrtp_transfer=info".into()),
        )
        .init();

    let cfg = SimConfig::from_env()?;
    info!(
        "Simulating {:?} transfer: {} chars, frame loss {:.0}%, backchannel loss {:.0}%, seed {}",
        cfg.variant,
        cfg.message.chars().count(),
        cfg.frame_loss * 100.0,
        cfg.backchannel_loss * 100.0,
        cfg.seed
    );

    let logger: Arc<dyn TransferLogger> = Arc::new(TracingLogger);
    let started = Instant::now();
    let outcome = match cfg.variant {
        Variant::Range => run_range(&cfg, logger).await?,
        Variant::Indexed => run_indexed(&cfg, logger).await?,
    };

    let Some((received, stats, snapshot)) = outcome else {
        warn!("Timed out after {:?}", cfg.timeout);
        std::process::exit(2);
    };

    let sent_digest = hex::encode(Sha256::digest(cfg.message.as_bytes()));
    let received_digest = hex::encode(Sha256::digest(received.as_bytes()));
    info!(
        "Finished in {:.1}s: {} frames shown, {} scanned, {} acks sent, {} events",
        started.elapsed().as_secs_f64(),
        stats.frames_shown,
        stats.frames_delivered,
        stats.acks_sent,
        stats.events
    );
    info!("sha256 sent     {}", sent_digest);
    info!("sha256 received {}", received_digest);
    println!("{}", snapshot);

    if sent_digest != received_digest {
        anyhow::bail!("received text differs from sent text");
    }
    Ok(())
}

type Outcome = Option<(String, Stats, String)>;

/// One sending device, one receiving device, audio acknowledgments.
async fn run_range(cfg: &SimConfig, logger: Arc<dyn TransferLogger>) -> anyhow::Result<Outcome> {
    let session_config = RangeSessionConfig {
        cycle_interval_ms: cfg.cycle.as_millis() as u64,
        backchannel_interval_ms: cfg.ack_interval.as_millis() as u64,
        completion: cfg.completion,
        ..Default::default()
    };
    let backchannel_config = BackchannelConfig {
        min_interval_ms: cfg.ack_interval.as_millis() as u64,
        ..Default::default()
    };

    let mut sender = RangeSession::new(session_config.clone(), logger.clone())?;
    let mut receiver = RangeSession::new(session_config, logger.clone())?;
    receiver.set_mode(Mode::Receive);

    let event_count = Arc::new(std::sync::atomic::AtomicU64::new(0));
    let counter = event_count.clone();
    receiver.subscribe(Box::new(move |event| {
        if !matches!(event, SessionEvent::Changed(_)) {
            counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    }));

    // audio heard by the sending device
    let (burst_tx, mut burst_rx) = mpsc::unbounded_channel::<String>();
    let audio = Arc::new(LossyAudio::new(
        cfg.backchannel_loss,
        cfg.seed.wrapping_add(1),
        Duration::from_millis(AUDIO_MS_PER_CHAR),
    ));
    audio.start_listening(Box::new(move |text| {
        let _ = burst_tx.send(text);
    }));
    let mut queue = AckSendQueue::spawn(audio.clone(), &backchannel_config, logger.clone(), receiver.id());
    let mut rx_driver = BackchannelDriver::new(&backchannel_config, logger.clone(), receiver.id());
    let mut tx_driver = BackchannelDriver::new(&backchannel_config, logger, sender.id());

    let mut link = FrameLink::new(cfg.frame_loss, cfg.seed);
    let mut stats = Stats::default();
    sender.set_data(&cfg.message, cfg.chunk_size, Instant::now())?;

    let timeout = tokio::time::sleep(cfg.timeout);
    tokio::pin!(timeout);

    while !(sender.sender().is_done() && receiver.receiver().is_complete()) {
        let wake = earliest(sender.next_deadline(), rx_driver.next_deadline())
            .unwrap_or_else(|| Instant::now() + cfg.cycle);

        tokio::select! {
            _ = tokio::time::sleep_until(wake.into()) => {
                let now = Instant::now();
                if let Some(frame) = sender.tick(now) {
                    if let Some(frame) = link.transmit(&frame) {
                        receiver.process_received(frame);
                        rx_driver.on_frame(now);
                    }
                }
                if let Some(report) = rx_driver.poll(now, receiver.receiver()) {
                    queue.enqueue(report)?;
                    stats.acks_sent += 1;
                }
            }
            Some(burst) = burst_rx.recv() => {
                tx_driver.interpret(&burst, &mut sender);
            }
            _ = &mut timeout => {
                queue.shutdown().await;
                return Ok(None);
            }
        }
    }

    audio.stop_listening();
    queue.shutdown().await;

    stats.frames_shown = link.shown;
    stats.frames_delivered = link.delivered;
    stats.events = event_count.load(std::sync::atomic::Ordering::Relaxed);
    let snapshot = serde_json::to_string_pretty(&receiver.snapshot())?;
    Ok(Some((receiver.receiver().received_text(), stats, snapshot)))
}

/// Two devices facing each other, each showing and scanning at once.
async fn run_indexed(cfg: &SimConfig, logger: Arc<dyn TransferLogger>) -> anyhow::Result<Outcome> {
    let session_config = IndexedConfig {
        cycle_interval_ms: cfg.cycle.as_millis() as u64,
        ..Default::default()
    };
    let mut alice = IndexedSession::new(session_config.clone(), logger.clone())?;
    let mut bob = IndexedSession::new(session_config, logger)?;

    let now = Instant::now();
    alice.set_message(&cfg.message, cfg.chunk_size, now)?;
    if let Some(reply) = &cfg.reply {
        bob.set_message(reply, cfg.chunk_size, now)?;
    }

    let mut to_bob = FrameLink::new(cfg.frame_loss, cfg.seed);
    let mut to_alice = FrameLink::new(cfg.backchannel_loss, cfg.seed.wrapping_add(1));
    let mut stats = Stats::default();

    let finished = |a: &IndexedSession, b: &IndexedSession| {
        let replied = cfg.reply.is_none() || (a.is_inbound_complete() && b.is_outbound_done());
        a.is_outbound_done() && b.is_inbound_complete() && replied
    };

    // both displays keep refreshing after their own transfer ends so that
    // acknowledgments stay visible to the peer
    let mut display = tokio::time::interval(cfg.cycle);
    let timeout = tokio::time::sleep(cfg.timeout);
    tokio::pin!(timeout);

    while !finished(&alice, &bob) {
        tokio::select! {
            _ = display.tick() => {
                let code = alice.current_code();
                if let Some(code) = to_bob.transmit(&code) {
                    bob.parse_code(code);
                }
                let code = bob.current_code();
                if code.contains(":ACK:") {
                    stats.acks_sent += 1;
                }
                if let Some(code) = to_alice.transmit(&code) {
                    alice.parse_code(code);
                }
            }
            _ = &mut timeout => return Ok(None),
        }
    }

    stats.frames_shown = to_bob.shown + to_alice.shown;
    stats.frames_delivered = to_bob.delivered + to_alice.delivered;
    if let Some(reply) = alice.received_message() {
        info!("Reply received: {} chars", reply.chars().count());
    }
    let snapshot = serde_json::to_string_pretty(&bob.snapshot())?;
    Ok(Some((bob.received_message().unwrap_or_default(), stats, snapshot)))
}
