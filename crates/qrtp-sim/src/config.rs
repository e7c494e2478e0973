use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};

use qrtp_transfer::CompletionPolicy;

/// Which wire variant to simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Range,
    Indexed,
}

impl FromStr for Variant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "range" | "qrtpb" => Ok(Self::Range),
            "indexed" | "qrtp" => Ok(Self::Indexed),
            other => bail!("unknown variant {:?} (expected range or indexed)", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub variant: Variant,
    pub message: String,
    /// Indexed variant only: text the receiving device sends back.
    pub reply: Option<String>,
    pub chunk_size: Option<usize>,
    pub frame_loss: f64,
    pub backchannel_loss: f64,
    pub seed: u64,
    pub cycle: Duration,
    pub ack_interval: Duration,
    pub timeout: Duration,
    pub completion: CompletionPolicy,
}

impl SimConfig {
    /// Read `QRTP_SIM_*` variables. Call after `dotenvy::dotenv()`.
    pub fn from_env() -> anyhow::Result<Self> {
        let variant = std::env::var("QRTP_SIM_VARIANT")
            .unwrap_or_else(|_| "range".into())
            .parse()?;

        let message = match std::env::var("QRTP_SIM_MESSAGE_FILE") {
            Ok(path) => {
                let path = PathBuf::from(path);
                std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?
            }
            Err(_) => std::env::var("QRTP_SIM_MESSAGE").unwrap_or_else(|_| default_message()),
        };
        let reply = std::env::var("QRTP_SIM_REPLY").ok().filter(|r| !r.trim().is_empty());

        let chunk_size = match std::env::var("QRTP_SIM_CHUNK_SIZE") {
            Ok(v) => Some(v.parse().context("QRTP_SIM_CHUNK_SIZE")?),
            Err(_) => None,
        };

        let frame_loss = probability("QRTP_SIM_FRAME_LOSS", 0.2)?;
        let backchannel_loss = probability("QRTP_SIM_BACKCHANNEL_LOSS", 0.3)?;

        let completion = match std::env::var("QRTP_SIM_COMPLETION").as_deref() {
            Ok("stop_on_full_ack") => CompletionPolicy::StopOnFullAck,
            Ok("await_done_signal") | Err(_) => CompletionPolicy::AwaitDoneSignal,
            Ok(other) => bail!("unknown completion policy {:?}", other),
        };

        Ok(Self {
            variant,
            message,
            reply,
            chunk_size,
            frame_loss,
            backchannel_loss,
            seed: env_or("QRTP_SIM_SEED", 1),
            cycle: Duration::from_millis(env_or("QRTP_SIM_CYCLE_MS", 250)),
            ack_interval: Duration::from_millis(env_or("QRTP_SIM_ACK_INTERVAL_MS", 4000)),
            timeout: Duration::from_secs(env_or("QRTP_SIM_TIMEOUT_SECS", 120)),
            completion,
        })
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn probability(key: &str, default: f64) -> anyhow::Result<f64> {
    let p: f64 = env_or(key, default);
    if !(0.0..1.0).contains(&p) {
        bail!("{} must be in [0, 1), got {}", key, p);
    }
    Ok(p)
}

fn default_message() -> String {
    (1..=40)
        .map(|i| format!("{:02}: the quick brown fox jumps over the lazy dog\n", i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_parse() {
        assert_eq!("range".parse::<Variant>().unwrap(), Variant::Range);
        assert_eq!("Indexed".parse::<Variant>().unwrap(), Variant::Indexed);
        assert_eq!("QRTPB".parse::<Variant>().unwrap(), Variant::Range);
        assert!("carrier-pigeon".parse::<Variant>().is_err());
    }

    #[test]
    fn test_default_message_spans_several_chunks() {
        let msg = default_message();
        assert!(msg.chars().count() > 1000);
        assert!(msg.starts_with("01: "));
    }
}
