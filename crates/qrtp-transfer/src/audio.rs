//! Burst framing for the audio backchannel.
//!
//! An audio burst carries at most [`MAX_AUDIO_MESSAGE`] characters. Longer
//! messages go out as several bursts: the first starts with
//! [`MSG_START`], the last ends with [`MSG_END`], middle bursts are bare.

/// Longest text a single variable-length burst can carry.
pub const MAX_AUDIO_MESSAGE: usize = 140;

pub const MSG_START: &str = "<<!";
pub const MSG_END: &str = "!>>";

use crate::protocol::AckMessage;

/// Room kept free in each burst for a marker.
const FRAMING_RESERVE: usize = 4;

/// Bursts held for one unfinished message before it is given up.
const MAX_PARTIAL_BURSTS: usize = 64;

/// Split `text` into bursts of at most `max_len` characters.
pub fn frame_audio_message(text: &str, max_len: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_len {
        return vec![text.to_string()];
    }

    let piece_len = max_len.saturating_sub(FRAMING_RESERVE).max(1);
    let pieces: Vec<&[char]> = chars.chunks(piece_len).collect();
    let last = pieces.len() - 1;
    pieces
        .iter()
        .enumerate()
        .map(|(i, piece)| {
            let mut burst = String::with_capacity(piece.len() + MSG_START.len() + MSG_END.len());
            if i == 0 {
                burst.push_str(MSG_START);
            }
            burst.extend(piece.iter());
            if i == last {
                burst.push_str(MSG_END);
            }
            burst
        })
        .collect()
}

/// Rejoins bursts produced by [`frame_audio_message`].
#[derive(Debug, Default)]
pub struct AudioReassembler {
    parts: Vec<String>,
    in_message: bool,
}

impl AudioReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one received burst. Returns a complete message when one is
    /// available.
    ///
    /// A start marker discards any partial message, and so does a bare
    /// burst that is a whole acknowledgment on its own: the end of the
    /// partial message was lost. Middle bursts never parse as one, since
    /// they carry neither the `R:` prefix nor a lone `DONE`.
    pub fn push(&mut self, burst: &str) -> Option<String> {
        if let Some(body) = burst.strip_prefix(MSG_START) {
            self.parts.clear();
            if let Some(whole) = body.strip_suffix(MSG_END) {
                self.in_message = false;
                return Some(whole.to_string());
            }
            self.parts.push(body.to_string());
            self.in_message = true;
            return None;
        }

        if !self.in_message {
            return Some(burst.to_string());
        }

        match burst.strip_suffix(MSG_END) {
            Some(tail) => {
                self.parts.push(tail.to_string());
                self.in_message = false;
                Some(std::mem::take(&mut self.parts).concat())
            }
            None if AckMessage::decode(burst).is_ok() => {
                self.clear();
                Some(burst.to_string())
            }
            None => {
                if self.parts.len() >= MAX_PARTIAL_BURSTS {
                    self.clear();
                    return None;
                }
                self.parts.push(burst.to_string());
                None
            }
        }
    }

    pub fn is_partial(&self) -> bool {
        self.in_message
    }

    pub fn clear(&mut self) {
        self.parts.clear();
        self.in_message = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_is_one_bare_burst() {
        assert_eq!(frame_audio_message("R:0-4", MAX_AUDIO_MESSAGE), vec!["R:0-4"]);
    }

    #[test]
    fn test_long_message_framed_within_limit() {
        let text: String = (0..100).map(|i| format!("{}-{},", i * 10, i * 10 + 4)).collect();
        let bursts = frame_audio_message(&text, MAX_AUDIO_MESSAGE);

        assert!(bursts.len() > 1);
        assert!(bursts[0].starts_with(MSG_START));
        assert!(bursts.last().unwrap().ends_with(MSG_END));
        for burst in &bursts {
            assert!(burst.chars().count() <= MAX_AUDIO_MESSAGE);
        }

        let mut rx = AudioReassembler::new();
        let mut out = None;
        for burst in &bursts {
            out = rx.push(burst);
        }
        assert_eq!(out.as_deref(), Some(text.as_str()));
        assert!(!rx.is_partial());
    }

    #[test]
    fn test_partial_message_waits() {
        let mut rx = AudioReassembler::new();
        assert_eq!(rx.push("<<!abc"), None);
        assert_eq!(rx.push("def"), None);
        assert!(rx.is_partial());
        assert_eq!(rx.push("ghi!>>").as_deref(), Some("abcdefghi"));
    }

    #[test]
    fn test_lost_end_marker_does_not_swallow_later_reports() {
        let mut rx = AudioReassembler::new();
        assert_eq!(rx.push("<<!R:0-4"), None);
        assert_eq!(rx.push("DONE").as_deref(), Some("DONE"));
        assert!(!rx.is_partial());

        rx.push("<<!R:0-4,10-");
        rx.push("14,20-24");
        assert_eq!(rx.push("R:0-29").as_deref(), Some("R:0-29"));
        assert_eq!(rx.push("R:0-39").as_deref(), Some("R:0-39"));
    }

    #[test]
    fn test_abandoned_partial_is_bounded() {
        let mut rx = AudioReassembler::new();
        rx.push("<<!R:0-1");
        for i in 0..MAX_PARTIAL_BURSTS {
            assert_eq!(rx.push(&format!(",{}-{}", i * 10, i * 10 + 1)), None);
        }
        assert!(rx.parts.len() <= MAX_PARTIAL_BURSTS);
        assert!(!rx.is_partial());
        // the tail of the abandoned message is dropped with it
        assert_eq!(rx.push("9-9!>>").as_deref(), Some("9-9!>>"));
    }

    #[test]
    fn test_new_start_discards_partial() {
        let mut rx = AudioReassembler::new();
        rx.push("<<!stale");
        assert_eq!(rx.push("<<!fresh!>>").as_deref(), Some("fresh"));
        assert_eq!(rx.push("DONE").as_deref(), Some("DONE"));
    }
}
