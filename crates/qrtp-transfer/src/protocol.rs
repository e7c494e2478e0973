//! Wire formats.
//!
//! Range variant, visual channel:
//!
//! ```text
//! QRTPB:<start>-<end>/<total>:<payload>    data, offsets inclusive
//! QRTPB:idle                               nothing to send
//! QRTPB:DONE                               sender finished
//! ```
//!
//! Range variant, backchannel: `R:<a>-<b>,<c>-<d>,...` or `DONE`.
//!
//! Indexed variant, both directions over the visual channel:
//!
//! ```text
//! QRTP<index>/<total>$<payload>            data
//! QRTP:ACK:<i>,<j>,...                     received indices
//! QRTP:DONE / QRTP:idle
//! ```

use std::fmt;

use qrtp_header::{Fields, Header};

use crate::error::{FrameError, SessionError};
use crate::ranges::RangeSet;

/// Completion token on either channel.
pub const DONE_SIGNAL: &str = "DONE";

/// Range variant "nothing to show" token.
pub const IDLE_SIGNAL: &str = "idle";

/// Prefix of a backchannel range report.
pub const RANGE_REPORT_PREFIX: &str = "R:";

/// Default prefix for the range variant.
pub const RANGE_PREFIX: &str = "QRTPB";

/// Default prefix for the indexed variant.
pub const INDEXED_PREFIX: &str = "QRTP";

/// Default characters per chunk, range variant.
pub const RANGE_CHUNK_SIZE: usize = 1000;

/// Default characters per chunk, indexed variant.
pub const INDEXED_CHUNK_SIZE: usize = 100;

/// Largest message, in characters, a range receiver will buffer.
pub const MAX_MESSAGE_LEN: usize = 1 << 20;

/// Largest chunk count an indexed receiver will track.
pub const MAX_CHUNKS: usize = 1 << 16;

/// Milliseconds between frame changes on the display.
pub const CYCLE_INTERVAL_MS: u64 = 250;

/// Minimum milliseconds between receiver backchannel reports.
pub const BACKCHANNEL_INTERVAL_MS: u64 = 4000;

/// Prefixes must be non-empty and must not contain the characters the
/// frame grammars split on.
pub fn validate_prefix(prefix: &str) -> Result<(), SessionError> {
    if prefix.is_empty() || prefix.contains([':', '$', '<', '>']) {
        return Err(SessionError::InvalidPrefix(prefix.to_string()));
    }
    Ok(())
}

/// A frame of the range variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeFrame {
    Data {
        start: usize,
        end: usize,
        total: usize,
        payload: String,
    },
    Idle,
    Done,
}

impl RangeFrame {
    pub fn encode(&self, prefix: &str) -> String {
        match self {
            Self::Data { start, end, total, payload } => {
                format!("{}:{}-{}/{}:{}", prefix, start, end, total, payload)
            }
            Self::Idle => format!("{}:{}", prefix, IDLE_SIGNAL),
            Self::Done => format!("{}:{}", prefix, DONE_SIGNAL),
        }
    }

    /// Parse a scanned frame. The payload may itself contain `:`.
    pub fn decode(prefix: &str, input: &str) -> Result<Self, FrameError> {
        let rest = input
            .strip_prefix(prefix)
            .and_then(|r| r.strip_prefix(':'))
            .ok_or_else(|| FrameError::PrefixMismatch {
                expected: format!("{}:", prefix),
            })?;

        match rest {
            IDLE_SIGNAL => return Ok(Self::Idle),
            DONE_SIGNAL => return Ok(Self::Done),
            _ => {}
        }

        let (header, payload) = rest
            .split_once(':')
            .ok_or_else(|| FrameError::Malformed("missing payload separator".into()))?;
        let (range, total) = header
            .split_once('/')
            .ok_or_else(|| FrameError::Malformed(format!("missing total in \"{}\"", header)))?;
        let (start, end) = range
            .split_once('-')
            .ok_or_else(|| FrameError::Malformed(format!("missing '-' in \"{}\"", range)))?;

        let start = parse_usize("start", start)?;
        let end = parse_usize("end", end)?;
        let total = parse_usize("total", total)?;

        if start > end {
            return Err(FrameError::Malformed(format!("inverted range {}-{}", start, end)));
        }
        if end >= total {
            return Err(FrameError::OutOfRange { index: end, total });
        }
        let expected = end - start + 1;
        let actual = payload.chars().count();
        if actual != expected {
            return Err(FrameError::PayloadLength { expected, actual });
        }

        Ok(Self::Data {
            start,
            end,
            total,
            payload: payload.to_string(),
        })
    }
}

/// A backchannel message of the range variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckMessage {
    Done,
    Ranges(RangeSet),
}

impl AckMessage {
    pub fn decode(input: &str) -> Result<Self, FrameError> {
        let input = input.trim();
        if input == DONE_SIGNAL {
            return Ok(Self::Done);
        }
        let body = input
            .strip_prefix(RANGE_REPORT_PREFIX)
            .ok_or_else(|| FrameError::PrefixMismatch {
                expected: RANGE_REPORT_PREFIX.to_string(),
            })?;
        let ranges: RangeSet = body.parse()?;
        if ranges.is_empty() {
            return Err(FrameError::Malformed("empty range report".into()));
        }
        Ok(Self::Ranges(ranges))
    }
}

impl fmt::Display for AckMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => f.write_str(DONE_SIGNAL),
            Self::Ranges(ranges) => write!(f, "{}{}", RANGE_REPORT_PREFIX, ranges),
        }
    }
}

/// A frame of the indexed variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexedFrame {
    Data {
        index: usize,
        total: usize,
        payload: String,
    },
    Ack(Vec<usize>),
    Done,
    Idle,
}

/// Header-pattern codec for indexed frames under one prefix.
#[derive(Debug, Clone)]
pub struct IndexedCodec {
    data: Header,
    ack: Header,
    done_token: String,
    idle_token: String,
}

impl IndexedCodec {
    pub fn new(prefix: &str) -> Result<Self, SessionError> {
        validate_prefix(prefix)?;
        Ok(Self {
            data: Header::new(&format!("{}<index:num>/<total:num>$", prefix))?,
            ack: Header::new(&format!("{}:ACK:<indices:nums>", prefix))?,
            done_token: format!("{}:{}", prefix, DONE_SIGNAL),
            idle_token: format!("{}:{}", prefix, IDLE_SIGNAL),
        })
    }

    pub fn encode(&self, frame: &IndexedFrame) -> Result<String, SessionError> {
        let code = match frame {
            IndexedFrame::Data { index, total, payload } => self.data.encode(
                &Fields::new()
                    .with("index", *index)
                    .with("total", *total)
                    .with_payload(payload.as_str()),
            )?,
            IndexedFrame::Ack(indices) => self
                .ack
                .encode(&Fields::new().with("indices", indices.clone()))?,
            IndexedFrame::Done => self.done_token.clone(),
            IndexedFrame::Idle => self.idle_token.clone(),
        };
        Ok(code)
    }

    /// Tokens first, then the acknowledgment header, then the data header.
    pub fn decode(&self, input: &str) -> Result<IndexedFrame, FrameError> {
        if input == self.done_token {
            return Ok(IndexedFrame::Done);
        }
        if input == self.idle_token {
            return Ok(IndexedFrame::Idle);
        }

        if input.starts_with(self.ack.prefix()) {
            let fields = self.ack.decode(input)?;
            let indices = fields
                .nums("indices")
                .unwrap_or_default()
                .iter()
                .map(|&n| to_usize("indices", n))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(IndexedFrame::Ack(indices));
        }

        let fields = self.data.decode(input)?;
        let index = to_usize("index", fields.num("index").unwrap_or(-1))?;
        let total = to_usize("total", fields.num("total").unwrap_or(-1))?;
        if total == 0 {
            return Err(FrameError::Malformed("zero total".into()));
        }
        if index >= total {
            return Err(FrameError::OutOfRange { index, total });
        }
        Ok(IndexedFrame::Data {
            index,
            total,
            payload: fields.payload().unwrap_or_default().to_string(),
        })
    }
}

fn parse_usize(field: &str, raw: &str) -> Result<usize, FrameError> {
    raw.parse()
        .map_err(|_| FrameError::Malformed(format!("{} is not a number: \"{}\"", field, raw)))
}

fn to_usize(field: &str, n: i64) -> Result<usize, FrameError> {
    usize::try_from(n).map_err(|_| FrameError::Malformed(format!("{} is negative: {}", field, n)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_frame_round_trip() {
        let frame = RangeFrame::Data {
            start: 5,
            end: 9,
            total: 13,
            payload: ", wor".into(),
        };
        let code = frame.encode("QRTPB");
        assert_eq!(code, "QRTPB:5-9/13:, wor");
        assert_eq!(RangeFrame::decode("QRTPB", &code).unwrap(), frame);
    }

    #[test]
    fn test_range_frame_payload_with_colons() {
        let frame = RangeFrame::decode("QRTPB", "QRTPB:0-4/5:a:b:c").unwrap();
        assert_eq!(
            frame,
            RangeFrame::Data {
                start: 0,
                end: 4,
                total: 5,
                payload: "a:b:c".into(),
            }
        );
    }

    #[test]
    fn test_range_tokens() {
        assert_eq!(RangeFrame::decode("QRTPB", "QRTPB:idle").unwrap(), RangeFrame::Idle);
        assert_eq!(RangeFrame::decode("QRTPB", "QRTPB:DONE").unwrap(), RangeFrame::Done);
        assert_eq!(RangeFrame::Done.encode("X"), "X:DONE");
    }

    #[test]
    fn test_range_frame_rejections() {
        assert!(matches!(
            RangeFrame::decode("QRTPB", "BADPREFIX:0-4/13:Hello"),
            Err(FrameError::PrefixMismatch { .. })
        ));
        assert!(matches!(
            RangeFrame::decode("QRTPB", "QRTPBX:0-4/13:Hello"),
            Err(FrameError::PrefixMismatch { .. })
        ));
        assert!(matches!(
            RangeFrame::decode("QRTPB", "QRTPB:0-4/13"),
            Err(FrameError::Malformed(_))
        ));
        assert!(matches!(
            RangeFrame::decode("QRTPB", "QRTPB:a-4/13:Hello"),
            Err(FrameError::Malformed(_))
        ));
        assert_eq!(
            RangeFrame::decode("QRTPB", "QRTPB:10-14/13:Hello"),
            Err(FrameError::OutOfRange { index: 14, total: 13 })
        );
        assert_eq!(
            RangeFrame::decode("QRTPB", "QRTPB:0-4/13:Hell"),
            Err(FrameError::PayloadLength { expected: 5, actual: 4 })
        );
    }

    #[test]
    fn test_ack_message() {
        let ack = AckMessage::decode("R:0-4,10-12").unwrap();
        match &ack {
            AckMessage::Ranges(set) => {
                assert!(set.contains(0, 4));
                assert!(set.contains(10, 12));
                assert!(!set.contains(5, 9));
            }
            AckMessage::Done => panic!("expected ranges"),
        }
        assert_eq!(ack.to_string(), "R:0-4,10-12");
        assert_eq!(AckMessage::decode("DONE").unwrap(), AckMessage::Done);
        assert!(AckMessage::decode("R:").is_err());
        assert!(AckMessage::decode("hello").is_err());
        assert!(AckMessage::decode("R:1-x").is_err());
    }

    #[test]
    fn test_indexed_round_trip() {
        let codec = IndexedCodec::new("QRTP").unwrap();
        let data = IndexedFrame::Data {
            index: 1,
            total: 3,
            payload: "a$b:c".into(),
        };
        let code = codec.encode(&data).unwrap();
        assert_eq!(code, "QRTP1/3$a$b:c");
        assert_eq!(codec.decode(&code).unwrap(), data);

        let ack = IndexedFrame::Ack(vec![0, 2]);
        let code = codec.encode(&ack).unwrap();
        assert_eq!(code, "QRTP:ACK:0,2");
        assert_eq!(codec.decode(&code).unwrap(), ack);

        assert_eq!(codec.decode("QRTP:DONE").unwrap(), IndexedFrame::Done);
        assert_eq!(codec.decode("QRTP:idle").unwrap(), IndexedFrame::Idle);
    }

    #[test]
    fn test_indexed_rejections() {
        let codec = IndexedCodec::new("QRTP").unwrap();
        assert!(codec.decode("QRTP:ACK:1,x").is_err());
        assert!(codec.decode("QRTP3/3$x").is_err());
        assert!(codec.decode("QRTP-1/3$x").is_err());
        assert!(codec.decode("OTHER0/1$x").is_err());
        assert!(codec.decode("QRTP0/0$x").is_err());
    }

    #[test]
    fn test_prefix_validation() {
        assert!(validate_prefix("QRTP").is_ok());
        assert!(validate_prefix("").is_err());
        assert!(validate_prefix("A:B").is_err());
        assert!(IndexedCodec::new("Q$").is_err());
    }
}
