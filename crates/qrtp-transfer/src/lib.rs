//! QRTP chunked transfer engine.
//!
//! Moves text across a one-way visual channel (a stream of QR codes) with
//! progress reported back over a separate lossy channel (audio bursts or a
//! second QR stream). Two wire variants:
//!
//! - **Range** ([`RangeSession`]): chunks are addressed by character offsets,
//!   the receiver reports covered ranges over the audio backchannel, and the
//!   sender waits for an explicit `DONE`.
//! - **Indexed** ([`IndexedSession`]): chunks are addressed by ordinal, both
//!   devices show and scan at once, and acknowledgments ride the visual
//!   channel. The sender stops once every index is acknowledged.
//!
//! Sessions are synchronous and never sleep; the owner drives their timers
//! with `tick(now)` and `next_deadline()`.

pub mod audio;
pub mod backchannel;
pub mod bitfield;
pub mod chunker;
pub mod config;
pub mod error;
pub mod events;
pub mod indexed;
pub mod logging;
pub mod protocol;
pub mod ranges;
pub mod receiver;
pub mod sender;
pub mod session;
pub mod timer;

pub use backchannel::{AckDebouncer, AckSendQueue, AckSink, AudioCallback, AudioChannel, BackchannelDriver};
pub use bitfield::ChunkBitfield;
pub use chunker::{Chunk, chunk};
pub use config::{BackchannelConfig, CompletionPolicy, IndexedConfig, RangeSessionConfig};
pub use error::{ChannelError, FrameError, SessionError};
pub use events::{
    EventBus, IndexedSnapshot, Listener, ListenerId, Mode, Piece, RangeSnapshot, SessionEvent,
    SessionSnapshot,
};
pub use indexed::IndexedSession;
pub use logging::{
    Direction, LogEvent, MemoryLogger, NullLogger, TracingLogger, TransferLog, TransferLogger,
};
pub use protocol::{AckMessage, IndexedCodec, IndexedFrame, RangeFrame};
pub use ranges::{Range, RangeSet};
pub use receiver::{Inbound, RangeReceiver};
pub use sender::{AckOutcome, RangeSender};
pub use session::RangeSession;
pub use timer::{Clock, ManualClock, SystemClock, Timer, earliest};
