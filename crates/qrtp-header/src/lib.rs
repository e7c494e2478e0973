//! QRTP header codec: compact text headers described by a pattern string.
//!
//! A pattern mixes literal delimiters with typed placeholders:
//!
//! ```text
//! QRTP<index:num>/<total:num>$      variable-width header, payload after `$`
//! QR<seq:num-4><kind:text-2>!       fixed-width header, payload after 6 chars
//! ACK:<indices:nums>                variable-width header, no explicit payload marker
//! ```
//!
//! Placeholder syntax is `<name>`, `<name:type>` or `<name:type-width>`.
//! Supported types:
//! - `text`: default, a plain string (right-padded with spaces when fixed-width)
//! - `num`: signed integer (left-padded with zeros when fixed-width)
//! - `bool`: `true` / `false`
//! - `list`: comma-joined strings, or a concatenation of fixed-width items
//! - `nums`: comma-joined integers, or a concatenation of fixed-width items
//! - `pairs`: `key;value;key;value`
//! - `numPairs`: `num;num;num;num`
//!
//! End markers:
//! - `$`: everything after this point is payload
//! - `!`: fixed-size header; its length is known from the field widths

mod error;
mod pattern;
mod value;

pub use error::HeaderError;
pub use pattern::{
    FIXED_HEADER_MARKER, FieldKind, FieldSpec, Header, LIST_DELIMITER, PAIR_DELIMITER,
    PAYLOAD_MARKER,
};
pub use value::{FieldValue, Fields};
