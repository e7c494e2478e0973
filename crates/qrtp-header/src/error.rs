use thiserror::Error;

/// Errors raised while building, encoding or decoding a header.
///
/// Decode errors describe malformed input coming off the wire. Encode errors
/// (`MissingField`, `WidthOverflow`, `TypeMismatch`) mean the caller handed the
/// codec values that do not fit its own pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// The pattern string itself is unusable.
    #[error("invalid header pattern \"{pattern}\": {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A literal segment of the pattern was not found where expected.
    #[error("input doesn't match pattern at \"{segment}\"")]
    PrefixMismatch { segment: String },

    /// The delimiter terminating a variable-width field is absent.
    #[error("couldn't find delimiter \"{delimiter}\" in remaining input")]
    MissingDelimiter { delimiter: String },

    /// Input ended before the fixed-width header did.
    #[error("input too short for fixed header: need {expected} characters, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// A numeric field held something other than an integer.
    #[error("field \"{field}\" is not a number: \"{value}\"")]
    InvalidNumber { field: String, value: String },

    #[error("missing required field \"{name}\"")]
    MissingField { name: String },

    #[error("value \"{value}\" exceeds fixed width of {width}")]
    WidthOverflow { value: String, width: usize },

    /// Fixed headers have no way to tell an empty list from a padded item.
    #[error("list field \"{name}\" cannot be empty in a fixed header")]
    EmptyFixedList { name: String },

    #[error("field \"{name}\" expects a {expected} value, got {actual}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
}

impl HeaderError {
    /// True for errors caused by the caller of `encode` rather than by input.
    pub fn is_encode_error(&self) -> bool {
        matches!(
            self,
            Self::MissingField { .. }
                | Self::WidthOverflow { .. }
                | Self::EmptyFixedList { .. }
                | Self::TypeMismatch { .. }
        )
    }
}
