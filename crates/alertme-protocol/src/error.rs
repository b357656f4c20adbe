//! Codec-level error taxonomy (spec §7).

use thiserror::Error;

/// Errors raised by payload encoders/decoders and the message catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A decoder received too few bytes, or a fixed byte in the layout
    /// didn't match what the message type requires.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// An encoder was given a parameter outside its valid range, or was
    /// missing a required field.
    #[error("bad parameter: {0}")]
    BadParameter(String),

    /// An encoder received a symbolic value it doesn't recognize (e.g. an
    /// unknown mode name for `mode_change_request`).
    #[error("unknown enum value: {0}")]
    UnknownEnum(String),

    /// `get_message` was asked for a name not present in the catalog.
    #[error("unknown message: {0}")]
    UnknownMessage(String),
}
