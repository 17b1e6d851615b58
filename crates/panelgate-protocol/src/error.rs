//! Errors raised while encoding or decoding console envelopes.

/// Something was wrong with an envelope.
///
/// None of these end a relay session. A frame that fails to decode is
/// simply not inspected and gets forwarded as it arrived.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Non-JSON console output, a missing `event` field, a truncated
    /// message.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}
