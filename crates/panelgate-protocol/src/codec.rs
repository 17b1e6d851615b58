//! Turning [`EventFrame`]s into transport [`Frame`]s and back.
//!
//! Node daemons speak JSON text, so [`JsonCodec`] is what a relay session
//! uses unless it is built with another [`Codec`].

use panelgate_transport::Frame;

use crate::{EventFrame, ProtocolError};

/// Converts envelopes to and from wire frames.
pub trait Codec: Send + Sync + 'static {
    /// Encodes `event` as a frame ready to send.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode(&self, event: &EventFrame) -> Result<Frame, ProtocolError>;

    /// Decodes a frame of either kind as an envelope.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` for payloads that are not an
    /// envelope. The caller decides whether that matters; the relay
    /// forwards such frames untouched.
    fn decode(&self, frame: &Frame) -> Result<EventFrame, ProtocolError>;
}

/// JSON envelopes, always encoded as text frames.
///
/// ```rust
/// use panelgate_protocol::{Codec, EventFrame, JsonCodec};
/// use panelgate_transport::Frame;
///
/// let frame = JsonCodec.encode(&EventFrame::auth("tok")).unwrap();
/// assert_eq!(frame, Frame::from(r#"{"event":"auth","args":["tok"]}"#));
///
/// let event = JsonCodec.decode(&frame).unwrap();
/// assert_eq!(event.auth_credential(), Some("tok"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, event: &EventFrame) -> Result<Frame, ProtocolError> {
        serde_json::to_string(event)
            .map(Frame::Text)
            .map_err(ProtocolError::Encode)
    }

    fn decode(&self, frame: &Frame) -> Result<EventFrame, ProtocolError> {
        serde_json::from_slice(frame.as_bytes()).map_err(ProtocolError::Decode)
    }
}
