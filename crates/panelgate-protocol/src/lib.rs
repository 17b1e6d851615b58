//! Wire protocol for Panelgate.
//!
//! Browsers and node daemons exchange the same structured envelope,
//! `{ "event": string, "args": [any...] }`. This crate defines:
//!
//! - **Types** ([`EventFrame`], [`events`]): the envelope and the event
//!   names the relay cares about.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how envelopes become
//!   transport frames.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (Frame) → Protocol (EventFrame) → Relay (auth, refresh)
//! ```
//!
//! The relay only decodes frames it needs to inspect. Everything else is
//! forwarded as the original [`Frame`](panelgate_transport::Frame).

mod codec;
mod error;
mod event;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use event::{EventFrame, events};
