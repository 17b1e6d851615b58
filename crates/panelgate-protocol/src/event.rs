//! The `{event, args}` envelope spoken by browsers and node daemons.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event names the relay produces or inspects.
///
/// Anything else passes through untouched.
pub mod events {
    /// Client → relay handshake, and relay → node authentication.
    pub const AUTH: &str = "auth";
    /// Node → client, authentication accepted.
    pub const AUTH_SUCCESS: &str = "auth success";
    /// Node → client, one line of console output.
    pub const CONSOLE_OUTPUT: &str = "console output";
    /// Client → node, request the recent log backlog.
    pub const SEND_LOGS: &str = "send logs";
    /// Client → node, run a console command.
    pub const SEND_COMMAND: &str = "send command";
    /// Node → client, the credential is about to expire.
    pub const TOKEN_EXPIRING: &str = "token expiring";
    /// Node → client, the credential has expired.
    pub const TOKEN_EXPIRED: &str = "token expired";
    /// Relay → client, something went wrong.
    pub const ERROR: &str = "error";
    /// Relay → client, the node credential was replaced.
    pub const TOKEN_REFRESHED: &str = "token refreshed";
}

/// One structured console message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    /// The event name, e.g. `"console output"`.
    pub event: String,

    /// Positional arguments. Missing `args` decodes as empty.
    #[serde(default)]
    pub args: Vec<Value>,
}

impl EventFrame {
    /// Creates a frame with the given event name and arguments.
    pub fn new(event: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            event: event.into(),
            args,
        }
    }

    /// `{"event":"auth","args":[credential]}`.
    pub fn auth(credential: &str) -> Self {
        Self::new(events::AUTH, vec![Value::String(credential.to_owned())])
    }

    /// `{"event":"error","args":[message]}`.
    pub fn error(message: &str) -> Self {
        Self::new(events::ERROR, vec![Value::String(message.to_owned())])
    }

    /// `{"event":"token refreshed","args":[prefix]}`.
    pub fn token_refreshed(redacted_prefix: &str) -> Self {
        Self::new(
            events::TOKEN_REFRESHED,
            vec![Value::String(redacted_prefix.to_owned())],
        )
    }

    /// If this is an `auth` frame carrying exactly one string argument,
    /// returns that argument.
    pub fn auth_credential(&self) -> Option<&str> {
        if self.event != events::AUTH {
            return None;
        }
        match self.args.as_slice() {
            [Value::String(credential)] => Some(credential),
            _ => None,
        }
    }

    /// `true` for `token expiring` and `token expired`.
    pub fn signals_credential_expiry(&self) -> bool {
        self.event == events::TOKEN_EXPIRING
            || self.event == events::TOKEN_EXPIRED
    }
}
