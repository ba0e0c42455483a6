//! Error types.

use crate::x11::WireError;

/// Errors surfaced by the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    #[error("X11 connection failed: {0}")]
    Connection(#[from] WireError),

    #[error("no X11 proxy server attached")]
    NotAttached,

    #[error("request from unknown or disconnected client")]
    UnknownClient,
}

/// Client misbehaviour. Reported to the offending client as a protocol
/// error; the client's later requests are ignored until it disconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    #[error("surface already has a role")]
    RoleAlreadyAssigned,

    #[error("unsupported protocol version {requested} (expected {supported})")]
    UnsupportedVersion { requested: u32, supported: u32 },

    #[error("invalid resize edges {0:#x}")]
    InvalidResizeEdges(u32),

    #[error("unknown object {0}")]
    UnknownObject(u32),
}

impl ProtocolViolation {
    /// Wire error code sent with the protocol error event.
    pub const fn code(self) -> u32 {
        match self {
            Self::RoleAlreadyAssigned => 0,
            Self::UnsupportedVersion { .. } => 1,
            Self::InvalidResizeEdges(_) => 2,
            Self::UnknownObject(_) => 3,
        }
    }
}
