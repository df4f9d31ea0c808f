//! Error types for the lightify crate.

use std::error::Error as StdError;
use std::{fmt, io};

// =============================================================================
// Error
// =============================================================================

/// Errors produced while talking to a gateway.
#[derive(Debug)]
pub enum Error {
    /// The peer closed the connection before a whole frame arrived.
    ConnectionClosed { expected: usize, received: usize },

    /// The read deadline elapsed while waiting for frame bytes.
    Timeout,

    /// The frame is shorter than the protocol minimum for its kind.
    MalformedFrame(String),

    /// A declared element count needs more bytes than the payload holds.
    TruncatedPayload { needed: usize, available: usize },

    /// The response carries a command code no decoder recognises.
    UnknownCommand(u8),

    /// The response answers a different command than the one outstanding.
    UnexpectedResponse { expected: u8, received: u8 },

    /// A caller-supplied value cannot be encoded on the wire.
    InvalidParameter(String),

    /// The session was invalidated by an earlier transport failure.
    SessionClosed,

    /// Any other transport error.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConnectionClosed { expected, received } => write!(
                f,
                "connection closed: received {} of {} frame bytes",
                received, expected
            ),
            Error::Timeout => write!(f, "timed out waiting for gateway response"),
            Error::MalformedFrame(msg) => write!(f, "malformed frame: {}", msg),
            Error::TruncatedPayload { needed, available } => write!(
                f,
                "truncated payload: need {} bytes, {} available",
                needed, available
            ),
            Error::UnknownCommand(code) => write!(f, "unknown response command 0x{:02x}", code),
            Error::UnexpectedResponse { expected, received } => write!(
                f,
                "expected response to command 0x{:02x}, received 0x{:02x}",
                expected, received
            ),
            Error::InvalidParameter(msg) => write!(f, "invalid parameter: {}", msg),
            Error::SessionClosed => write!(f, "session closed after a transport failure"),
            Error::Io(e) => write!(f, "i/o error: {}", e),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl Error {
    /// Create a malformed frame error with a message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedFrame(msg.into())
    }

    /// Create an invalid parameter error with a message.
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Error::InvalidParameter(msg.into())
    }

    /// Returns true if this is a Timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }

    /// Returns true if this is a ConnectionClosed error.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Error::ConnectionClosed { .. })
    }

    /// Returns true if the error leaves the byte stream at an unknown
    /// position, after which the session must not be reused.
    pub fn invalidates_session(&self) -> bool {
        matches!(
            self,
            Error::ConnectionClosed { .. } | Error::Timeout | Error::Io(_) | Error::SessionClosed
        )
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Error::Timeout,
            io::ErrorKind::UnexpectedEof => Error::ConnectionClosed {
                expected: 0,
                received: 0,
            },
            _ => Error::Io(err),
        }
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;
