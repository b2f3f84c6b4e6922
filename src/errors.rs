use std::io;

use crate::cancel::InputClosed;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An error encountered while compressing or decompressing.
///
/// Every variant is recoverable: a pipeline that hits one reports a terminal
/// failure status and hands the error back to its caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input source could not be read, or failed mid-stream.
    #[error("read error: {0}")]
    Read(io::Error),

    /// The output sink rejected a write.
    #[error("write error: {0}")]
    Write(io::Error),

    /// The host closed the input through a [`CancelHandle`].
    ///
    /// [`CancelHandle`]: crate::CancelHandle
    #[error("cancelled by host")]
    Cancelled,

    /// The container header or code table is inconsistent.
    #[error("malformed container: {0}")]
    MalformedContainer(String),

    /// The payload bits do not resolve to a complete symbol sequence.
    #[error("undecodable bitstream: {trailing_bits} trailing bits match no code (after {decoded} symbols)")]
    UndecodableBitstream { trailing_bits: usize, decoded: usize },

    /// Tree or table construction broke an invariant that valid input can't break.
    #[error("internal invariant violated: {0}")]
    InternalInvariantViolation(&'static str),

    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Read(e) | Error::Write(e) => e,
            cancelled @ Error::Cancelled => io::Error::new(io::ErrorKind::Interrupted, cancelled),
            invalid @ Error::InvalidOptions(_) => io::Error::new(io::ErrorKind::InvalidInput, invalid),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

/// Classify a failed read: a source closed by its [`CancelHandle`] is a
/// cancellation, anything else is a plain read error.
///
/// [`CancelHandle`]: crate::CancelHandle
pub(crate) fn read_error(e: io::Error) -> Error {
    let closed = e
        .get_ref()
        .map_or(false, |inner| inner.is::<InputClosed>());

    if closed {
        Error::Cancelled
    } else {
        Error::Read(e)
    }
}

/// Shorthand for bailing out of container parsing.
pub(crate) fn malformed<T>(msg: impl Into<String>) -> Result<T> {
    Err(Error::MalformedContainer(msg.into()))
}
