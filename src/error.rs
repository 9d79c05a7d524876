use std::fmt::{Display, Formatter};

/// When things go awry
#[derive(Debug)]
pub enum ServerError {
    /// A datagram failed header or question parsing
    Malformed(String),
    /// The override store could not be reached or negotiated with
    StoreUnavailable(String),
    /// An I/O failure outside of the ones above
    Io(std::io::Error),
    /// Something failed during process start up
    Startup(String),
}

impl Display for ServerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Malformed(msg) => write!(f, "malformed message: {msg}"),
            ServerError::StoreUnavailable(msg) => write!(f, "override store unavailable: {msg}"),
            ServerError::Io(err) => write!(f, "io error: {err}"),
            ServerError::Startup(msg) => write!(f, "startup error: {msg}"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(error: std::io::Error) -> Self {
        ServerError::Io(error)
    }
}
