use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The connection failed or was dropped while streaming.
    Transport,
    /// The provider answered with an error status or an error payload.
    Upstream,
    /// The provider is not configured well enough to send requests.
    Configuration,
    /// Any other errors.
    Other,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transport => write!(f, "Transport error"),
            ErrorKind::Upstream => write!(f, "Upstream error"),
            ErrorKind::Configuration => write!(f, "Configuration error"),
            ErrorKind::Other => write!(f, "Other error"),
        }
    }
}
