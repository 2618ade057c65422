use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// Login rejected by the cloud. Never retried automatically.
    Auth,
    Http(reqwest::Error),
    Connection(String),
    NotConnected,
    /// The cloud responded but the assembled snapshot failed completeness
    /// validation even after one reconnect and refetch.
    IncompleteData,
    Write { node_id: String, status: String },
    Io(std::io::Error),
}

impl Error {
    /// True for failures a single reconnect may fix.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(_) | Error::Connection(_) | Error::NotConnected => true,
            Error::Auth | Error::IncompleteData | Error::Write { .. } | Error::Io(_) => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Auth => write!(f, "authentication failed"),
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Connection(msg) => write!(f, "connection error: {msg}"),
            Error::NotConnected => write!(f, "not connected"),
            Error::IncompleteData => write!(f, "incomplete node data after reconnect"),
            Error::Write { node_id, status } => {
                write!(f, "write rejected for node {node_id}: {status}")
            }
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
