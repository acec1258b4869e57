use std::fmt;

#[derive(Debug)]
pub enum Error {
    InvalidConfiguration(String),
    AuthenticationFailed(String),
    Http(reqwest::Error),
    HttpStatus(u16),
    DeviceRejected(String),
    Parse(String),
    ControlFailed { property: String, source: Box<Error> },
    Io(std::io::Error),
}

impl Error {
    /// Transport-level failure: the device could not be reached or answered
    /// with a non-2xx status and no parseable envelope.
    pub fn is_unreachable(&self) -> bool {
        match self {
            Error::Http(_) | Error::HttpStatus(_) => true,
            Error::ControlFailed { source, .. } => source.is_unreachable(),
            _ => false,
        }
    }

    pub(crate) fn is_token_rejected(&self) -> bool {
        match self {
            Error::DeviceRejected(msg) => {
                let msg = msg.to_ascii_lowercase();
                msg.contains("invalid token") || msg.contains("token expired")
            }
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfiguration(msg) => write!(f, "invalid configuration: {msg}"),
            Error::AuthenticationFailed(msg) => write!(f, "authentication failed: {msg}"),
            Error::Http(e) => write!(f, "device unreachable: {e}"),
            Error::HttpStatus(status) => write!(f, "device unreachable: HTTP {status}"),
            Error::DeviceRejected(msg) => write!(f, "device rejected request: {msg}"),
            Error::Parse(msg) => write!(f, "parse error: {msg}"),
            Error::ControlFailed { property, source } => {
                write!(f, "control of {property} failed: {source}")
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
            Error::ControlFailed { source, .. } => Some(source.as_ref()),
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
