use std::fmt;

/// Errors that can occur while finding, launching, or probing a browser.
#[derive(Debug)]
pub enum ChromeError {
    /// No browser executable was found on the system.
    NotFound(String),

    /// The browser process failed to launch.
    LaunchFailed(String),

    /// The browser did not start accepting connections within the timeout.
    StartupTimeout {
        /// The port the browser was expected to listen on.
        port: u16,
    },

    /// HTTP request to the browser's debug endpoint failed.
    HttpError(String),

    /// A response from the browser could not be parsed.
    ParseError(String),

    /// No running browser instance could be discovered.
    NotRunning(String),

    /// An I/O error occurred.
    Io(std::io::Error),
}

impl fmt::Display for ChromeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "Chrome not found: {msg}"),
            Self::LaunchFailed(msg) => write!(f, "Chrome launch failed: {msg}"),
            Self::StartupTimeout { port } => {
                write!(f, "Chrome startup timed out on port {port}")
            }
            Self::HttpError(msg) => write!(f, "Chrome HTTP error: {msg}"),
            Self::ParseError(msg) => write!(f, "Chrome parse error: {msg}"),
            Self::NotRunning(detail) => {
                write!(
                    f,
                    "no running Chrome instance found with remote debugging: {detail}"
                )
            }
            Self::Io(e) => write!(f, "Chrome I/O error: {e}"),
        }
    }
}

impl std::error::Error for ChromeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ChromeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ChromeError> for crate::error::AppError {
    fn from(e: ChromeError) -> Self {
        use crate::error::ExitCode;
        let code = match &e {
            ChromeError::NotFound(_) | ChromeError::ParseError(_) | ChromeError::Io(_) => {
                ExitCode::GeneralError
            }
            ChromeError::LaunchFailed(_)
            | ChromeError::HttpError(_)
            | ChromeError::NotRunning(_) => ExitCode::ConnectionError,
            ChromeError::StartupTimeout { .. } => ExitCode::TimeoutError,
        };
        Self {
            message: e.to_string(),
            code,
        }
    }
}
