use std::fmt;

use serde::Serialize;

#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    ConnectionError = 2,
    TargetError = 3,
    TimeoutError = 4,
    ProtocolError = 5,
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::GeneralError => write!(f, "general error"),
            Self::ConnectionError => write!(f, "connection error"),
            Self::TargetError => write!(f, "target error"),
            Self::TimeoutError => write!(f, "timeout error"),
            Self::ProtocolError => write!(f, "protocol error"),
        }
    }
}

#[derive(Debug)]
pub struct AppError {
    pub message: String,
    pub code: ExitCode,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// The page could not be loaded. A single navigation attempt is
    /// definitive: there is no retry.
    #[must_use]
    pub fn navigation_failed(detail: &str) -> Self {
        Self {
            message: format!("Unable to load the address: {detail}"),
            code: ExitCode::GeneralError,
        }
    }

    /// The load event did not arrive within the `--timeout` bound.
    #[must_use]
    pub fn load_timeout(timeout_ms: u64) -> Self {
        Self {
            message: format!("Page did not finish loading within {timeout_ms}ms"),
            code: ExitCode::TimeoutError,
        }
    }

    /// The engine produced a frame but it could not be written to disk.
    #[must_use]
    pub fn file_write_failed(path: &str, detail: &str) -> Self {
        Self {
            message: format!("Could not write output file '{path}': {detail}"),
            code: ExitCode::GeneralError,
        }
    }

    /// The capture command succeeded but its payload was unusable.
    #[must_use]
    pub fn capture_failed(detail: &str) -> Self {
        Self {
            message: format!("Frame capture failed: {detail}"),
            code: ExitCode::GeneralError,
        }
    }

    #[must_use]
    pub fn no_browser_found() -> Self {
        Self {
            message: "No Chrome instance found and none could be launched. \
                      Pass --chrome-path or start Chrome with --remote-debugging-port."
                .into(),
            code: ExitCode::ConnectionError,
        }
    }

    #[must_use]
    pub fn no_page_targets() -> Self {
        Self {
            message: "No page targets found in the browser and a new one could not be created."
                .into(),
            code: ExitCode::TargetError,
        }
    }

    #[must_use]
    pub fn config_invalid(path: &str, detail: &str) -> Self {
        Self {
            message: format!("Invalid configuration file '{path}': {detail}"),
            code: ExitCode::GeneralError,
        }
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        let output = ErrorOutput {
            error: &self.message,
            code: self.code as u8,
        };
        serde_json::to_string(&output).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"{}","code":{}}}"#,
                self.message, self.code as u8
            )
        })
    }

    pub fn print_json_stderr(&self) {
        eprintln!("{}", self.to_json());
    }
}

#[derive(Serialize)]
struct ErrorOutput<'a> {
    error: &'a str,
    code: u8,
}
