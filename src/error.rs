/// Error types for VM management operations.
use thiserror::Error;

/// Error code the Web API returns when a session id is no longer valid.
pub const SESSION_EXPIRED_CODE: i64 = 105;

#[derive(Error, Debug)]
pub enum Error {
    /// Required connection settings are missing or invalid
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No usable SSH credential, all keys rejected, or the Web API refused
    /// the login (`code` is the API error code)
    #[error("authentication failed: {reason}{}", code_suffix(.code))]
    Authentication { reason: String, code: Option<i64> },

    /// TCP connect or SSH handshake failed
    #[error("connection failed: {0}")]
    Connection(String),

    /// Remote command could not be run or exited non-zero
    #[error("command '{command}' failed{}: {stderr}", exit_suffix(.status))]
    Command {
        command: String,
        /// `None` when no exit status was reported
        status: Option<u32>,
        stderr: String,
    },

    /// Web API call completed but reported failure
    #[error("API call failed with error code {code}")]
    Api { code: i64 },

    /// Non-success HTTP status
    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to decode API response: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid VM configuration
    #[error("invalid VM configuration: {0}")]
    Validation(String),

    /// Operation not available over the SSH transport
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn code_suffix(code: &Option<i64>) -> String {
    match code {
        Some(code) => format!(" (error code {})", code),
        None => String::new(),
    }
}

fn exit_suffix(status: &Option<u32>) -> String {
    match status {
        Some(code) => format!(" (exit status {})", code),
        None => String::new(),
    }
}

impl Error {
    pub fn authentication<S: Into<String>>(reason: S) -> Self {
        Self::Authentication {
            reason: reason.into(),
            code: None,
        }
    }

    /// Prefix the message with the operation that failed, keeping the error kind.
    pub fn context(self, what: &str) -> Self {
        match self {
            Self::Configuration(msg) => Self::Configuration(format!("{}: {}", what, msg)),
            Self::Authentication { reason, code } => Self::Authentication {
                reason: format!("{}: {}", what, reason),
                code,
            },
            Self::Connection(msg) => Self::Connection(format!("{}: {}", what, msg)),
            Self::Command {
                command,
                status,
                stderr,
            } => Self::Command {
                command: format!("{} ({})", command, what),
                status,
                stderr,
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_keeps_error_kind() {
        let err = Error::Command {
            command: "virsh list --all".into(),
            status: Some(1),
            stderr: "error: failed to connect".into(),
        }
        .context("failed to list VMs");

        match err {
            Error::Command {
                command,
                status,
                stderr,
            } => {
                assert_eq!(command, "virsh list --all (failed to list VMs)");
                assert_eq!(status, Some(1));
                assert_eq!(stderr, "error: failed to connect");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn command_error_message() {
        let err = Error::Command {
            command: "virsh start web".into(),
            status: Some(1),
            stderr: "error: domain not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "command 'virsh start web' failed (exit status 1): error: domain not found"
        );

        let err = Error::Command {
            command: "virsh start web".into(),
            status: None,
            stderr: "channel closed".into(),
        };
        assert_eq!(err.to_string(), "command 'virsh start web' failed: channel closed");
    }

    #[test]
    fn authentication_error_message() {
        let err = Error::Authentication {
            reason: "login rejected".into(),
            code: Some(400),
        };
        assert_eq!(err.to_string(), "authentication failed: login rejected (error code 400)");

        let err = Error::authentication("server rejected all keys for user admin")
            .context("failed to list VMs");
        assert_eq!(
            err.to_string(),
            "authentication failed: failed to list VMs: server rejected all keys for user admin"
        );
    }
}
