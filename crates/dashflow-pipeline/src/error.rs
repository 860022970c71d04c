//! Error types for the pipeline stages
//!
//! None of these escape a pipeline run: fetch errors fall back to the item's
//! default value, path and transform errors are logged and recovered. They
//! exist so each stage can be tested on its own and so traces can say what
//! went wrong.

use dashflow_types::Transform;

/// Per-item fetch failures
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Transport-level HTTP failure
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status code
    #[error("http {status} from {url}")]
    Status { status: u16, url: String },

    /// URL could not be parsed
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Header name or value rejected
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// WebSocket failure
    #[error("socket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Socket closed before sending a data frame
    #[error("socket closed before first frame")]
    SocketClosed,

    /// No response in time
    #[error("fetch timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// Script evaluation failed
    #[error("script failed: {0}")]
    Script(#[from] ExprError),
}

impl FetchError {
    /// Check if a retry could plausibly succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(err) => err.is_timeout() || err.is_connect(),
            Self::Status { status, .. } => *status >= 500,
            Self::Socket(_) | Self::SocketClosed | Self::Timeout { .. } => true,
            Self::InvalidUrl(_) | Self::InvalidHeader(_) | Self::Script(_) => false,
        }
    }
}

/// Filter path syntax errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Nothing to parse
    #[error("empty path")]
    Empty,

    /// Character not valid at this position
    #[error("unexpected '{ch}' at position {position}")]
    UnexpectedChar { ch: char, position: usize },

    /// `[` without matching `]`
    #[error("unclosed bracket at position {position}")]
    UnclosedBracket { position: usize },

    /// Bracket contents are not an index, `*` or quoted key
    #[error("invalid selector: [{0}]")]
    InvalidSelector(String),
}

/// Expression parse and evaluation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    /// Syntax error
    #[error("parse error at {position}: {message}")]
    Parse { position: usize, message: String },

    /// Input ended mid-expression
    #[error("unexpected end of expression")]
    UnexpectedEnd,

    /// Call to a function that does not exist
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("{name} expects {expected} argument(s), got {actual}")]
    Arity {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Operand types do not fit the operator
    #[error("type mismatch in '{op}': {detail}")]
    TypeMismatch { op: String, detail: String },

    /// Division or remainder by zero
    #[error("division by zero")]
    DivisionByZero,

    /// Result is NaN or infinite
    #[error("result is not a finite number")]
    NonFinite,
}

/// Type coercion failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot convert {found} to {target}")]
pub struct TransformError {
    pub target: Transform,
    pub found: &'static str,
}
