use thiserror::Error;

/// Failures surfaced by the plan engine.
///
/// Every variant leaves the in-memory plan in its last-known-good state.
#[derive(Error, Debug)]
pub enum PlanError {
    /// Malformed coordinate or out-of-range item index; the mutation was rejected.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Structured or legacy plan file could not be parsed.
    #[error("{}", format_parse(.line, .message))]
    Parse {
        line: Option<usize>,
        message: String,
    },

    /// Structured plan file written by a newer (or unknown) major format version.
    #[error("unsupported plan version {found} (supported major version {supported})")]
    Version { found: String, supported: u32 },

    /// Load/send failure reported by the vehicle link.
    #[error("vehicle sync failed: {0}")]
    Sync(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PlanResult<T> = Result<T, PlanError>;

impl PlanError {
    pub fn validation(message: impl Into<String>) -> Self {
        PlanError::Validation(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        PlanError::Parse {
            line: None,
            message: message.into(),
        }
    }

    pub fn parse_at(line: usize, message: impl Into<String>) -> Self {
        PlanError::Parse {
            line: Some(line),
            message: message.into(),
        }
    }
}

fn format_parse(line: &Option<usize>, message: &str) -> String {
    match line {
        Some(line) => format!("parse error on line {line}: {message}"),
        None => format!("parse error: {message}"),
    }
}
