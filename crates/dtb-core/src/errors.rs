use std::fmt;

/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so the mediator and
/// the translation handler can branch on the failure category (capability gap
/// vs operational failure vs cancellation) without inspecting foreign types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("validation failed: {0}")]
    Validation(ValidationError),

    #[error("no handler registered for {0}")]
    HandlerNotFound(&'static str),

    #[error("more than one handler registered for {0}")]
    DuplicateHandler(&'static str),

    /// The provider can't translate into any of the country's languages.
    /// The message is user-facing.
    #[error("{0}")]
    LanguageNotSupportedForCountry(String),

    /// The provider doesn't know a requested language code or name.
    /// The message is user-facing.
    #[error("{0}")]
    LanguageNotSupported(String),

    #[error("{} notification handler(s) failed", .0.len())]
    Publish(Vec<HandlerFault>),

    #[error("operation cancelled")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// The user-facing message of a capability gap, `None` for every other error.
    pub fn unsupported_language_message(&self) -> Option<&str> {
        match self {
            Error::LanguageNotSupportedForCountry(m) | Error::LanguageNotSupported(m) => Some(m),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A single failed validation rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationFailure {
    pub field: String,
    pub message: String,
}

/// All rule failures for one request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationError {
    pub failures: Vec<ValidationFailure>,
}

impl ValidationError {
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self
            .failures
            .iter()
            .map(|v| format!("{}: {}", v.field, v.message))
            .collect::<Vec<_>>();
        f.write_str(&parts.join("; "))
    }
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut failures = Vec::new();
        for (field, errs) in errors.field_errors() {
            for e in errs.iter() {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                failures.push(ValidationFailure {
                    field: field.to_string(),
                    message,
                });
            }
        }
        // HashMap iteration order is unstable.
        failures.sort_by(|a, b| a.field.cmp(&b.field).then(a.message.cmp(&b.message)));
        Self { failures }
    }
}

/// A notification handler that failed during `publish`.
#[derive(Debug)]
pub struct HandlerFault {
    pub handler: &'static str,
    pub error: Error,
}
