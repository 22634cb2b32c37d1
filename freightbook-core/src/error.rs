use thiserror::Error;

#[derive(Error, Debug)]
pub enum FreightError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("authentication failed: {0}")]
    AuthFailure(String),

    #[error("write rejected: {0}")]
    WriteFailure(String),

    #[error("invalid input: {0}")]
    ValidationFailure(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl FreightError {
    /// Short message suitable for showing to the person who triggered the action.
    pub fn user_message(&self) -> String {
        match self {
            FreightError::NotFound(what) => format!("{what} was not found"),
            FreightError::AuthFailure(_) => "sign-in failed: check your email and password".into(),
            FreightError::WriteFailure(_) => "saving failed; your edits are kept, try again".into(),
            FreightError::ValidationFailure(msg) => msg.clone(),
            FreightError::PermissionDenied(_) => "your account cannot make this change".into(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for FreightError {
    fn from(e: serde_json::Error) -> Self {
        FreightError::Format(format!("document decode: {e}"))
    }
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, FreightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_message_does_not_leak_cause() {
        let e = FreightError::AuthFailure("no credential for bob@example.com".into());
        assert!(!e.user_message().contains("bob@example.com"));
    }

    #[test]
    fn validation_message_is_passed_through() {
        let e = FreightError::ValidationFailure("ship id is required".into());
        assert_eq!(e.user_message(), "ship id is required");
    }
}
