use thiserror::Error;

/// A message event or query that is missing a required field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("sender is required")]
    MissingSender,
    #[error("receiver is required")]
    MissingReceiver,
    #[error("message body must not be empty")]
    EmptyBody,
}

/// Blank (empty or whitespace-only) identifiers count as missing.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
