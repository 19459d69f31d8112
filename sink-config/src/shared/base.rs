use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// A field holds a value outside its allowed range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// Two audit columns were configured with the same name.
    #[error("audit column `{0}` is configured more than once")]
    DuplicateAuditColumn(String),
}
