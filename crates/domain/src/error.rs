use thiserror::Error;
use vaultgate_core::AppError;

/// Failure to construct or decode a permission rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// Action name is not part of the scope vocabulary.
    #[error("unknown action '{0}'")]
    UnknownAction(String),

    /// Subject name is not part of the scope vocabulary.
    #[error("unknown subject '{0}'")]
    UnknownSubject(String),

    /// Action exists but is meaningless on the subject.
    #[error("action '{action}' is not supported on subject '{subject}'")]
    UnsupportedAction {
        /// Action storage name.
        action: String,
        /// Subject storage name.
        subject: String,
    },

    /// Condition references an attribute the subject does not define.
    #[error("condition field '{field}' is not defined for subject '{subject}'")]
    UnknownConditionField {
        /// Attribute name.
        field: String,
        /// Subject storage name.
        subject: String,
    },

    /// Condition operator key is not recognised.
    #[error("unknown condition operator '{0}'")]
    UnknownOperator(String),

    /// Path glob failed to compile.
    #[error("invalid glob pattern '{pattern}': {reason}")]
    InvalidGlob {
        /// Offending pattern.
        pattern: String,
        /// Compiler message.
        reason: String,
    },

    /// Temporary access fields are inconsistent.
    #[error("invalid temporary access: {0}")]
    InvalidTemporaryAccess(String),

    /// Structural problem in a stored or submitted rule.
    #[error("malformed rule: {0}")]
    MalformedRule(String),

    /// Error located at a position inside a rule list.
    #[error("rule {index}: {source}")]
    AtIndex {
        /// Zero-based rule position.
        index: usize,
        /// Underlying error.
        #[source]
        source: Box<RuleError>,
    },
}

impl RuleError {
    pub(crate) fn at(self, index: usize) -> Self {
        Self::AtIndex {
            index,
            source: Box::new(self),
        }
    }
}

impl From<RuleError> for AppError {
    fn from(error: RuleError) -> Self {
        AppError::Validation(error.to_string())
    }
}
