use thiserror::Error;

use super::{Operation, RuleKind};

/// Failures raised while configuring or evaluating rules.
///
/// None of these are recoverable at the call site: they indicate a rule that
/// was wired up incorrectly, not a property of the evaluated input.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuleError {
    /// The selected operation is not legal for the rule kind.
    #[error("operation {operation:?} is not supported by {kind} rules")]
    UnsupportedOperation {
        /// Requested operation.
        operation: Operation,
        /// Kind of the rule it was requested on.
        kind: RuleKind,
    },
    /// `evaluate` was called before a property extractor was set.
    #[error("{kind} rule has no property extractor configured")]
    MissingExtractor {
        /// Kind of the unconfigured rule.
        kind: RuleKind,
    },
    /// `evaluate` was called before an operation was selected.
    #[error("{kind} rule has no operation selected")]
    NoOperationSelected {
        /// Kind of the unconfigured rule.
        kind: RuleKind,
    },
    /// The selected operation needs a value slot that is unset.
    #[error("{kind} rule operation {operation:?} requires value {slot}")]
    MissingValue {
        /// Kind of the rule.
        kind: RuleKind,
        /// Operation being evaluated.
        operation: Operation,
        /// Value slot (1 or 2) that is missing.
        slot: u8,
    },
    /// A persisted value could not be parsed for the rule kind.
    #[error("invalid {kind} value '{input}': {reason}")]
    InvalidValue {
        /// Kind of the rule parsing the value.
        kind: RuleKind,
        /// Offending text.
        input: String,
        /// Parser message.
        reason: String,
    },
    /// An operation name could not be parsed.
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),
    /// No property with this name is registered in the catalog.
    #[error("unknown property '{0}'")]
    UnknownProperty(String),
    /// A property rule was evaluated before a property was selected.
    #[error("no property selected for rule")]
    NoPropertySelected,
    /// A persisted configuration does not match the shape of the rule it is applied to.
    #[error("rule configuration mismatch: expected {expected}, found {found}")]
    ConfigMismatch {
        /// Shape the rule expects.
        expected: &'static str,
        /// Shape found in the configuration.
        found: &'static str,
    },
    /// The configuration document could not be encoded or decoded.
    #[error("rule configuration encoding error: {0}")]
    Encoding(String),
}

impl From<serde_json::Error> for RuleError {
    fn from(err: serde_json::Error) -> Self {
        RuleError::Encoding(err.to_string())
    }
}
