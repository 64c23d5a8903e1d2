use std::fmt;

use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use super::{RuleError, RuleKind};

/// Value type an ordered leaf rule compares.
pub trait RuleValue: Clone + PartialOrd + fmt::Debug + Send + Sync + 'static {
    /// Kind tag of rules comparing this value type.
    const KIND: RuleKind;

    /// Renders the value for persistence.
    fn serialize_value(&self) -> Result<String, RuleError>;

    /// Parses a value previously produced by [`RuleValue::serialize_value`].
    fn deserialize_value(input: &str) -> Result<Self, RuleError>;
}

impl RuleValue for f64 {
    const KIND: RuleKind = RuleKind::Numeric;

    fn serialize_value(&self) -> Result<String, RuleError> {
        Ok(self.to_string())
    }

    fn deserialize_value(input: &str) -> Result<Self, RuleError> {
        input.trim().parse().map_err(|err: std::num::ParseFloatError| {
            RuleError::InvalidValue {
                kind: Self::KIND,
                input: input.to_string(),
                reason: err.to_string(),
            }
        })
    }
}

impl RuleValue for OffsetDateTime {
    const KIND: RuleKind = RuleKind::DateTime;

    fn serialize_value(&self) -> Result<String, RuleError> {
        self.format(&Rfc3339).map_err(|err| RuleError::InvalidValue {
            kind: Self::KIND,
            input: format!("{self:?}"),
            reason: err.to_string(),
        })
    }

    fn deserialize_value(input: &str) -> Result<Self, RuleError> {
        OffsetDateTime::parse(input.trim(), &Rfc3339).map_err(|err| RuleError::InvalidValue {
            kind: Self::KIND,
            input: input.to_string(),
            reason: err.to_string(),
        })
    }
}
