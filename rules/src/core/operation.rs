use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::RuleError;

/// Comparison a leaf rule performs between the extracted value and its
/// configured values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// `value == Value1`.
    EqualTo,
    /// `value != Value1`.
    NotEqualTo,
    /// `value > Value1`.
    GreaterThan,
    /// `value < Value1`.
    LessThan,
    /// `Value2 < value < Value1`; `Value1` is the upper bound.
    InBetween,
    /// `value < Value2 || value > Value1`; `Value1` is the upper bound.
    OutsideOf,
    /// Case-insensitive substring match against `Value1`.
    Contains,
    /// Negation of [`Operation::Contains`].
    DoesNotContain,
}

/// Operations legal on numeric and date/time rules.
pub const ORDERED_OPERATIONS: &[Operation] = &[
    Operation::EqualTo,
    Operation::NotEqualTo,
    Operation::GreaterThan,
    Operation::LessThan,
    Operation::InBetween,
    Operation::OutsideOf,
];

/// Operations legal on text rules.
pub const TEXT_OPERATIONS: &[Operation] = &[Operation::Contains, Operation::DoesNotContain];

impl Operation {
    /// Every operation, in declaration order.
    pub const ALL: [Operation; 8] = [
        Operation::EqualTo,
        Operation::NotEqualTo,
        Operation::GreaterThan,
        Operation::LessThan,
        Operation::InBetween,
        Operation::OutsideOf,
        Operation::Contains,
        Operation::DoesNotContain,
    ];

    /// Short label shown next to the value inputs of a filter editor.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Operation::EqualTo => "=",
            Operation::NotEqualTo => "=/=",
            Operation::GreaterThan => ">",
            Operation::LessThan => "<",
            Operation::InBetween => "> X <",
            Operation::OutsideOf => "< X >",
            Operation::Contains => "Contains",
            Operation::DoesNotContain => "Does not contain",
        }
    }

    /// Stable identifier, also accepted by [`FromStr`].
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Operation::EqualTo => "EqualTo",
            Operation::NotEqualTo => "NotEqualTo",
            Operation::GreaterThan => "GreaterThan",
            Operation::LessThan => "LessThan",
            Operation::InBetween => "InBetween",
            Operation::OutsideOf => "OutsideOf",
            Operation::Contains => "Contains",
            Operation::DoesNotContain => "DoesNotContain",
        }
    }

    /// True when the operation reads `Value2` as well as `Value1`.
    #[must_use]
    pub fn uses_second_value(self) -> bool {
        matches!(self, Operation::InBetween | Operation::OutsideOf)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Operation {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.name().eq_ignore_ascii_case(s) || op.label() == s)
            .ok_or_else(|| RuleError::UnknownOperation(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_match_filter_editor_text() {
        assert_eq!(Operation::InBetween.to_string(), "> X <");
        assert_eq!(Operation::OutsideOf.to_string(), "< X >");
        assert_eq!(Operation::NotEqualTo.to_string(), "=/=");
    }

    #[test]
    fn parse_accepts_names_and_labels() {
        assert_eq!("GreaterThan".parse::<Operation>(), Ok(Operation::GreaterThan));
        assert_eq!("doesnotcontain".parse::<Operation>(), Ok(Operation::DoesNotContain));
        assert_eq!("=/=".parse::<Operation>(), Ok(Operation::NotEqualTo));
        assert_eq!(
            "Between".parse::<Operation>(),
            Err(RuleError::UnknownOperation("Between".into()))
        );
    }

    #[test]
    fn only_range_operations_use_second_value() {
        let two_valued: Vec<_> = Operation::ALL
            .into_iter()
            .filter(|op| op.uses_second_value())
            .collect();
        assert_eq!(two_valued, vec![Operation::InBetween, Operation::OutsideOf]);
    }
}
