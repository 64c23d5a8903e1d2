use serde::{Deserialize, Serialize};

use super::Operation;

/// Persisted form of a configured rule tree.
///
/// Values are stored as the text produced by the leaf rule's value
/// serializer, so a document stays readable and independent of the
/// in-memory value types.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RuleConfig {
    /// A leaf rule evaluating a named property.
    Property {
        /// Selected property name.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        property: Option<String>,
        /// Selected operation.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operation: Option<Operation>,
        /// First value (single operand or upper bound).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value1: Option<String>,
        /// Second value (lower bound).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value2: Option<String>,
    },
    /// Conjunction of two configured children.
    And {
        /// Left child.
        first: Box<RuleConfig>,
        /// Right child.
        second: Box<RuleConfig>,
    },
    /// Disjunction of two configured children.
    Or {
        /// Left child.
        first: Box<RuleConfig>,
        /// Right child.
        second: Box<RuleConfig>,
    },
}

impl RuleConfig {
    /// Short name of the node shape, used in mismatch errors.
    #[must_use]
    pub fn shape(&self) -> &'static str {
        match self {
            RuleConfig::Property { .. } => "property",
            RuleConfig::And { .. } => "and",
            RuleConfig::Or { .. } => "or",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_are_tagged_and_sparse() {
        let config = RuleConfig::And {
            first: Box::new(RuleConfig::Property {
                property: Some("Score".into()),
                operation: Some(Operation::GreaterThan),
                value1: Some("1".into()),
                value2: None,
            }),
            second: Box::new(RuleConfig::Property {
                property: None,
                operation: None,
                value1: None,
                value2: None,
            }),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(
            json,
            r#"{"rule":"and","first":{"rule":"property","property":"Score","operation":"greater_than","value1":"1"},"second":{"rule":"property"}}"#
        );
        let back: RuleConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
