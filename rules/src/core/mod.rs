mod comparison;
mod composite;
mod config;
mod error;
mod operation;
mod property;
mod text;
mod tree;
mod value;

use std::fmt;

pub use comparison::{ComparisonRule, DateTimeRule, NumericRule};
pub use composite::{CompositeRule, Junction};
pub use config::RuleConfig;
pub use error::RuleError;
pub use operation::{Operation, ORDERED_OPERATIONS, TEXT_OPERATIONS};
pub use property::{LeafRule, Property, PropertyCatalog, PropertyRule};
pub use text::StringRule;
pub use tree::RuleTree;
pub use value::RuleValue;

/// Kind tag of a rule node, naming the value type it evaluates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// Compares date/time values.
    DateTime,
    /// Compares numeric values.
    Numeric,
    /// Matches text values.
    String,
    /// Conjunction of two child rules.
    And,
    /// Disjunction of two child rules.
    Or,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RuleKind::DateTime => "date/time",
            RuleKind::Numeric => "numeric",
            RuleKind::String => "string",
            RuleKind::And => "and",
            RuleKind::Or => "or",
        })
    }
}

/// A boolean condition over an input of type `I`.
pub trait Rule<I> {
    /// Kind tag of this node.
    fn kind(&self) -> RuleKind;

    /// Operations this node accepts as its selected operation.
    fn supported_operations(&self) -> &'static [Operation];

    /// Currently selected operation, if any.
    fn selected_operation(&self) -> Option<Operation>;

    /// Evaluates the condition against `input`.
    fn evaluate(&self, input: &I) -> Result<bool, RuleError>;
}

impl<I, R> Rule<I> for Box<R>
where
    R: Rule<I> + ?Sized,
{
    fn kind(&self) -> RuleKind {
        (**self).kind()
    }

    fn supported_operations(&self) -> &'static [Operation] {
        (**self).supported_operations()
    }

    fn selected_operation(&self) -> Option<Operation> {
        (**self).selected_operation()
    }

    fn evaluate(&self, input: &I) -> Result<bool, RuleError> {
        (**self).evaluate(input)
    }
}

/// A rule whose target property and values can be configured and persisted.
///
/// Composite rules require their children to implement this, so any
/// configurable rule (including another composite) can be nested.
pub trait ConfigurableRule<I>: Rule<I> {
    /// Names of the properties this rule can be pointed at.
    fn evaluation_options(&self) -> Vec<String> {
        Vec::new()
    }

    /// Name of the property currently evaluated, if one is selected.
    fn selected_evaluation_option(&self) -> Option<&str> {
        None
    }

    /// Captures the current configuration.
    fn to_config(&self) -> Result<RuleConfig, RuleError>;

    /// Replaces the current configuration with `config`.
    fn apply_config(&mut self, config: &RuleConfig) -> Result<(), RuleError>;

    /// Serializes the configuration to a JSON document.
    fn serialize(&self) -> Result<String, RuleError> {
        Ok(serde_json::to_string(&self.to_config()?)?)
    }

    /// Restores the configuration from a document produced by [`ConfigurableRule::serialize`].
    fn deserialize(&mut self, input: &str) -> Result<(), RuleError> {
        let config: RuleConfig = serde_json::from_str(input)?;
        self.apply_config(&config)
    }
}
