use std::{fmt, sync::Arc};

use time::OffsetDateTime;

use super::{Operation, Rule, RuleError, RuleKind, RuleValue, ORDERED_OPERATIONS};

pub(crate) type Extractor<I, V> = Arc<dyn Fn(&I) -> Option<V> + Send + Sync>;

/// Leaf rule over an ordered value: numbers or date/times.
///
/// `value1` is the operand of single-value operations and the *upper* bound of
/// [`Operation::InBetween`] / [`Operation::OutsideOf`]; `value2` is the lower
/// bound. Persisted filters rely on this convention.
pub struct ComparisonRule<I, V> {
    extractor: Option<Extractor<I, V>>,
    value1: Option<V>,
    value2: Option<V>,
    selected: Option<Operation>,
    value2_usable: bool,
}

/// Leaf rule over numeric properties.
pub type NumericRule<I> = ComparisonRule<I, f64>;

/// Leaf rule over date/time properties.
pub type DateTimeRule<I> = ComparisonRule<I, OffsetDateTime>;

impl<I, V> ComparisonRule<I, V>
where
    V: RuleValue,
{
    /// Creates a rule reading its value with `extractor`.
    pub fn new<F>(extractor: F) -> Self
    where
        F: Fn(&I) -> V + Send + Sync + 'static,
    {
        Self::from_optional(move |input| Some(extractor(input)))
    }

    /// Creates a rule over a property that may be absent; absent values never match.
    pub fn from_optional<F>(extractor: F) -> Self
    where
        F: Fn(&I) -> Option<V> + Send + Sync + 'static,
    {
        Self {
            extractor: Some(Arc::new(extractor)),
            ..Self::unconfigured()
        }
    }

    pub(crate) fn from_shared(extractor: Extractor<I, V>) -> Self {
        Self {
            extractor: Some(extractor),
            ..Self::unconfigured()
        }
    }

    /// Creates a rule with no extractor; it must be given one before evaluation.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self {
            extractor: None,
            value1: None,
            value2: None,
            selected: None,
            value2_usable: false,
        }
    }

    /// Replaces the property extractor.
    pub fn set_extractor<F>(&mut self, extractor: F)
    where
        F: Fn(&I) -> Option<V> + Send + Sync + 'static,
    {
        self.extractor = Some(Arc::new(extractor));
    }

    /// Selects an operation and reconfigures the value inputs for it.
    ///
    /// Unsupported operations are accepted here and reported by `evaluate`.
    pub fn set_selected_operation(&mut self, operation: Option<Operation>) {
        self.selected = operation;
        self.configure_for_selected_operation();
    }

    /// Builder form of [`ComparisonRule::set_selected_operation`].
    #[must_use]
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.set_selected_operation(Some(operation));
        self
    }

    /// Builder form of [`ComparisonRule::set_value1`].
    #[must_use]
    pub fn with_value1(mut self, value: V) -> Self {
        self.value1 = Some(value);
        self
    }

    /// Builder form of [`ComparisonRule::set_value2`].
    #[must_use]
    pub fn with_value2(mut self, value: V) -> Self {
        self.value2 = Some(value);
        self
    }

    /// Recomputes whether the second value input applies to the selected operation.
    pub fn configure_for_selected_operation(&mut self) {
        self.value2_usable = matches!(
            self.selected,
            Some(op) if op.uses_second_value() && ORDERED_OPERATIONS.contains(&op)
        );
    }

    /// First value (single operand, or upper bound).
    pub fn value1(&self) -> Option<&V> {
        self.value1.as_ref()
    }

    /// Sets the first value.
    pub fn set_value1(&mut self, value: Option<V>) {
        self.value1 = value;
    }

    /// Second value (lower bound).
    pub fn value2(&self) -> Option<&V> {
        self.value2.as_ref()
    }

    /// Sets the second value.
    pub fn set_value2(&mut self, value: Option<V>) {
        self.value2 = value;
    }

    /// Whether the selected operation reads the second value.
    pub fn value2_usable(&self) -> bool {
        self.value2_usable
    }

    /// Renders a value of this rule's type for persistence.
    pub fn serialize_value(&self, value: &V) -> Result<String, RuleError> {
        value.serialize_value()
    }

    /// Parses a persisted value of this rule's type.
    pub fn deserialize_value(&self, input: &str) -> Result<V, RuleError> {
        V::deserialize_value(input)
    }

    fn required(&self, slot: u8, operation: Operation) -> Result<&V, RuleError> {
        let value = if slot == 1 {
            self.value1.as_ref()
        } else {
            self.value2.as_ref()
        };
        value.ok_or(RuleError::MissingValue {
            kind: V::KIND,
            operation,
            slot,
        })
    }
}

impl<I, V> Rule<I> for ComparisonRule<I, V>
where
    V: RuleValue,
{
    fn kind(&self) -> RuleKind {
        V::KIND
    }

    fn supported_operations(&self) -> &'static [Operation] {
        ORDERED_OPERATIONS
    }

    fn selected_operation(&self) -> Option<Operation> {
        self.selected
    }

    fn evaluate(&self, input: &I) -> Result<bool, RuleError> {
        let operation = self
            .selected
            .ok_or(RuleError::NoOperationSelected { kind: V::KIND })?;
        if !ORDERED_OPERATIONS.contains(&operation) {
            return Err(RuleError::UnsupportedOperation {
                operation,
                kind: V::KIND,
            });
        }
        let extractor = self
            .extractor
            .as_ref()
            .ok_or(RuleError::MissingExtractor { kind: V::KIND })?;

        let Some(value) = extractor(input) else {
            return Ok(false);
        };

        let upper = self.required(1, operation)?;
        Ok(match operation {
            Operation::EqualTo => value == *upper,
            Operation::NotEqualTo => value != *upper,
            Operation::GreaterThan => value > *upper,
            Operation::LessThan => value < *upper,
            Operation::InBetween => {
                let lower = self.required(2, operation)?;
                *lower < value && value < *upper
            }
            Operation::OutsideOf => {
                let lower = self.required(2, operation)?;
                value < *lower || value > *upper
            }
            Operation::Contains | Operation::DoesNotContain => {
                unreachable!("text operations rejected above")
            }
        })
    }
}

impl<I, V: Clone> Clone for ComparisonRule<I, V> {
    fn clone(&self) -> Self {
        Self {
            extractor: self.extractor.clone(),
            value1: self.value1.clone(),
            value2: self.value2.clone(),
            selected: self.selected,
            value2_usable: self.value2_usable,
        }
    }
}

impl<I, V: fmt::Debug> fmt::Debug for ComparisonRule<I, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComparisonRule")
            .field("has_extractor", &self.extractor.is_some())
            .field("value1", &self.value1)
            .field("value2", &self.value2)
            .field("selected", &self.selected)
            .field("value2_usable", &self.value2_usable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    struct Reading {
        level: Option<f64>,
        at: OffsetDateTime,
    }

    fn reading(level: f64) -> Reading {
        Reading {
            level: Some(level),
            at: datetime!(2024-01-01 00:00 UTC),
        }
    }

    fn level_rule() -> NumericRule<Reading> {
        NumericRule::from_optional(|r: &Reading| r.level)
    }

    #[test]
    fn single_value_comparisons() {
        let gt = level_rule()
            .with_operation(Operation::GreaterThan)
            .with_value1(1.0);
        assert!(!gt.evaluate(&reading(1.0)).unwrap());
        assert!(gt.evaluate(&reading(2.0)).unwrap());

        let ne = level_rule()
            .with_operation(Operation::NotEqualTo)
            .with_value1(3.0);
        assert!(ne.evaluate(&reading(2.0)).unwrap());
        assert!(!ne.evaluate(&reading(3.0)).unwrap());
    }

    #[test]
    fn value1_is_upper_bound_of_ranges() {
        let between = level_rule()
            .with_operation(Operation::InBetween)
            .with_value1(10.0)
            .with_value2(0.0);
        assert!(between.evaluate(&reading(5.0)).unwrap());
        assert!(!between.evaluate(&reading(0.0)).unwrap());
        assert!(!between.evaluate(&reading(10.0)).unwrap());
        assert!(!between.evaluate(&reading(11.0)).unwrap());
    }

    #[test]
    fn between_and_outside_are_complementary_off_the_bounds() {
        let between = level_rule()
            .with_operation(Operation::InBetween)
            .with_value1(10.0)
            .with_value2(-4.0);
        let outside = level_rule()
            .with_operation(Operation::OutsideOf)
            .with_value1(10.0)
            .with_value2(-4.0);
        for step in -40..=40 {
            let v = f64::from(step) * 0.5 + 0.25;
            let a = between.evaluate(&reading(v)).unwrap();
            let b = outside.evaluate(&reading(v)).unwrap();
            assert!(a ^ b, "value {v} matched both or neither");
        }
    }

    #[test]
    fn absent_property_never_matches() {
        let rule = level_rule()
            .with_operation(Operation::NotEqualTo)
            .with_value1(1.0);
        let empty = Reading {
            level: None,
            at: datetime!(2024-01-01 00:00 UTC),
        };
        assert!(!rule.evaluate(&empty).unwrap());
    }

    #[test]
    fn text_operations_are_rejected() {
        let rule = level_rule()
            .with_operation(Operation::Contains)
            .with_value1(1.0);
        assert_eq!(
            rule.evaluate(&reading(1.0)),
            Err(RuleError::UnsupportedOperation {
                operation: Operation::Contains,
                kind: RuleKind::Numeric,
            })
        );
        assert!(!rule.value2_usable());
    }

    #[test]
    fn missing_configuration_is_reported() {
        let rule: NumericRule<Reading> = NumericRule::unconfigured().with_operation(Operation::LessThan);
        assert_eq!(
            rule.evaluate(&reading(1.0)),
            Err(RuleError::MissingExtractor {
                kind: RuleKind::Numeric
            })
        );

        let rule = level_rule();
        assert_eq!(
            rule.evaluate(&reading(1.0)),
            Err(RuleError::NoOperationSelected {
                kind: RuleKind::Numeric
            })
        );

        let rule = level_rule()
            .with_operation(Operation::InBetween)
            .with_value1(4.0);
        assert!(rule.value2_usable());
        assert_eq!(
            rule.evaluate(&reading(1.0)),
            Err(RuleError::MissingValue {
                kind: RuleKind::Numeric,
                operation: Operation::InBetween,
                slot: 2,
            })
        );
    }

    #[test]
    fn date_rules_compare_instants() {
        let rule = DateTimeRule::new(|r: &Reading| r.at)
            .with_operation(Operation::LessThan)
            .with_value1(datetime!(2024-06-01 00:00 UTC));
        assert_eq!(rule.kind(), RuleKind::DateTime);
        assert!(rule.evaluate(&reading(0.0)).unwrap());
    }
}
