use std::{fmt, sync::Arc};

use super::{Operation, Rule, RuleError, RuleKind, TEXT_OPERATIONS};

pub(crate) type TextExtractor<I> = Arc<dyn Fn(&I) -> String + Send + Sync>;

/// Leaf rule over text properties. Only substring operations are legal.
pub struct StringRule<I> {
    extractor: Option<TextExtractor<I>>,
    value1: Option<String>,
    selected: Option<Operation>,
}

impl<I> StringRule<I> {
    /// Creates a rule reading its text with `extractor`.
    pub fn new<F>(extractor: F) -> Self
    where
        F: Fn(&I) -> String + Send + Sync + 'static,
    {
        Self {
            extractor: Some(Arc::new(extractor)),
            ..Self::unconfigured()
        }
    }

    pub(crate) fn from_shared(extractor: TextExtractor<I>) -> Self {
        Self {
            extractor: Some(extractor),
            ..Self::unconfigured()
        }
    }

    /// Creates a rule with no extractor.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self {
            extractor: None,
            value1: None,
            selected: None,
        }
    }

    /// Replaces the property extractor.
    pub fn set_extractor<F>(&mut self, extractor: F)
    where
        F: Fn(&I) -> String + Send + Sync + 'static,
    {
        self.extractor = Some(Arc::new(extractor));
    }

    /// Selects an operation. Unsupported operations are reported by `evaluate`.
    pub fn set_selected_operation(&mut self, operation: Option<Operation>) {
        self.selected = operation;
    }

    /// Builder form of [`StringRule::set_selected_operation`].
    #[must_use]
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.selected = Some(operation);
        self
    }

    /// Builder form of [`StringRule::set_value1`].
    #[must_use]
    pub fn with_value1(mut self, value: impl Into<String>) -> Self {
        self.value1 = Some(value.into());
        self
    }

    /// Substring searched for.
    pub fn value1(&self) -> Option<&str> {
        self.value1.as_deref()
    }

    /// Sets the substring searched for.
    pub fn set_value1(&mut self, value: Option<String>) {
        self.value1 = value;
    }

    /// Text rules never read a second value.
    pub fn value2_usable(&self) -> bool {
        false
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl<I> Rule<I> for StringRule<I> {
    fn kind(&self) -> RuleKind {
        RuleKind::String
    }

    fn supported_operations(&self) -> &'static [Operation] {
        TEXT_OPERATIONS
    }

    fn selected_operation(&self) -> Option<Operation> {
        self.selected
    }

    fn evaluate(&self, input: &I) -> Result<bool, RuleError> {
        let operation = self.selected.ok_or(RuleError::NoOperationSelected {
            kind: RuleKind::String,
        })?;
        if !TEXT_OPERATIONS.contains(&operation) {
            return Err(RuleError::UnsupportedOperation {
                operation,
                kind: RuleKind::String,
            });
        }
        let extractor = self.extractor.as_ref().ok_or(RuleError::MissingExtractor {
            kind: RuleKind::String,
        })?;
        let needle = self.value1.as_deref().ok_or(RuleError::MissingValue {
            kind: RuleKind::String,
            operation,
            slot: 1,
        })?;

        let found = contains_ignore_case(&extractor(input), needle);
        Ok(match operation {
            Operation::Contains => found,
            _ => !found,
        })
    }
}

impl<I> Clone for StringRule<I> {
    fn clone(&self) -> Self {
        Self {
            extractor: self.extractor.clone(),
            value1: self.value1.clone(),
            selected: self.selected,
        }
    }
}

impl<I> fmt::Debug for StringRule<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringRule")
            .field("has_extractor", &self.extractor.is_some())
            .field("value1", &self.value1)
            .field("selected", &self.selected)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Track {
        title: String,
    }

    fn track(title: &str) -> Track {
        Track {
            title: title.to_string(),
        }
    }

    fn title_rule(operation: Operation) -> StringRule<Track> {
        StringRule::new(|t: &Track| t.title.clone())
            .with_operation(operation)
            .with_value1("MOON")
    }

    #[test]
    fn contains_ignores_case() {
        let rule = title_rule(Operation::Contains);
        assert!(rule.evaluate(&track("Blue moon rising")).unwrap());
        assert!(!rule.evaluate(&track("Sunrise")).unwrap());

        let rule = title_rule(Operation::DoesNotContain);
        assert!(!rule.evaluate(&track("Harvest Moon")).unwrap());
        assert!(rule.evaluate(&track("Sunrise")).unwrap());
    }

    #[test]
    fn ordering_operations_are_rejected() {
        for operation in [
            Operation::EqualTo,
            Operation::NotEqualTo,
            Operation::GreaterThan,
            Operation::LessThan,
            Operation::InBetween,
            Operation::OutsideOf,
        ] {
            let rule = title_rule(operation);
            assert_eq!(
                rule.evaluate(&track("moon")),
                Err(RuleError::UnsupportedOperation {
                    operation,
                    kind: RuleKind::String,
                })
            );
        }
    }

    #[test]
    fn unconfigured_extractor_is_reported() {
        let rule: StringRule<Track> = StringRule::unconfigured()
            .with_operation(Operation::Contains)
            .with_value1("a");
        assert_eq!(
            rule.evaluate(&track("a")),
            Err(RuleError::MissingExtractor {
                kind: RuleKind::String
            })
        );
    }
}
