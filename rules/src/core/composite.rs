use std::{fmt, marker::PhantomData};

use super::{ConfigurableRule, Operation, Rule, RuleConfig, RuleError, RuleKind};

/// How a composite rule joins its children.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Junction {
    /// Both children must match.
    And,
    /// At least one child must match.
    Or,
}

impl Junction {
    fn kind(self) -> RuleKind {
        match self {
            Junction::And => RuleKind::And,
            Junction::Or => RuleKind::Or,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Junction::And => "and",
            Junction::Or => "or",
        }
    }
}

/// AND/OR node over two configurable child rules.
///
/// The selected operation is stored for UI round-trips but never consulted:
/// evaluation always delegates to the children, short-circuiting left to right.
pub struct CompositeRule<I, C> {
    junction: Junction,
    first: C,
    second: C,
    selected: Option<Operation>,
    _input: PhantomData<fn(&I)>,
}

impl<I, C> CompositeRule<I, C>
where
    C: ConfigurableRule<I>,
{
    /// Creates a conjunction of two children.
    pub fn and(first: C, second: C) -> Self {
        Self::new(Junction::And, first, second)
    }

    /// Creates a disjunction of two children.
    pub fn or(first: C, second: C) -> Self {
        Self::new(Junction::Or, first, second)
    }

    /// Creates a composite whose children are produced by `factory`.
    pub fn from_factory<F>(junction: Junction, mut factory: F) -> Self
    where
        F: FnMut() -> C,
    {
        let first = factory();
        let second = factory();
        Self::new(junction, first, second)
    }

    /// Creates a composite with an explicit junction.
    pub fn new(junction: Junction, first: C, second: C) -> Self {
        Self {
            junction,
            first,
            second,
            selected: Some(Operation::EqualTo),
            _input: PhantomData,
        }
    }

    /// How the children are joined.
    pub fn junction(&self) -> Junction {
        self.junction
    }

    /// Left child.
    pub fn first(&self) -> &C {
        &self.first
    }

    /// Mutable left child.
    pub fn first_mut(&mut self) -> &mut C {
        &mut self.first
    }

    /// Right child.
    pub fn second(&self) -> &C {
        &self.second
    }

    /// Mutable right child.
    pub fn second_mut(&mut self) -> &mut C {
        &mut self.second
    }

    /// Stores a selected operation; it has no effect on evaluation.
    pub fn set_selected_operation(&mut self, operation: Option<Operation>) {
        self.selected = operation;
    }
}

impl<I, C> Rule<I> for CompositeRule<I, C>
where
    C: ConfigurableRule<I>,
{
    fn kind(&self) -> RuleKind {
        self.junction.kind()
    }

    fn supported_operations(&self) -> &'static [Operation] {
        &[]
    }

    fn selected_operation(&self) -> Option<Operation> {
        self.selected
    }

    fn evaluate(&self, input: &I) -> Result<bool, RuleError> {
        Ok(match self.junction {
            Junction::And => self.first.evaluate(input)? && self.second.evaluate(input)?,
            Junction::Or => self.first.evaluate(input)? || self.second.evaluate(input)?,
        })
    }
}

impl<I, C> ConfigurableRule<I> for CompositeRule<I, C>
where
    C: ConfigurableRule<I>,
{
    fn to_config(&self) -> Result<RuleConfig, RuleError> {
        let first = Box::new(self.first.to_config()?);
        let second = Box::new(self.second.to_config()?);
        Ok(match self.junction {
            Junction::And => RuleConfig::And { first, second },
            Junction::Or => RuleConfig::Or { first, second },
        })
    }

    fn apply_config(&mut self, config: &RuleConfig) -> Result<(), RuleError> {
        let (first, second) = match (self.junction, config) {
            (Junction::And, RuleConfig::And { first, second })
            | (Junction::Or, RuleConfig::Or { first, second }) => (first, second),
            (junction, other) => {
                return Err(RuleError::ConfigMismatch {
                    expected: junction.name(),
                    found: other.shape(),
                })
            }
        };
        self.first.apply_config(first)?;
        self.second.apply_config(second)
    }
}

impl<I, C: Clone> Clone for CompositeRule<I, C> {
    fn clone(&self) -> Self {
        Self {
            junction: self.junction,
            first: self.first.clone(),
            second: self.second.clone(),
            selected: self.selected,
            _input: PhantomData,
        }
    }
}

impl<I, C: fmt::Debug> fmt::Debug for CompositeRule<I, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeRule")
            .field("junction", &self.junction)
            .field("first", &self.first)
            .field("second", &self.second)
            .finish()
    }
}
