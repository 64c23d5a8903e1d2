use std::{fmt, sync::Arc};

use super::{
    CompositeRule, ConfigurableRule, Junction, Operation, PropertyCatalog, PropertyRule, Rule,
    RuleConfig, RuleError, RuleKind,
};

/// Arbitrarily nested rule built over a [`PropertyCatalog`].
///
/// This is the shape persisted filters take: property leaves joined by
/// AND/OR nodes, restorable from a [`RuleConfig`] document.
pub enum RuleTree<I> {
    /// A single property comparison.
    Property(PropertyRule<I>),
    /// Two subtrees joined by a junction.
    Composite(Box<CompositeRule<I, RuleTree<I>>>),
}

impl<I> RuleTree<I> {
    /// A single leaf over `catalog`, starting on its first property.
    pub fn property(catalog: Arc<PropertyCatalog<I>>) -> Self {
        RuleTree::Property(PropertyRule::new(catalog))
    }

    /// Conjunction of two subtrees.
    pub fn and(first: Self, second: Self) -> Self {
        RuleTree::Composite(Box::new(CompositeRule::and(first, second)))
    }

    /// Disjunction of two subtrees.
    pub fn or(first: Self, second: Self) -> Self {
        RuleTree::Composite(Box::new(CompositeRule::or(first, second)))
    }

    /// Builds a tree with the shape and settings of `config`.
    pub fn from_config(
        catalog: &Arc<PropertyCatalog<I>>,
        config: &RuleConfig,
    ) -> Result<Self, RuleError> {
        match config {
            RuleConfig::Property { .. } => {
                let mut rule = PropertyRule::new(Arc::clone(catalog));
                rule.apply_config(config)?;
                Ok(RuleTree::Property(rule))
            }
            RuleConfig::And { first, second } => Ok(Self::and(
                Self::from_config(catalog, first)?,
                Self::from_config(catalog, second)?,
            )),
            RuleConfig::Or { first, second } => Ok(Self::or(
                Self::from_config(catalog, first)?,
                Self::from_config(catalog, second)?,
            )),
        }
    }

    /// Parses a JSON document into a tree.
    pub fn from_json(catalog: &Arc<PropertyCatalog<I>>, input: &str) -> Result<Self, RuleError> {
        let config: RuleConfig = serde_json::from_str(input)?;
        Self::from_config(catalog, &config)
    }

    /// Catalog the leaves select properties from.
    pub fn catalog(&self) -> &Arc<PropertyCatalog<I>> {
        match self {
            RuleTree::Property(rule) => rule.catalog(),
            RuleTree::Composite(node) => node.first().catalog(),
        }
    }

    fn junction(&self) -> Option<Junction> {
        match self {
            RuleTree::Property(_) => None,
            RuleTree::Composite(node) => Some(node.junction()),
        }
    }
}

impl<I> Rule<I> for RuleTree<I> {
    fn kind(&self) -> RuleKind {
        match self {
            RuleTree::Property(rule) => rule.kind(),
            RuleTree::Composite(node) => node.kind(),
        }
    }

    fn supported_operations(&self) -> &'static [Operation] {
        match self {
            RuleTree::Property(rule) => rule.supported_operations(),
            RuleTree::Composite(node) => node.supported_operations(),
        }
    }

    fn selected_operation(&self) -> Option<Operation> {
        match self {
            RuleTree::Property(rule) => rule.selected_operation(),
            RuleTree::Composite(node) => node.selected_operation(),
        }
    }

    fn evaluate(&self, input: &I) -> Result<bool, RuleError> {
        match self {
            RuleTree::Property(rule) => rule.evaluate(input),
            RuleTree::Composite(node) => node.evaluate(input),
        }
    }
}

impl<I> ConfigurableRule<I> for RuleTree<I> {
    fn evaluation_options(&self) -> Vec<String> {
        match self {
            RuleTree::Property(rule) => rule.evaluation_options(),
            RuleTree::Composite(_) => Vec::new(),
        }
    }

    fn selected_evaluation_option(&self) -> Option<&str> {
        match self {
            RuleTree::Property(rule) => rule.selected_evaluation_option(),
            RuleTree::Composite(_) => None,
        }
    }

    fn to_config(&self) -> Result<RuleConfig, RuleError> {
        match self {
            RuleTree::Property(rule) => rule.to_config(),
            RuleTree::Composite(node) => node.to_config(),
        }
    }

    /// Applies `config`, rebuilding this subtree when its shape differs.
    fn apply_config(&mut self, config: &RuleConfig) -> Result<(), RuleError> {
        let same_shape = match (self.junction(), config) {
            (None, RuleConfig::Property { .. }) => true,
            (Some(Junction::And), RuleConfig::And { .. }) => true,
            (Some(Junction::Or), RuleConfig::Or { .. }) => true,
            _ => false,
        };
        if !same_shape {
            let catalog = Arc::clone(self.catalog());
            *self = Self::from_config(&catalog, config)?;
            return Ok(());
        }
        match self {
            RuleTree::Property(rule) => rule.apply_config(config),
            RuleTree::Composite(node) => node.apply_config(config),
        }
    }
}

impl<I> Clone for RuleTree<I> {
    fn clone(&self) -> Self {
        match self {
            RuleTree::Property(rule) => RuleTree::Property(rule.clone()),
            RuleTree::Composite(node) => RuleTree::Composite(node.clone()),
        }
    }
}

impl<I> fmt::Debug for RuleTree<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleTree::Property(rule) => fmt::Debug::fmt(rule, f),
            RuleTree::Composite(node) => fmt::Debug::fmt(node, f),
        }
    }
}
