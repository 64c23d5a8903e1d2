#![deny(missing_docs)]
//! Rowstore rule facade crate.
//!
//! Rules are small predicate trees evaluated against an in-memory input. Leaf
//! rules compare one extracted property (numeric, date/time or text) against
//! one or two configured values; composite rules join two children with AND
//! or OR. Rules are independent of any storage and are typically used as
//! post-filters over scanned rows, and persisted as [`RuleConfig`] documents.

mod core;

pub use core::{
    ComparisonRule, CompositeRule, ConfigurableRule, DateTimeRule, Junction, LeafRule, NumericRule,
    Operation, Property, PropertyCatalog, PropertyRule, Rule, RuleConfig, RuleError, RuleKind,
    RuleTree, RuleValue, StringRule, ORDERED_OPERATIONS, TEXT_OPERATIONS,
};
