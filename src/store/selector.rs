use crate::{rules::Rule, store::StoreError};

/// Row predicate applied in memory after conversion.
///
/// Implemented for plain closures and, through [`RuleSelector`], for any
/// rule over the entity type.
pub trait Selector<T: ?Sized> {
    /// Whether `item` is included.
    fn select(&self, item: &T) -> Result<bool, StoreError>;
}

impl<T: ?Sized, F> Selector<T> for F
where
    F: Fn(&T) -> bool,
{
    fn select(&self, item: &T) -> Result<bool, StoreError> {
        Ok(self(item))
    }
}

/// Adapts a [`Rule`] into a [`Selector`]; rule failures surface as
/// [`StoreError::Rule`].
#[derive(Debug, Clone, Copy)]
pub struct RuleSelector<'r, R: ?Sized>(pub &'r R);

impl<T, R> Selector<T> for RuleSelector<'_, R>
where
    R: Rule<T> + ?Sized,
{
    fn select(&self, item: &T) -> Result<bool, StoreError> {
        Ok(self.0.evaluate(item)?)
    }
}
