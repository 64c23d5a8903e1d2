use std::{fmt, sync::Arc};

use time::OffsetDateTime;

use super::{
    comparison::Extractor, text::TextExtractor, ConfigurableRule, DateTimeRule, NumericRule,
    Operation, Rule, RuleConfig, RuleError, RuleKind, RuleValue, StringRule,
};

/// Named property accessor registered in a [`PropertyCatalog`].
pub enum Property<I> {
    /// Numeric property; `None` never matches.
    Numeric(Extractor<I, f64>),
    /// Date/time property; `None` never matches.
    DateTime(Extractor<I, OffsetDateTime>),
    /// Text property.
    Text(TextExtractor<I>),
}

impl<I> Property<I> {
    /// Kind of leaf rule built over this property.
    pub fn kind(&self) -> RuleKind {
        match self {
            Property::Numeric(_) => RuleKind::Numeric,
            Property::DateTime(_) => RuleKind::DateTime,
            Property::Text(_) => RuleKind::String,
        }
    }

    fn leaf(&self) -> LeafRule<I> {
        match self {
            Property::Numeric(f) => LeafRule::Numeric(NumericRule::from_shared(Arc::clone(f))),
            Property::DateTime(f) => LeafRule::DateTime(DateTimeRule::from_shared(Arc::clone(f))),
            Property::Text(f) => LeafRule::Text(StringRule::from_shared(Arc::clone(f))),
        }
    }
}

/// Registry of the properties of `I` that rules may evaluate.
///
/// Stands in for runtime reflection: the application lists each filterable
/// property once, by name and value type.
pub struct PropertyCatalog<I> {
    properties: Vec<(String, Property<I>)>,
}

impl<I> Default for PropertyCatalog<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> PropertyCatalog<I> {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            properties: Vec::new(),
        }
    }

    /// Registers a numeric property. Re-registering a name replaces it.
    #[must_use]
    pub fn numeric<F>(self, name: impl Into<String>, extractor: F) -> Self
    where
        F: Fn(&I) -> f64 + Send + Sync + 'static,
    {
        self.optional_numeric(name, move |input| Some(extractor(input)))
    }

    /// Registers a numeric property that may be absent.
    #[must_use]
    pub fn optional_numeric<F>(self, name: impl Into<String>, extractor: F) -> Self
    where
        F: Fn(&I) -> Option<f64> + Send + Sync + 'static,
    {
        self.insert(name.into(), Property::Numeric(Arc::new(extractor)))
    }

    /// Registers a date/time property.
    #[must_use]
    pub fn date_time<F>(self, name: impl Into<String>, extractor: F) -> Self
    where
        F: Fn(&I) -> OffsetDateTime + Send + Sync + 'static,
    {
        self.insert(
            name.into(),
            Property::DateTime(Arc::new(move |input: &I| Some(extractor(input)))),
        )
    }

    /// Registers a text property.
    #[must_use]
    pub fn text<F>(self, name: impl Into<String>, extractor: F) -> Self
    where
        F: Fn(&I) -> String + Send + Sync + 'static,
    {
        self.insert(name.into(), Property::Text(Arc::new(extractor)))
    }

    fn insert(mut self, name: String, property: Property<I>) -> Self {
        self.properties.retain(|(existing, _)| *existing != name);
        self.properties.push((name, property));
        self
    }

    /// Looks up a property by name.
    pub fn get(&self, name: &str) -> Option<&Property<I>> {
        self.properties
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, property)| property)
    }

    /// All property names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|(name, _)| name.as_str())
    }

    /// Names of properties evaluated by rules of `kind`.
    pub fn names_of_kind(&self, kind: RuleKind) -> Vec<&str> {
        self.properties
            .iter()
            .filter(|(_, property)| property.kind() == kind)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Number of registered properties.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// True when no property is registered.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// One of the three leaf rule kinds, chosen by the selected property's type.
pub enum LeafRule<I> {
    /// Numeric comparison.
    Numeric(NumericRule<I>),
    /// Date/time comparison.
    DateTime(DateTimeRule<I>),
    /// Text matching.
    Text(StringRule<I>),
}

impl<I> LeafRule<I> {
    /// Selects an operation on the wrapped rule.
    pub fn set_selected_operation(&mut self, operation: Option<Operation>) {
        match self {
            LeafRule::Numeric(rule) => rule.set_selected_operation(operation),
            LeafRule::DateTime(rule) => rule.set_selected_operation(operation),
            LeafRule::Text(rule) => rule.set_selected_operation(operation),
        }
    }

    /// Whether the selected operation reads the second value.
    pub fn value2_usable(&self) -> bool {
        match self {
            LeafRule::Numeric(rule) => rule.value2_usable(),
            LeafRule::DateTime(rule) => rule.value2_usable(),
            LeafRule::Text(rule) => rule.value2_usable(),
        }
    }

    /// Renders both configured values for persistence.
    pub fn values_as_text(&self) -> Result<(Option<String>, Option<String>), RuleError> {
        fn render<V: RuleValue>(value: Option<&V>) -> Result<Option<String>, RuleError> {
            value.map(RuleValue::serialize_value).transpose()
        }
        Ok(match self {
            LeafRule::Numeric(rule) => (render(rule.value1())?, render(rule.value2())?),
            LeafRule::DateTime(rule) => (render(rule.value1())?, render(rule.value2())?),
            LeafRule::Text(rule) => (rule.value1().map(str::to_string), None),
        })
    }

    /// Parses and stores both values from their persisted text.
    ///
    /// Text rules ignore `value2`.
    pub fn set_values_from_text(
        &mut self,
        value1: Option<&str>,
        value2: Option<&str>,
    ) -> Result<(), RuleError> {
        fn parse<V: RuleValue>(value: Option<&str>) -> Result<Option<V>, RuleError> {
            value.map(V::deserialize_value).transpose()
        }
        match self {
            LeafRule::Numeric(rule) => {
                rule.set_value1(parse(value1)?);
                rule.set_value2(parse(value2)?);
            }
            LeafRule::DateTime(rule) => {
                rule.set_value1(parse(value1)?);
                rule.set_value2(parse(value2)?);
            }
            LeafRule::Text(rule) => rule.set_value1(value1.map(str::to_string)),
        }
        Ok(())
    }

    fn as_rule(&self) -> &dyn Rule<I> {
        match self {
            LeafRule::Numeric(rule) => rule,
            LeafRule::DateTime(rule) => rule,
            LeafRule::Text(rule) => rule,
        }
    }
}

impl<I> Rule<I> for LeafRule<I> {
    fn kind(&self) -> RuleKind {
        self.as_rule().kind()
    }

    fn supported_operations(&self) -> &'static [Operation] {
        self.as_rule().supported_operations()
    }

    fn selected_operation(&self) -> Option<Operation> {
        self.as_rule().selected_operation()
    }

    fn evaluate(&self, input: &I) -> Result<bool, RuleError> {
        self.as_rule().evaluate(input)
    }
}

impl<I> Clone for LeafRule<I> {
    fn clone(&self) -> Self {
        match self {
            LeafRule::Numeric(rule) => LeafRule::Numeric(rule.clone()),
            LeafRule::DateTime(rule) => LeafRule::DateTime(rule.clone()),
            LeafRule::Text(rule) => LeafRule::Text(rule.clone()),
        }
    }
}

impl<I> fmt::Debug for LeafRule<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeafRule::Numeric(rule) => f.debug_tuple("Numeric").field(rule).finish(),
            LeafRule::DateTime(rule) => f.debug_tuple("DateTime").field(rule).finish(),
            LeafRule::Text(rule) => f.debug_tuple("Text").field(rule).finish(),
        }
    }
}

/// Configurable leaf: a selectable property plus the rule evaluating it.
///
/// Selecting a property rebuilds the leaf rule for that property's value
/// type, discarding the previous operation and values. A fresh rule starts
/// on the first registered property. With nothing selected the rule reports
/// the `String` kind and fails evaluation with [`RuleError::NoPropertySelected`].
pub struct PropertyRule<I> {
    catalog: Arc<PropertyCatalog<I>>,
    selected: Option<String>,
    rule: Option<LeafRule<I>>,
}

impl<I> PropertyRule<I> {
    /// Creates a rule over `catalog`, selecting its first property.
    pub fn new(catalog: Arc<PropertyCatalog<I>>) -> Self {
        let first = catalog
            .properties
            .first()
            .map(|(name, property)| (name.clone(), property.leaf()));
        let (selected, rule) = match first {
            Some((name, rule)) => (Some(name), Some(rule)),
            None => (None, None),
        };
        Self {
            catalog,
            selected,
            rule,
        }
    }

    /// Catalog the rule selects properties from.
    pub fn catalog(&self) -> &Arc<PropertyCatalog<I>> {
        &self.catalog
    }

    /// Points the rule at the property called `name`.
    pub fn select_property(&mut self, name: &str) -> Result<(), RuleError> {
        let property = self
            .catalog
            .get(name)
            .ok_or_else(|| RuleError::UnknownProperty(name.to_string()))?;
        self.rule = Some(property.leaf());
        self.selected = Some(name.to_string());
        Ok(())
    }

    /// Clears the property selection.
    pub fn clear_property(&mut self) {
        self.selected = None;
        self.rule = None;
    }

    /// Builder form of [`PropertyRule::select_property`].
    pub fn with_property(mut self, name: &str) -> Result<Self, RuleError> {
        self.select_property(name)?;
        Ok(self)
    }

    /// The leaf rule for the selected property.
    pub fn selected_rule(&self) -> Option<&LeafRule<I>> {
        self.rule.as_ref()
    }

    /// Mutable access to the leaf rule for the selected property.
    pub fn selected_rule_mut(&mut self) -> Option<&mut LeafRule<I>> {
        self.rule.as_mut()
    }

    /// Selects an operation on the current leaf rule.
    pub fn set_selected_operation(&mut self, operation: Option<Operation>) -> Result<(), RuleError> {
        self.leaf_mut()?.set_selected_operation(operation);
        Ok(())
    }

    /// Sets both values from their text form.
    pub fn set_values(&mut self, value1: Option<&str>, value2: Option<&str>) -> Result<(), RuleError> {
        self.leaf_mut()?.set_values_from_text(value1, value2)
    }

    /// Builder form of [`PropertyRule::set_selected_operation`].
    pub fn with_operation(mut self, operation: Operation) -> Result<Self, RuleError> {
        self.set_selected_operation(Some(operation))?;
        Ok(self)
    }

    /// Builder form of [`PropertyRule::set_values`].
    pub fn with_values(mut self, value1: &str, value2: Option<&str>) -> Result<Self, RuleError> {
        self.set_values(Some(value1), value2)?;
        Ok(self)
    }

    fn leaf(&self) -> Result<&LeafRule<I>, RuleError> {
        self.rule.as_ref().ok_or(RuleError::NoPropertySelected)
    }

    fn leaf_mut(&mut self) -> Result<&mut LeafRule<I>, RuleError> {
        self.rule.as_mut().ok_or(RuleError::NoPropertySelected)
    }
}

impl<I> Rule<I> for PropertyRule<I> {
    fn kind(&self) -> RuleKind {
        match &self.rule {
            Some(rule) => rule.kind(),
            None => RuleKind::String,
        }
    }

    fn supported_operations(&self) -> &'static [Operation] {
        match &self.rule {
            Some(rule) => rule.supported_operations(),
            None => &[],
        }
    }

    fn selected_operation(&self) -> Option<Operation> {
        self.rule.as_ref().and_then(|rule| rule.selected_operation())
    }

    fn evaluate(&self, input: &I) -> Result<bool, RuleError> {
        self.leaf()?.evaluate(input)
    }
}

impl<I> ConfigurableRule<I> for PropertyRule<I> {
    fn evaluation_options(&self) -> Vec<String> {
        self.catalog.names().map(str::to_string).collect()
    }

    fn selected_evaluation_option(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    fn to_config(&self) -> Result<RuleConfig, RuleError> {
        let (value1, value2) = match &self.rule {
            Some(rule) => rule.values_as_text()?,
            None => (None, None),
        };
        Ok(RuleConfig::Property {
            property: self.selected.clone(),
            operation: self.selected_operation(),
            value1,
            value2,
        })
    }

    fn apply_config(&mut self, config: &RuleConfig) -> Result<(), RuleError> {
        let RuleConfig::Property {
            property,
            operation,
            value1,
            value2,
        } = config
        else {
            return Err(RuleError::ConfigMismatch {
                expected: "property",
                found: config.shape(),
            });
        };
        let Some(property) = property else {
            self.clear_property();
            return Ok(());
        };
        self.select_property(property)?;
        self.set_selected_operation(*operation)?;
        self.set_values(value1.as_deref(), value2.as_deref())
    }
}

impl<I> Clone for PropertyRule<I> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            selected: self.selected.clone(),
            rule: self.rule.clone(),
        }
    }
}

impl<I> fmt::Debug for PropertyRule<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyRule")
            .field("selected", &self.selected)
            .field("rule", &self.rule)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    struct Order {
        total: f64,
        customer: String,
        placed: OffsetDateTime,
    }

    fn catalog() -> Arc<PropertyCatalog<Order>> {
        Arc::new(
            PropertyCatalog::new()
                .numeric("Total", |o: &Order| o.total)
                .text("Customer", |o: &Order| o.customer.clone())
                .date_time("Placed", |o: &Order| o.placed),
        )
    }

    fn order(total: f64, customer: &str) -> Order {
        Order {
            total,
            customer: customer.to_string(),
            placed: datetime!(2024-02-10 09:00 UTC),
        }
    }

    #[test]
    fn catalog_groups_names_by_kind() {
        let catalog = catalog();
        assert_eq!(catalog.names().collect::<Vec<_>>(), ["Total", "Customer", "Placed"]);
        assert_eq!(catalog.names_of_kind(RuleKind::String), ["Customer"]);
        assert_eq!(catalog.names_of_kind(RuleKind::DateTime), ["Placed"]);
        assert!(catalog.get("Missing").is_none());
    }

    #[test]
    fn fresh_rule_selects_first_property() {
        let rule = PropertyRule::new(catalog());
        assert_eq!(rule.selected_evaluation_option(), Some("Total"));
        assert_eq!(rule.kind(), RuleKind::Numeric);
        assert_eq!(rule.evaluation_options().len(), 3);
    }

    #[test]
    fn selecting_property_switches_kind() {
        let rule = PropertyRule::new(catalog())
            .with_property("Customer")
            .unwrap()
            .with_operation(Operation::Contains)
            .unwrap()
            .with_values("ACME", None)
            .unwrap();
        assert_eq!(rule.kind(), RuleKind::String);
        assert!(rule.evaluate(&order(1.0, "Acme Ltd")).unwrap());
        assert!(!rule.evaluate(&order(1.0, "Globex")).unwrap());
    }

    #[test]
    fn unknown_property_is_rejected() {
        let mut rule = PropertyRule::new(catalog());
        assert_eq!(
            rule.select_property("Weight"),
            Err(RuleError::UnknownProperty("Weight".into()))
        );
        assert_eq!(rule.selected_evaluation_option(), Some("Total"));
    }

    #[test]
    fn empty_catalog_has_no_selection() {
        let rule: PropertyRule<Order> = PropertyRule::new(Arc::new(PropertyCatalog::new()));
        assert_eq!(rule.evaluate(&order(1.0, "x")), Err(RuleError::NoPropertySelected));
    }

    #[test]
    fn serialized_rule_restores_into_fresh_rule() {
        let rule = PropertyRule::new(catalog())
            .with_property("Placed")
            .unwrap()
            .with_operation(Operation::InBetween)
            .unwrap()
            .with_values("2024-03-01T00:00:00Z", Some("2024-01-01T00:00:00Z"))
            .unwrap();
        let text = rule.serialize().unwrap();

        let mut restored = PropertyRule::new(catalog());
        restored.deserialize(&text).unwrap();
        assert_eq!(restored.selected_evaluation_option(), Some("Placed"));
        assert_eq!(restored.selected_operation(), Some(Operation::InBetween));
        assert!(restored.selected_rule().unwrap().value2_usable());
        assert!(restored.evaluate(&order(0.0, "x")).unwrap());
        assert_eq!(restored.to_config().unwrap(), rule.to_config().unwrap());
    }

    #[test]
    fn bad_persisted_value_is_reported() {
        let mut rule = PropertyRule::new(catalog());
        let err = rule
            .deserialize(r#"{"rule":"property","property":"Total","operation":"equal_to","value1":"ten"}"#)
            .unwrap_err();
        assert!(matches!(err, RuleError::InvalidValue { kind: RuleKind::Numeric, .. }));
    }
}
