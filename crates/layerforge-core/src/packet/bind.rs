use super::field::LayerCtor;
use super::layer::Layer;
use super::value::Value;

/// How the upper layer of a binding is produced.
#[derive(Debug, Clone)]
pub enum Template {
    Ctor(LayerCtor),
    /// A concrete layer instance, cloned on use. Used for forced bindings.
    Prototype(Box<Layer>),
}

impl Template {
    pub fn instantiate(&self) -> Layer {
        match self {
            Template::Ctor(ctor) => ctor(),
            Template::Prototype(layer) => {
                let mut layer = layer.as_ref().clone();
                layer.take_payload();
                layer
            }
        }
    }
}

/// Rule stating which layer follows `lower`, under field constraints.
///
/// # Examples
/// ```
/// use layerforge_core::packet::{Binding, FieldDef, Layer};
///
/// fn upper() -> Layer {
///     Layer::new("Upper")
/// }
///
/// let binding = Binding::new("Lower", upper).when("port", 3671);
/// let mut lower = Layer::new("Lower").with_field(FieldDef::u16("port"));
/// assert!(!binding.matches(&lower));
/// binding.apply(&mut lower);
/// assert!(binding.matches(&lower));
/// ```
#[derive(Debug, Clone)]
pub struct Binding {
    lower: String,
    upper: String,
    template: Template,
    constraints: Vec<(String, u64)>,
}

impl Binding {
    pub fn new(lower: impl Into<String>, upper: LayerCtor) -> Self {
        Self {
            lower: lower.into(),
            upper: upper().name().to_string(),
            template: Template::Ctor(upper),
            constraints: Vec::new(),
        }
    }

    /// Unconstrained binding to a concrete layer instance.
    pub fn forced(lower: impl Into<String>, upper: &Layer) -> Self {
        Self {
            lower: lower.into(),
            upper: upper.name().to_string(),
            template: Template::Prototype(Box::new(upper.clone())),
            constraints: Vec::new(),
        }
    }

    pub fn when(mut self, field: impl Into<String>, value: u64) -> Self {
        self.constraints.push((field.into(), value));
        self
    }

    pub fn lower(&self) -> &str {
        &self.lower
    }

    pub fn upper(&self) -> &str {
        &self.upper
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn constraints(&self) -> &[(String, u64)] {
        &self.constraints
    }

    /// Whether `lower` satisfies this binding (name and every constraint).
    pub fn matches(&self, lower: &Layer) -> bool {
        lower.name() == self.lower
            && self
                .constraints
                .iter()
                .all(|(field, value)| lower.get(field).and_then(Value::as_int) == Some(*value))
    }

    /// Write the constraint values into `lower`.
    pub fn apply(&self, lower: &mut Layer) {
        for (field, value) in &self.constraints {
            lower.set(field, *value);
        }
    }
}

/// Ordered binding table; the first match wins.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    entries: Vec<Binding>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, binding: Binding) -> Self {
        self.entries.push(binding);
        self
    }

    pub fn push(&mut self, binding: Binding) {
        self.entries.push(binding);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Binding> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn guess(&self, lower: &Layer) -> Option<&Binding> {
        self.entries.iter().find(|binding| binding.matches(lower))
    }

    /// First binding declared between the two layer names, constraints ignored.
    pub fn between(&self, lower: &str, upper: &str) -> Option<&Binding> {
        self.entries
            .iter()
            .find(|binding| binding.lower == lower && binding.upper == upper)
    }

    /// Stack `upper` on the deepest layer of `lower`. When a binding connects
    /// the two, its constraint values are written into the parent.
    pub fn compose(&self, mut lower: Layer, upper: Layer) -> Layer {
        let parent = lower.deepest_mut();
        if let Some(binding) = self.between(parent.name(), upper.name()) {
            binding.apply(parent);
        }
        parent.set_payload(upper);
        lower
    }
}

impl<'a> IntoIterator for &'a Bindings {
    type Item = &'a Binding;
    type IntoIter = std::slice::Iter<'a, Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Guess across several tables, searched in order.
pub fn guess_in<'a>(tables: &[&'a Bindings], lower: &Layer) -> Option<&'a Binding> {
    tables.iter().find_map(|table| table.guess(lower))
}

pub fn between_in<'a>(tables: &[&'a Bindings], lower: &str, upper: &str) -> Option<&'a Binding> {
    tables.iter().find_map(|table| table.between(lower, upper))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::FieldDef;

    fn lower() -> Layer {
        Layer::new("Lower")
            .with_field(FieldDef::u16("sport"))
            .with_field(FieldDef::u16("dport"))
    }

    fn upper() -> Layer {
        Layer::new("Upper")
    }

    fn other() -> Layer {
        Layer::new("Other")
    }

    #[test]
    fn first_match_wins() {
        let table = Bindings::new()
            .bind(Binding::new("Lower", upper).when("dport", 7))
            .bind(Binding::new("Lower", other));
        let mut layer = lower();
        assert_eq!(table.guess(&layer).unwrap().upper(), "Other");
        layer.set("dport", 7u16);
        assert_eq!(table.guess(&layer).unwrap().upper(), "Upper");
    }

    #[test]
    fn between_ignores_constraints() {
        let table = Bindings::new().bind(Binding::new("Lower", upper).when("dport", 7));
        assert!(table.between("Lower", "Upper").is_some());
        assert!(table.between("Upper", "Lower").is_none());
    }

    #[test]
    fn compose_writes_discriminator() {
        let table = Bindings::new().bind(Binding::new("Lower", upper).when("dport", 7));
        let stacked = table.compose(lower(), upper());
        assert_eq!(stacked.get("dport"), Some(&Value::Int(7)));
        assert_eq!(stacked.payload().unwrap().name(), "Upper");
        assert_eq!(stacked.encode().unwrap(), vec![0, 0, 0, 7]);
    }

    #[test]
    fn forced_template_drops_payload() {
        let proto = upper().with_payload(other());
        let binding = Binding::forced("Lower", &proto);
        assert!(binding.template().instantiate().payload().is_none());
        assert!(binding.matches(&lower()));
    }
}
