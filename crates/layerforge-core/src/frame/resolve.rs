use crate::packet::{Field, Layer, Value};

/// One hop from a layer towards the layer owning a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Into the layer held by the field at this index.
    Nested(usize),
    /// Into the payload.
    Payload,
}

/// Location of a field inside a layer tree. Paths are transient: they are
/// recomputed on every lookup and never stored across mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    steps: Vec<Step>,
    index: usize,
}

impl FieldPath {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Index of the field within its owning layer.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Depth in payload hops; 0 means the root layer or a layer nested in it.
    pub fn payload_depth(&self) -> usize {
        self.steps.iter().filter(|step| **step == Step::Payload).count()
    }
}

/// Result of resolving a field name.
#[derive(Debug)]
pub enum Lookup<'a> {
    Found(FieldRef<'a>),
    NotFound,
}

impl<'a> Lookup<'a> {
    pub fn found(self) -> Option<FieldRef<'a>> {
        match self {
            Lookup::Found(field) => Some(field),
            Lookup::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

/// Read-only view of a resolved field.
#[derive(Debug, Clone)]
pub struct FieldRef<'a> {
    layer: &'a Layer,
    path: FieldPath,
}

impl<'a> FieldRef<'a> {
    /// The layer owning the field.
    pub fn layer(&self) -> &'a Layer {
        self.layer
    }

    pub fn field(&self) -> &'a Field {
        &self.layer.fields()[self.path.index]
    }

    pub fn name(&self) -> &'a str {
        self.field().name()
    }

    pub fn value(&self) -> &'a Value {
        self.field().value()
    }

    pub fn raw_bytes(&self) -> Vec<u8> {
        self.field().raw_bytes()
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }
}

/// Find `name` depth first: the layer's own fields, then layers held in its
/// fields (declaration order), then its payload. The first match wins, so an
/// outer field shadows an inner one with the same name.
pub fn resolve(root: &Layer, name: &str) -> Option<FieldPath> {
    let mut steps = Vec::new();
    search(root, name, &mut steps)
}

fn search(layer: &Layer, name: &str, steps: &mut Vec<Step>) -> Option<FieldPath> {
    if let Some(index) = layer.position(name) {
        return Some(FieldPath {
            steps: steps.clone(),
            index,
        });
    }
    for (idx, field) in layer.fields().iter().enumerate() {
        let Value::Layer(nested) = field.value() else {
            continue;
        };
        steps.push(Step::Nested(idx));
        if let Some(path) = search(nested, name, steps) {
            return Some(path);
        }
        steps.pop();
    }
    let payload = layer.payload()?;
    steps.push(Step::Payload);
    let found = search(payload, name, steps);
    steps.pop();
    found
}

pub fn lookup<'a>(root: &'a Layer, name: &str) -> Lookup<'a> {
    let Some(path) = resolve(root, name) else {
        return Lookup::NotFound;
    };
    match layer_at(root, &path.steps) {
        Some(layer) => Lookup::Found(FieldRef { layer, path }),
        None => Lookup::NotFound,
    }
}

pub fn layer_at<'a>(root: &'a Layer, steps: &[Step]) -> Option<&'a Layer> {
    let mut layer = root;
    for step in steps {
        layer = match step {
            Step::Nested(idx) => layer.fields().get(*idx)?.value().as_layer()?,
            Step::Payload => layer.payload()?,
        };
    }
    Some(layer)
}

pub fn layer_at_mut<'a>(root: &'a mut Layer, steps: &[Step]) -> Option<&'a mut Layer> {
    let mut layer = root;
    for step in steps {
        layer = match step {
            Step::Nested(idx) => layer.fields_mut().get_mut(*idx)?.value_mut().as_layer_mut()?,
            Step::Payload => layer.payload_mut()?,
        };
    }
    Some(layer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::FieldDef;

    fn inner() -> Layer {
        Layer::new("Inner")
            .with_field(FieldDef::u8("shared").with_default(Value::Int(2)))
            .with_field(FieldDef::u8("deep"))
    }

    fn tree() -> Layer {
        Layer::new("Outer")
            .with_field(FieldDef::u8("shared").with_default(Value::Int(1)))
            .with_field(FieldDef::layer("holder", inner))
            .with_payload(Layer::new("Next").with_field(FieldDef::u8("tail")))
    }

    #[test]
    fn outer_field_shadows_inner() {
        let root = tree();
        let found = lookup(&root, "shared").found().unwrap();
        assert_eq!(found.layer().name(), "Outer");
        assert_eq!(found.value(), &Value::Int(1));
    }

    #[test]
    fn nested_fields_before_payload() {
        let root = tree();
        let path = resolve(&root, "deep").unwrap();
        assert_eq!(path.steps(), &[Step::Nested(1)]);
        let path = resolve(&root, "tail").unwrap();
        assert_eq!(path.steps(), &[Step::Payload]);
        assert_eq!(path.payload_depth(), 1);
    }

    #[test]
    fn missing_field() {
        assert!(!lookup(&tree(), "absent").is_found());
    }

    #[test]
    fn mutable_walk_reaches_nested_layer() {
        let mut root = tree();
        let path = resolve(&root, "deep").unwrap();
        let layer = layer_at_mut(&mut root, path.steps()).unwrap();
        layer.set("deep", 9u8);
        assert_eq!(lookup(&root, "deep").found().unwrap().value(), &Value::Int(9));
    }
}
