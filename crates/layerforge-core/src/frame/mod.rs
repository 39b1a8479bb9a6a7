//! Protocol-agnostic frame facade.
//!
//! A [`Frame`] owns one root [`Layer`] tree and resolves field names across
//! it, so callers can read and write a nested field without knowing which
//! layer declares it. Serialization and dissection are delegated to the
//! layer primitive in [`crate::packet`].

mod error;
pub mod resolve;

use std::fmt;
use std::marker::PhantomData;

use crate::packet::{Binding, Bindings, Field, FieldDef, Layer, Value, between_in};

pub use error::FrameError;
pub use resolve::{FieldPath, FieldRef, Lookup, Step};

/// Per-protocol configuration of a [`Frame`].
pub trait Protocol {
    /// Facade name, used when the frame holds no bytes at all.
    const NAME: &'static str;

    /// Minimal valid frame: header only, no payload.
    fn empty() -> Layer;

    /// Layout the first bytes of a wire frame are dissected with.
    fn template() -> Layer {
        Self::empty()
    }

    /// Bindings consulted for payload guessing and layer composition.
    fn bindings() -> &'static Bindings {
        crate::protocols::catalog()
    }
}

/// Owner of a layer tree with name-based field access.
///
/// # Examples
/// ```
/// use layerforge_core::KnxFrame;
///
/// let mut frame = KnxFrame::with_type("DESCRIPTION REQUEST")?;
/// frame.set("port", 60000u16)?;
/// assert_eq!(frame.get_raw("port")?, vec![0xea, 0x60]);
/// assert_eq!(frame.len(), frame.to_bytes()?.len());
/// # Ok::<(), layerforge_core::FrameError>(())
/// ```
pub struct Frame<P: Protocol> {
    root: Layer,
    forced: Bindings,
    _protocol: PhantomData<P>,
}

impl<P: Protocol> Frame<P> {
    pub fn new() -> Self {
        Self::from_layer(P::empty())
    }

    /// Wrap an already built layer tree.
    pub fn from_layer(root: Layer) -> Self {
        Self {
            root,
            forced: Bindings::new(),
            _protocol: PhantomData,
        }
    }

    /// Dissect wire bytes. Empty input yields the empty frame.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.is_empty() {
            return Ok(Self::new());
        }
        let root = Layer::dissect(P::template(), bytes, &[P::bindings()])?;
        Ok(Self::from_layer(root))
    }

    pub fn root(&self) -> &Layer {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Layer {
        &mut self.root
    }

    pub fn into_layer(self) -> Layer {
        self.root
    }

    /// Name of the deepest payload carrying bytes, else the root layer's
    /// name when it carries bytes, else the facade name.
    pub fn type_name(&self) -> &str {
        let deepest = self
            .root
            .layers()
            .skip(1)
            .filter(|layer| layer.wire_len() > 0)
            .last();
        match deepest {
            Some(layer) => layer.name(),
            None if self.root.wire_len() > 0 => self.root.name(),
            None => P::NAME,
        }
    }

    pub fn field(&self, name: &str) -> Lookup<'_> {
        resolve::lookup(&self.root, name)
    }

    pub fn get(&self, name: &str) -> Result<&Value, FrameError> {
        self.found(name).map(|field| field.value())
    }

    /// Assign the first field named `name`. Assignment is optimistic: the
    /// value is coerced best-effort and only checked by [`Frame::to_bytes`].
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), FrameError> {
        let field = self.field_mut(name)?;
        field.set(value.into());
        Ok(())
    }

    /// Lenient wire bytes of a field; never fails for an existing field.
    pub fn get_raw(&self, name: &str) -> Result<Vec<u8>, FrameError> {
        self.found(name).map(|field| field.raw_bytes())
    }

    /// Assign wire bytes to a field, bypassing its value type.
    pub fn set_raw(&mut self, name: &str, bytes: &[u8]) -> Result<(), FrameError> {
        let path = self.path(name)?;
        let layer = resolve::layer_at_mut(&mut self.root, path.steps()).ok_or_else(|| not_found(name))?;
        layer.set_raw_at(path.index(), bytes);
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, FrameError> {
        Ok(self.root.encode()?)
    }

    pub fn len(&self) -> usize {
        self.root.wire_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The root layer's own fields.
    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.root.fields().iter()
    }

    /// Append a field to the root layer. A field of the same name is
    /// replaced in place, keeping names unique.
    pub fn add_field(&mut self, def: FieldDef, value: Option<Value>) {
        let field = match value {
            Some(value) => Field::with_value(def, value),
            None => Field::new(def),
        };
        match self.root.position(field.name()) {
            Some(idx) => self.root.fields_mut()[idx] = field,
            None => self.root.push(field),
        }
    }

    /// Attach `child` as the payload of the deepest layer.
    ///
    /// Without `automatic`, a declared binding between the two layers is
    /// required and its discriminator values are written into the parent.
    /// With it, the frame records a forced binding of its own so that
    /// [`Frame::reparse`] dissects the child again.
    pub fn add_layer(&mut self, child: Layer, automatic: bool) -> Result<(), FrameError> {
        let lower = self.root.deepest().name().to_string();
        if automatic {
            tracing::debug!(lower = %lower, upper = child.name(), "forcing layer binding");
            self.forced.push(Binding::forced(lower, &child));
            self.root.deepest_mut().set_payload(child);
            return Ok(());
        }
        let tables = [&self.forced, P::bindings()];
        let Some(binding) = between_in(&tables, &lower, child.name()) else {
            return Err(FrameError::IncompatibleLayers {
                lower,
                upper: child.name().to_string(),
            });
        };
        let parent = self.root.deepest_mut();
        binding.apply(parent);
        parent.set_payload(child);
        Ok(())
    }

    /// Serialize, then dissect again with this frame's layout and bindings,
    /// so automatic values and payload guessing are reflected in the tree.
    pub fn reparse(&mut self) -> Result<(), FrameError> {
        let bytes = self.to_bytes()?;
        let tables = [&self.forced, P::bindings()];
        self.root = Layer::dissect(self.root.clone(), &bytes, &tables)?;
        Ok(())
    }

    /// Layer names from root to deepest payload, joined by ` / `.
    pub fn summary(&self) -> String {
        self.root
            .layers()
            .map(Layer::name)
            .collect::<Vec<_>>()
            .join(" / ")
    }

    fn path(&self, name: &str) -> Result<FieldPath, FrameError> {
        resolve::resolve(&self.root, name).ok_or_else(|| not_found(name))
    }

    fn found(&self, name: &str) -> Result<FieldRef<'_>, FrameError> {
        self.field(name).found().ok_or_else(|| not_found(name))
    }

    fn field_mut(&mut self, name: &str) -> Result<&mut Field, FrameError> {
        let path = self.path(name)?;
        resolve::layer_at_mut(&mut self.root, path.steps())
            .and_then(|layer| layer.fields_mut().get_mut(path.index()))
            .ok_or_else(|| not_found(name))
    }
}

fn not_found(name: &str) -> FrameError {
    FrameError::FieldNotFound {
        name: name.to_string(),
    }
}

impl<P: Protocol> Default for Frame<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Protocol> Clone for Frame<P> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            forced: self.forced.clone(),
            _protocol: PhantomData,
        }
    }
}

impl<P: Protocol> fmt::Debug for Frame<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(P::NAME)
            .field("root", &self.root)
            .field("forced", &self.forced.len())
            .finish()
    }
}

impl<P: Protocol> fmt::Display for Frame<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", P::NAME, self.type_name())
    }
}

impl<P: Protocol> PartialEq for Frame<P> {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

impl<'a, P: Protocol> IntoIterator for &'a Frame<P> {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<P: Protocol> serde::Serialize for Frame<P> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde::Serialize::serialize(&self.root, serializer)
    }
}
