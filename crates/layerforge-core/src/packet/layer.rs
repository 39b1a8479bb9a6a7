use serde::ser::{Serialize, SerializeMap, SerializeStruct, Serializer};

use super::bind::{Bindings, guess_in};
use super::error::PacketError;
use super::field::{Auto, Field, FieldDef, FieldKind, Length};
use super::reader::{BitWriter, LayerReader};
use super::value::Value;

/// Name of the catch-all layer holding undissected bytes.
pub const RAW_LAYER: &str = "Raw";

/// One protocol layer: an ordered list of fields plus an optional payload.
///
/// Field order is wire order. A field may itself hold a nested layer
/// (`FieldKind::Layer`); the payload is the next layer of the stack.
#[derive(Debug, Clone)]
pub struct Layer {
    name: String,
    fields: Vec<Field>,
    payload: Option<Box<Layer>>,
}

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            payload: None,
        }
    }

    /// Catch-all layer with a single `load` field.
    pub fn raw(bytes: &[u8]) -> Self {
        Layer::new(RAW_LAYER).with_field(
            FieldDef::bytes("load", Length::Rest).with_default(Value::Bytes(bytes.to_vec())),
        )
    }

    pub fn with_field(mut self, def: FieldDef) -> Self {
        self.fields.push(Field::new(def));
        self
    }

    pub fn with_payload(mut self, payload: Layer) -> Self {
        self.payload = Some(Box::new(payload));
        self
    }

    pub fn push(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut [Field] {
        &mut self.fields
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name() == name)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name() == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|field| field.name() == name)
    }

    /// Value of an own field (nested layers and payload are not searched).
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.field(name).map(Field::value)
    }

    /// Assign an own field; returns `false` when the layer has no such field.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> bool {
        match self.field_mut(name) {
            Some(field) => {
                field.set(value.into());
                true
            }
            None => false,
        }
    }

    /// Assign wire bytes to the field at `index`. Bytes that decode exactly
    /// under the field's rule become a typed value, anything else is kept raw.
    pub fn set_raw_at(&mut self, index: usize, bytes: &[u8]) {
        let Some(field) = self.fields.get(index) else {
            return;
        };
        let kind = *field.kind();
        let value = match kind {
            FieldKind::Layer(source) => {
                let mut nested = source.instantiate(&self.fields);
                let mut reader = LayerReader::new(bytes);
                let complete = nested.dissect_fields(&mut reader).is_ok()
                    && reader.is_aligned()
                    && reader.remaining().is_empty();
                complete.then(|| Value::Layer(Box::new(nested)))
            }
            kind => kind.from_raw(bytes),
        };
        self.fields[index].value = value.unwrap_or_else(|| Value::Raw(bytes.to_vec()));
    }

    pub fn raw_bytes_at(&self, index: usize) -> Option<Vec<u8>> {
        self.fields.get(index).map(Field::raw_bytes)
    }

    /// Whether the field at `index` is currently present on the wire.
    pub fn is_present(&self, index: usize) -> bool {
        self.fields
            .get(index)
            .and_then(|field| field.def().condition())
            .is_none_or(|condition| condition(&self.fields))
    }

    pub fn payload(&self) -> Option<&Layer> {
        self.payload.as_deref()
    }

    pub fn payload_mut(&mut self) -> Option<&mut Layer> {
        self.payload.as_deref_mut()
    }

    pub fn set_payload(&mut self, payload: Layer) {
        self.payload = Some(Box::new(payload));
    }

    pub fn take_payload(&mut self) -> Option<Layer> {
        self.payload.take().map(|payload| *payload)
    }

    /// This layer followed by its payload chain.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        std::iter::successors(Some(self), |layer| layer.payload())
    }

    pub fn deepest(&self) -> &Layer {
        self.layers().last().unwrap_or(self)
    }

    pub fn deepest_mut(&mut self) -> &mut Layer {
        match self.payload {
            Some(ref mut payload) => payload.deepest_mut(),
            None => self,
        }
    }

    /// Strict serialization of this layer and its payload.
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let payload = match &self.payload {
            Some(payload) => payload.encode()?,
            None => Vec::new(),
        };
        let mut out = Vec::new();
        let mut bits = BitWriter::default();
        let mut offsets = Vec::with_capacity(self.fields.len());
        let mut last_bits = None;
        for (idx, field) in self.fields.iter().enumerate() {
            if !self.is_present(idx) {
                offsets.push(None);
                continue;
            }
            if let Some(width) = field.kind().bits() {
                bits.push(field.name(), field.bit_value()?, width)?;
                bits.flush_into(&mut out);
                last_bits = Some(field.name());
                offsets.push(None);
                continue;
            }
            if !bits.is_empty() {
                return Err(PacketError::Unaligned {
                    field: last_bits.unwrap_or(field.name()).to_string(),
                });
            }
            let start = out.len();
            field.encode_into(&mut out)?;
            offsets.push(Some((start, out.len())));
        }
        if !bits.is_empty() {
            return Err(PacketError::Unaligned {
                field: last_bits.unwrap_or(&self.name).to_string(),
            });
        }

        let own_len = out.len();
        for (idx, field) in self.fields.iter().enumerate() {
            let Some((start, end)) = offsets[idx] else {
                continue;
            };
            if !field.value().is_unset() {
                continue;
            }
            let computed = match field.def().auto_rule() {
                Auto::None => continue,
                Auto::OwnLength => own_len,
                Auto::TotalLength => own_len + payload.len(),
                Auto::LengthOf(target) => self
                    .fields
                    .iter()
                    .enumerate()
                    .find(|(pos, other)| other.name() == target && self.is_present(*pos))
                    .and_then(|(pos, _)| offsets[pos])
                    .map(|(s, e)| e - s)
                    .unwrap_or(0),
            };
            let width = end - start;
            if width < 8 && (computed as u64) >> (width * 8) != 0 {
                return Err(PacketError::encode(
                    field.name(),
                    format!("length {computed} does not fit in {width} bytes"),
                ));
            }
            let bytes = (computed as u64).to_be_bytes();
            let slot = &mut out[start..end];
            slot.fill(0);
            let used = width.min(bytes.len());
            slot[width - used..].copy_from_slice(&bytes[bytes.len() - used..]);
        }
        out.extend(payload);
        Ok(out)
    }

    /// Best-effort bytes: the strict encoding when it succeeds, otherwise the
    /// concatenated lenient view of every present field.
    pub fn lenient_bytes(&self) -> Vec<u8> {
        if let Ok(bytes) = self.encode() {
            return bytes;
        }
        let mut out: Vec<u8> = (0..self.fields.len())
            .filter(|idx| self.is_present(*idx))
            .flat_map(|idx| self.fields[idx].raw_bytes())
            .collect();
        if let Some(payload) = &self.payload {
            out.extend(payload.lenient_bytes());
        }
        out
    }

    /// Encoded length without serializing.
    pub fn wire_len(&self) -> usize {
        let mut bits = 0usize;
        let mut bytes = 0usize;
        for (idx, field) in self.fields.iter().enumerate() {
            if !self.is_present(idx) {
                continue;
            }
            match field.kind().bits() {
                Some(width) => bits += width as usize,
                None => bytes += field.wire_len(),
            }
        }
        let payload = self.payload.as_ref().map_or(0, |payload| payload.wire_len());
        bytes + bits.div_ceil(8) + payload
    }

    /// Dissect `bytes` starting from `template`'s layout. Bytes left after the
    /// template's fields become the payload: the first matching binding's
    /// layer, or a `Raw` layer when nothing matches or the payload fails.
    pub fn dissect(template: Layer, bytes: &[u8], bindings: &[&Bindings]) -> Result<Layer, PacketError> {
        let mut layer = template;
        layer.payload = None;
        let mut reader = LayerReader::new(bytes);
        layer.dissect_fields(&mut reader)?;
        let rest = reader.remaining();
        if rest.is_empty() {
            return Ok(layer);
        }
        let payload = match guess_in(bindings, &layer) {
            Some(binding) => {
                let upper = binding.template().instantiate();
                match Layer::dissect(upper, rest, bindings) {
                    Ok(upper) => upper,
                    Err(err) => {
                        tracing::debug!(
                            lower = %layer.name,
                            upper = binding.upper(),
                            error = %err,
                            "payload kept raw"
                        );
                        Layer::raw(rest)
                    }
                }
            }
            None => Layer::raw(rest),
        };
        layer.payload = Some(Box::new(payload));
        Ok(layer)
    }

    pub(crate) fn dissect_fields(&mut self, reader: &mut LayerReader<'_>) -> Result<(), PacketError> {
        let mut last = None;
        for idx in 0..self.fields.len() {
            if !self.is_present(idx) {
                continue;
            }
            let kind = *self.fields[idx].kind();
            let value = kind.decode(reader, &self.fields, &self.name, self.fields[idx].name())?;
            self.fields[idx].value = value;
            last = Some(idx);
        }
        if !reader.is_aligned() {
            let field = last.map_or(self.name.as_str(), |idx| self.fields[idx].name());
            return Err(PacketError::Unaligned {
                field: field.to_string(),
            });
        }
        Ok(())
    }
}

impl PartialEq for Layer {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.payload == other.payload
            && self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.name() == b.name() && a.value() == b.value())
    }
}

impl Eq for Layer {}

struct PresentFields<'a>(&'a Layer);

impl Serialize for PresentFields<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let layer = self.0;
        let mut map = serializer.serialize_map(None)?;
        for (idx, field) in layer.fields.iter().enumerate() {
            if layer.is_present(idx) {
                map.serialize_entry(field.name(), field)?;
            }
        }
        map.end()
    }
}

impl Serialize for Layer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Layer", 3)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("fields", &PresentFields(self))?;
        state.serialize_field("payload", &self.payload)?;
        state.end()
    }
}
