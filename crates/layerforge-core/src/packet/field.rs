use std::borrow::Cow;
use std::fmt;
use std::net::Ipv4Addr;

use serde::ser::{Serialize, Serializer};

use super::error::PacketError;
use super::layer::Layer;
use super::reader::LayerReader;
use super::value::{Value, format_mac, parse_mac, to_hex};

/// Constructor producing a layer with its default field values.
pub type LayerCtor = fn() -> Layer;
/// Presence predicate evaluated against the sibling fields of a layer.
pub type Condition = fn(&[Field]) -> bool;
/// Byte length computed from sibling fields (e.g. a length prefix).
pub type LengthFn = fn(&[Field]) -> usize;
/// Chooses the nested layer layout from sibling fields.
pub type SelectFn = fn(&[Field]) -> LayerCtor;

/// Byte length rule of a `FieldKind::Bytes` field.
#[derive(Clone, Copy)]
pub enum Length {
    /// Exactly `n` bytes; shorter values are zero-padded, longer ones truncated.
    Fixed(usize),
    /// Length read from sibling fields when dissecting.
    From(LengthFn),
    /// Everything left in the input.
    Rest,
}

/// Where the nested layer of a `FieldKind::Layer` field comes from.
#[derive(Clone, Copy)]
pub enum LayerSource {
    Fixed(LayerCtor),
    Select(SelectFn),
}

/// Encode/decode rule of a field, fixed at layer-definition time.
#[derive(Clone, Copy)]
pub enum FieldKind {
    U8,
    U16,
    U32,
    /// Big-endian unsigned integer of the given byte width (1..=8).
    UInt(usize),
    /// Bit field; consecutive bit fields are packed MSB first.
    Bits(u32),
    Ipv4,
    Mac,
    /// KNX individual address `area.line.device` (4/4/8 bits).
    IndividualAddress,
    /// KNX group address `main/middle/sub` (5/3/8 bits).
    GroupAddress,
    Bytes(Length),
    Layer(LayerSource),
}

impl FieldKind {
    /// Byte width of fixed-size, byte-aligned kinds.
    pub fn width(&self) -> Option<usize> {
        match self {
            FieldKind::U8 => Some(1),
            FieldKind::U16 | FieldKind::IndividualAddress | FieldKind::GroupAddress => Some(2),
            FieldKind::U32 | FieldKind::Ipv4 => Some(4),
            FieldKind::Mac => Some(6),
            FieldKind::UInt(width) => Some(*width),
            FieldKind::Bytes(Length::Fixed(len)) => Some(*len),
            FieldKind::Bits(_) | FieldKind::Bytes(_) | FieldKind::Layer(_) => None,
        }
    }

    pub fn bits(&self) -> Option<u32> {
        match self {
            FieldKind::Bits(bits) => Some(*bits),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            FieldKind::U8 => "u8",
            FieldKind::U16 => "u16",
            FieldKind::U32 => "u32",
            FieldKind::UInt(_) => "uint",
            FieldKind::Bits(_) => "bits",
            FieldKind::Ipv4 => "ipv4",
            FieldKind::Mac => "mac",
            FieldKind::IndividualAddress => "individual-address",
            FieldKind::GroupAddress => "group-address",
            FieldKind::Bytes(_) => "bytes",
            FieldKind::Layer(_) => "layer",
        }
    }

    /// Best-effort conversion applied on assignment. Never fails: values the
    /// rule cannot interpret are kept as given.
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (FieldKind::Ipv4, Value::Str(text)) => match text.trim().parse::<Ipv4Addr>() {
                Ok(addr) => Value::Ipv4(addr),
                Err(_) => Value::Str(text),
            },
            (FieldKind::Mac, Value::Str(text)) => match parse_mac(text.trim()) {
                Some(mac) => Value::Mac(mac),
                None => Value::Str(text),
            },
            (FieldKind::IndividualAddress, Value::Str(text)) => {
                match parse_individual_address(&text) {
                    Some(addr) => Value::Int(addr.into()),
                    None => Value::Str(text),
                }
            }
            (FieldKind::GroupAddress, Value::Str(text)) => match parse_group_address(&text) {
                Some(addr) => Value::Int(addr.into()),
                None => Value::Str(text),
            },
            (_, value) => value,
        }
    }

    /// Decode raw wire bytes into a typed value when they match this rule
    /// exactly. Nested layers are decoded by the owning layer.
    pub fn from_raw(&self, bytes: &[u8]) -> Option<Value> {
        match self {
            FieldKind::Bits(bits) => {
                if bytes.len() != (*bits as usize).div_ceil(8) {
                    return None;
                }
                let value = be_uint(bytes);
                (*bits >= 64 || value >> bits == 0).then_some(Value::Int(value))
            }
            FieldKind::Bytes(Length::Fixed(len)) => {
                (bytes.len() == *len).then(|| Value::Bytes(bytes.to_vec()))
            }
            FieldKind::Bytes(_) => Some(Value::Bytes(bytes.to_vec())),
            FieldKind::Layer(_) => None,
            FieldKind::Ipv4 => {
                let octets: [u8; 4] = bytes.try_into().ok()?;
                Some(Value::Ipv4(Ipv4Addr::from(octets)))
            }
            FieldKind::Mac => {
                let mac: [u8; 6] = bytes.try_into().ok()?;
                Some(Value::Mac(mac))
            }
            kind => {
                let width = kind.width()?;
                (bytes.len() == width && width <= 8).then(|| Value::Int(be_uint(bytes)))
            }
        }
    }

    pub(crate) fn decode(
        &self,
        reader: &mut LayerReader<'_>,
        siblings: &[Field],
        layer: &str,
        field: &str,
    ) -> Result<Value, PacketError> {
        if let FieldKind::Bits(bits) = self {
            let value = reader.read_bits(*bits).map_err(|s| s.into_error(layer))?;
            return Ok(Value::Int(value));
        }
        if !reader.is_aligned() {
            return Err(PacketError::Unaligned {
                field: field.to_string(),
            });
        }
        let short = |s: super::reader::Shortfall| s.into_error(layer);
        let value = match self {
            FieldKind::Ipv4 => {
                let value = reader.read_uint(4).map_err(short)?;
                Value::Ipv4(Ipv4Addr::from(value as u32))
            }
            FieldKind::Mac => {
                let bytes = reader.read_slice(6).map_err(short)?;
                let mut mac = [0u8; 6];
                mac.copy_from_slice(bytes);
                Value::Mac(mac)
            }
            FieldKind::Bytes(length) => {
                let bytes = match length {
                    Length::Fixed(len) => reader.read_slice(*len).map_err(short)?,
                    Length::From(len_of) => reader.read_slice(len_of(siblings)).map_err(short)?,
                    Length::Rest => reader.read_rest(),
                };
                Value::Bytes(bytes.to_vec())
            }
            FieldKind::Layer(source) => {
                let mut nested = source.instantiate(siblings);
                nested.dissect_fields(reader)?;
                Value::Layer(Box::new(nested))
            }
            kind => {
                let width = kind.width().unwrap_or(0);
                Value::Int(reader.read_uint(width).map_err(short)?)
            }
        };
        Ok(value)
    }
}

impl fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::UInt(width) => write!(f, "uint{}", width * 8),
            FieldKind::Bits(bits) => write!(f, "bits{bits}"),
            FieldKind::Bytes(Length::Fixed(len)) => write!(f, "bytes[{len}]"),
            kind => f.write_str(kind.label()),
        }
    }
}

impl LayerSource {
    pub fn instantiate(&self, siblings: &[Field]) -> Layer {
        match self {
            LayerSource::Fixed(ctor) => ctor(),
            LayerSource::Select(select) => select(siblings)(),
        }
    }
}

/// Automatic value computed at encode time for an `Unset` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auto {
    None,
    /// Encoded length of the owning layer's own fields.
    OwnLength,
    /// Encoded length of the owning layer plus its payload.
    TotalLength,
    /// Encoded length of the named sibling field.
    LengthOf(&'static str),
}

/// Static description of a field: name, rule, default and automatic value.
///
/// # Examples
/// ```
/// use layerforge_core::packet::{Auto, FieldDef, FieldKind, Value};
///
/// let def = FieldDef::u8("structure_length").auto(Auto::OwnLength);
/// assert_eq!(def.name(), "structure_length");
/// assert!(matches!(def.kind(), FieldKind::U8));
/// assert_eq!(def.default_value(), &Value::Unset);
/// ```
#[derive(Clone)]
pub struct FieldDef {
    name: Cow<'static, str>,
    kind: FieldKind,
    default: Value,
    auto: Auto,
    condition: Option<Condition>,
}

impl FieldDef {
    pub fn new(name: impl Into<Cow<'static, str>>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: Value::Unset,
            auto: Auto::None,
            condition: None,
        }
    }

    pub fn u8(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, FieldKind::U8)
    }

    pub fn u16(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, FieldKind::U16)
    }

    pub fn u32(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, FieldKind::U32)
    }

    pub fn uint(name: impl Into<Cow<'static, str>>, width: usize) -> Self {
        Self::new(name, FieldKind::UInt(width))
    }

    pub fn bits(name: impl Into<Cow<'static, str>>, bits: u32) -> Self {
        Self::new(name, FieldKind::Bits(bits))
    }

    pub fn ipv4(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, FieldKind::Ipv4)
    }

    pub fn mac(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, FieldKind::Mac)
    }

    pub fn individual_address(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, FieldKind::IndividualAddress)
    }

    pub fn group_address(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, FieldKind::GroupAddress)
    }

    pub fn bytes(name: impl Into<Cow<'static, str>>, length: Length) -> Self {
        Self::new(name, FieldKind::Bytes(length))
    }

    /// Field holding a nested layer, defaulting to `ctor()`.
    pub fn layer(name: impl Into<Cow<'static, str>>, ctor: LayerCtor) -> Self {
        Self::new(name, FieldKind::Layer(LayerSource::Fixed(ctor))).with_default(ctor().into())
    }

    /// Field holding a nested layer whose layout depends on sibling values.
    pub fn select(
        name: impl Into<Cow<'static, str>>,
        select: SelectFn,
        fallback: LayerCtor,
    ) -> Self {
        Self::new(name, FieldKind::Layer(LayerSource::Select(select)))
            .with_default(fallback().into())
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = value;
        self
    }

    pub fn auto(mut self, auto: Auto) -> Self {
        self.auto = auto;
        self
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn auto_rule(&self) -> Auto {
        self.auto
    }

    pub fn condition(&self) -> Option<Condition> {
        self.condition
    }
}

impl fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("default", &self.default)
            .field("auto", &self.auto)
            .field("conditional", &self.condition.is_some())
            .finish()
    }
}

/// A field definition together with its current value.
#[derive(Debug, Clone)]
pub struct Field {
    def: FieldDef,
    pub(crate) value: Value,
}

impl Field {
    pub fn new(def: FieldDef) -> Self {
        let value = def.default.clone();
        Self { def, value }
    }

    pub fn with_value(def: FieldDef, value: Value) -> Self {
        let value = def.kind.coerce(value);
        Self { def, value }
    }

    pub fn name(&self) -> &str {
        self.def.name()
    }

    pub fn def(&self) -> &FieldDef {
        &self.def
    }

    pub fn kind(&self) -> &FieldKind {
        &self.def.kind
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    /// Assign a typed value, coercing it best-effort. Never fails.
    pub fn set(&mut self, value: Value) {
        self.value = self.def.kind.coerce(value);
    }

    /// Byte length this field occupies on the wire (0 for bit fields, which
    /// the owning layer accounts for).
    pub fn wire_len(&self) -> usize {
        match (&self.def.kind, &self.value) {
            (FieldKind::Bits(_), _) => 0,
            (_, Value::Raw(bytes)) => bytes.len(),
            (FieldKind::Layer(_), Value::Layer(layer)) => layer.wire_len(),
            (FieldKind::Layer(_), _) => 0,
            (FieldKind::Bytes(Length::Fixed(len)), _) => *len,
            (FieldKind::Bytes(_), value) => loose_bytes(value).len(),
            (kind, Value::Bytes(bytes)) if kind.width().is_some() => bytes.len(),
            (kind, _) => kind.width().unwrap_or(0),
        }
    }

    /// Strict encoding of a byte-aligned field.
    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), PacketError> {
        let name = self.name();
        match (&self.def.kind, &self.value) {
            (_, Value::Raw(bytes)) => out.extend_from_slice(bytes),
            (FieldKind::Layer(_), Value::Layer(layer)) => out.extend(layer.encode()?),
            (FieldKind::Layer(_), Value::Unset) => {}
            (FieldKind::Layer(_), other) => {
                return Err(PacketError::encode(
                    name,
                    format!("expected a nested layer, got '{other}'"),
                ));
            }
            (FieldKind::Bytes(length), value) => {
                let mut bytes = match value {
                    Value::Int(_) | Value::Layer(_) => {
                        return Err(PacketError::encode(
                            name,
                            format!("'{value}' is not a byte string"),
                        ));
                    }
                    value => loose_bytes(value),
                };
                if let Length::Fixed(len) = length {
                    bytes.resize(*len, 0);
                }
                out.extend(bytes);
            }
            (FieldKind::Bits(_), _) => {
                return Err(PacketError::encode(name, "bit field encoded as bytes"));
            }
            (kind, value) => out.extend(scalar_bytes(name, kind, value)?),
        }
        Ok(())
    }

    /// Strict value of a bit field.
    pub(crate) fn bit_value(&self) -> Result<u64, PacketError> {
        let bits = self.def.kind.bits().unwrap_or(0);
        let value = match &self.value {
            Value::Unset => 0,
            Value::Int(value) => *value,
            Value::Bytes(bytes) | Value::Raw(bytes) if bytes.len() <= 8 => be_uint(bytes),
            other => {
                return Err(PacketError::encode(
                    self.name(),
                    format!("'{other}' is not an integer"),
                ));
            }
        };
        if bits < 64 && value >> bits != 0 {
            return Err(PacketError::encode(
                self.name(),
                format!("{value} does not fit in {bits} bits"),
            ));
        }
        Ok(value)
    }

    /// Lenient wire view of the value. Falls back to the value's natural
    /// bytes when it does not encode under the field's rule.
    pub fn raw_bytes(&self) -> Vec<u8> {
        if let FieldKind::Bits(bits) = self.def.kind {
            let width = (bits as usize).div_ceil(8);
            return match &self.value {
                Value::Unset => vec![0; width],
                Value::Int(value) => value.to_be_bytes()[8 - width.min(8)..].to_vec(),
                value => loose_bytes(value),
            };
        }
        if let Value::Layer(layer) = &self.value {
            return layer.lenient_bytes();
        }
        let mut out = Vec::new();
        match self.encode_into(&mut out) {
            Ok(()) => out,
            Err(_) => loose_bytes(&self.value),
        }
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match (&self.def.kind, &self.value) {
            (FieldKind::IndividualAddress, Value::Int(value)) => {
                serializer.serialize_str(&format_individual_address(*value as u16))
            }
            (FieldKind::GroupAddress, Value::Int(value)) => {
                serializer.serialize_str(&format_group_address(*value as u16))
            }
            (_, Value::Unset) => serializer.serialize_none(),
            (_, Value::Int(value)) => serializer.serialize_u64(*value),
            (_, Value::Bytes(bytes)) | (_, Value::Raw(bytes)) => {
                serializer.serialize_str(&to_hex(bytes))
            }
            (_, Value::Str(text)) => serializer.serialize_str(text),
            (_, Value::Ipv4(addr)) => serializer.serialize_str(&addr.to_string()),
            (_, Value::Mac(mac)) => serializer.serialize_str(&format_mac(mac)),
            (_, Value::Layer(layer)) => layer.serialize(serializer),
        }
    }
}

fn scalar_bytes(name: &str, kind: &FieldKind, value: &Value) -> Result<Vec<u8>, PacketError> {
    let width = kind.width().unwrap_or(0);
    match value {
        Value::Unset => Ok(vec![0; width]),
        Value::Int(value) => int_bytes(name, *value, width),
        Value::Bytes(bytes) if bytes.len() == width => Ok(bytes.clone()),
        Value::Bytes(bytes) => Err(PacketError::encode(
            name,
            format!("expected {width} bytes, got {}", bytes.len()),
        )),
        Value::Ipv4(addr) if width == 4 => Ok(addr.octets().to_vec()),
        Value::Mac(mac) if width == 6 => Ok(mac.to_vec()),
        Value::Str(text) => {
            let parsed = match kind {
                FieldKind::Ipv4 => text
                    .trim()
                    .parse::<Ipv4Addr>()
                    .ok()
                    .map(|addr| addr.octets().to_vec()),
                FieldKind::Mac => parse_mac(text.trim()).map(|mac| mac.to_vec()),
                FieldKind::IndividualAddress => {
                    parse_individual_address(text).map(|addr| addr.to_be_bytes().to_vec())
                }
                FieldKind::GroupAddress => {
                    parse_group_address(text).map(|addr| addr.to_be_bytes().to_vec())
                }
                _ => text
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .and_then(|value| int_bytes(name, value, width).ok()),
            };
            parsed.ok_or_else(|| {
                PacketError::encode(name, format!("'{text}' is not a valid {}", kind.label()))
            })
        }
        other => Err(PacketError::encode(
            name,
            format!("'{other}' cannot be encoded as {}", kind.label()),
        )),
    }
}

fn int_bytes(name: &str, value: u64, width: usize) -> Result<Vec<u8>, PacketError> {
    if width == 0 || width > 8 {
        return Err(PacketError::encode(name, format!("unsupported width {width}")));
    }
    if width < 8 && value >> (width * 8) != 0 {
        return Err(PacketError::encode(
            name,
            format!("{value} does not fit in {width} bytes"),
        ));
    }
    Ok(value.to_be_bytes()[8 - width..].to_vec())
}

/// Natural byte form of a value, independent of any field rule.
fn loose_bytes(value: &Value) -> Vec<u8> {
    match value {
        Value::Unset => Vec::new(),
        Value::Int(value) => {
            let bytes = value.to_be_bytes();
            let skip = bytes.iter().take_while(|b| **b == 0).count().min(7);
            bytes[skip..].to_vec()
        }
        Value::Bytes(bytes) | Value::Raw(bytes) => bytes.clone(),
        Value::Str(text) => text.as_bytes().to_vec(),
        Value::Ipv4(addr) => addr.octets().to_vec(),
        Value::Mac(mac) => mac.to_vec(),
        Value::Layer(layer) => layer.lenient_bytes(),
    }
}

fn be_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

/// Integer value of a sibling field, `Unset` and non-integers reading as `None`.
pub fn int_field(fields: &[Field], name: &str) -> Option<u64> {
    fields
        .iter()
        .find(|field| field.name() == name)
        .and_then(|field| field.value().as_int())
}

/// Parse `area.line.device` into its 16-bit form.
///
/// # Examples
/// ```
/// use layerforge_core::packet::field::parse_individual_address;
///
/// assert_eq!(parse_individual_address("1.1.1"), Some(0x1101));
/// assert_eq!(parse_individual_address("16.0.0"), None);
/// ```
pub fn parse_individual_address(text: &str) -> Option<u16> {
    let parts: Vec<&str> = text.trim().split('.').collect();
    let [area, line, device] = parts.as_slice() else {
        return None;
    };
    let area: u16 = area.parse().ok().filter(|v| *v < 16)?;
    let line: u16 = line.parse().ok().filter(|v| *v < 16)?;
    let device: u16 = device.parse().ok().filter(|v| *v < 256)?;
    Some((area << 12) | (line << 8) | device)
}

/// Parse `main/middle/sub` into its 16-bit form.
///
/// # Examples
/// ```
/// use layerforge_core::packet::field::parse_group_address;
///
/// assert_eq!(parse_group_address("1/2/3"), Some(0x0a03));
/// assert_eq!(parse_group_address("1/8/3"), None);
/// ```
pub fn parse_group_address(text: &str) -> Option<u16> {
    let parts: Vec<&str> = text.trim().split('/').collect();
    let [main, middle, sub] = parts.as_slice() else {
        return None;
    };
    let main: u16 = main.parse().ok().filter(|v| *v < 32)?;
    let middle: u16 = middle.parse().ok().filter(|v| *v < 8)?;
    let sub: u16 = sub.parse().ok().filter(|v| *v < 256)?;
    Some((main << 11) | (middle << 8) | sub)
}

pub fn format_individual_address(addr: u16) -> String {
    format!("{}.{}.{}", addr >> 12, (addr >> 8) & 0x0f, addr & 0xff)
}

pub fn format_group_address(addr: u16) -> String {
    format!("{}/{}/{}", addr >> 11, (addr >> 8) & 0x07, addr & 0xff)
}
