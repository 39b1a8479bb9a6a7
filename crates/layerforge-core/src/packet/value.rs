use std::fmt;
use std::net::Ipv4Addr;

use super::layer::Layer;

/// Runtime value held by a field.
///
/// Values are assigned optimistically: any variant can be stored in any
/// field, and only `Layer::encode` checks that the value fits the field's
/// rule.
///
/// # Examples
/// ```
/// use std::net::Ipv4Addr;
/// use layerforge_core::packet::Value;
///
/// assert_eq!(Value::from(0x0203u16), Value::Int(0x0203));
/// assert_eq!(Value::from(Ipv4Addr::new(10, 0, 0, 1)).to_string(), "10.0.0.1");
/// assert!(Value::Unset.is_unset());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    /// No value assigned; encodes as zeroes or as the field's automatic value.
    #[default]
    Unset,
    Int(u64),
    Bytes(Vec<u8>),
    Str(String),
    Ipv4(Ipv4Addr),
    Mac([u8; 6]),
    /// Nested layer held inside a field.
    Layer(Box<Layer>),
    /// Verbatim wire bytes that did not decode into a typed value.
    Raw(Vec<u8>),
}

impl Value {
    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    pub fn as_int(&self) -> Option<u64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_layer(&self) -> Option<&Layer> {
        match self {
            Value::Layer(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_layer_mut(&mut self) -> Option<&mut Layer> {
        match self {
            Value::Layer(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(bytes) | Value::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Self {
        Value::Int(value.into())
    }
}

impl From<u16> for Value {
    fn from(value: u16) -> Self {
        Value::Int(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(value.into())
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Value {
    fn from(value: &[u8; N]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<Ipv4Addr> for Value {
    fn from(value: Ipv4Addr) -> Self {
        Value::Ipv4(value)
    }
}

impl From<Layer> for Value {
    fn from(value: Layer) -> Self {
        Value::Layer(Box::new(value))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unset => write!(f, "unset"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Bytes(bytes) | Value::Raw(bytes) => write!(f, "{}", to_hex(bytes)),
            Value::Str(value) => write!(f, "{value}"),
            Value::Ipv4(addr) => write!(f, "{addr}"),
            Value::Mac(mac) => write!(f, "{}", format_mac(mac)),
            Value::Layer(layer) => write!(f, "<{}>", layer.name()),
        }
    }
}

/// Lower-case hex rendering without separators.
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Parse a hex string, ignoring whitespace, `:` separators and an optional `0x` prefix.
///
/// # Examples
/// ```
/// use layerforge_core::packet::value::from_hex;
///
/// assert_eq!(from_hex("0x06 10").unwrap(), vec![0x06, 0x10]);
/// assert!(from_hex("abc").is_none());
/// ```
pub fn from_hex(text: &str) -> Option<Vec<u8>> {
    let text = text.trim();
    let text = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    let clean: String = text
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && *c != ':')
        .collect();
    hex::decode(clean).ok()
}

pub(crate) fn format_mac(mac: &[u8; 6]) -> String {
    mac.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

pub(crate) fn parse_mac(text: &str) -> Option<[u8; 6]> {
    let mut mac = [0u8; 6];
    let mut parts = text.split([':', '-']);
    for slot in mac.iter_mut() {
        *slot = u8::from_str_radix(parts.next()?, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(mac)
}
