use std::fmt;

use crate::frame::FrameError;
use crate::registry::CodeTable;

/// Caller-supplied identification of a frame layout: a symbolic name, a
/// numeric code, or the code's big-endian bytes.
///
/// # Examples
/// ```
/// use layerforge_core::Descriptor;
/// use layerforge_core::protocols::knx::SERVICES;
///
/// assert_eq!(Descriptor::from("description request").resolve(&SERVICES)?, Some(0x0203));
/// assert_eq!(Descriptor::from(&[0x02u8, 0x03][..]).resolve(&SERVICES)?, Some(0x0203));
/// assert_eq!(Descriptor::Empty.resolve(&SERVICES)?, None);
/// # Ok::<(), layerforge_core::FrameError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Descriptor {
    #[default]
    Empty,
    Name(String),
    Code(u64),
    Bytes(Vec<u8>),
}

impl Descriptor {
    pub fn is_empty(&self) -> bool {
        match self {
            Descriptor::Empty => true,
            Descriptor::Name(name) => name.trim().is_empty(),
            Descriptor::Bytes(bytes) => bytes.is_empty(),
            Descriptor::Code(_) => false,
        }
    }

    /// Numeric code for this descriptor, `None` when empty.
    pub fn resolve(&self, table: &CodeTable) -> Result<Option<u64>, FrameError> {
        if self.is_empty() {
            return Ok(None);
        }
        match self {
            Descriptor::Code(code) => Ok(Some(*code)),
            Descriptor::Name(name) => table
                .code(name)
                .map(Some)
                .ok_or_else(|| FrameError::InvalidType(format!("unknown name '{name}'"))),
            Descriptor::Bytes(bytes) if bytes.len() <= 4 => Ok(Some(
                bytes
                    .iter()
                    .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)),
            )),
            Descriptor::Bytes(bytes) => Err(FrameError::InvalidType(format!(
                "{} bytes is too long for a type code",
                bytes.len()
            ))),
            Descriptor::Empty => Ok(None),
        }
    }
}

impl From<&str> for Descriptor {
    fn from(value: &str) -> Self {
        Descriptor::Name(value.to_string())
    }
}

impl From<String> for Descriptor {
    fn from(value: String) -> Self {
        Descriptor::Name(value)
    }
}

impl From<u8> for Descriptor {
    fn from(value: u8) -> Self {
        Descriptor::Code(value.into())
    }
}

impl From<u16> for Descriptor {
    fn from(value: u16) -> Self {
        Descriptor::Code(value.into())
    }
}

impl From<u32> for Descriptor {
    fn from(value: u32) -> Self {
        Descriptor::Code(value.into())
    }
}

impl From<u64> for Descriptor {
    fn from(value: u64) -> Self {
        Descriptor::Code(value)
    }
}

impl From<&[u8]> for Descriptor {
    fn from(value: &[u8]) -> Self {
        Descriptor::Bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for Descriptor {
    fn from(value: Vec<u8>) -> Self {
        Descriptor::Bytes(value)
    }
}

impl<T: Into<Descriptor>> From<Option<T>> for Descriptor {
    fn from(value: Option<T>) -> Self {
        value.map_or(Descriptor::Empty, Into::into)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Descriptor::Empty => write!(f, "<empty>"),
            Descriptor::Name(name) => write!(f, "{name}"),
            Descriptor::Code(code) => write!(f, "{code:#06x}"),
            Descriptor::Bytes(bytes) => write!(f, "0x{}", crate::packet::value::to_hex(bytes)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: CodeTable = CodeTable::new(&[(0x2e, "L_Data.con")]);

    #[test]
    fn names_must_be_known() {
        let err = Descriptor::from("nul").resolve(&TABLE).unwrap_err();
        assert!(matches!(err, FrameError::InvalidType(_)));
        assert_eq!(Descriptor::from("l data con").resolve(&TABLE), Ok(Some(0x2e)));
    }

    #[test]
    fn bytes_read_big_endian() {
        assert_eq!(Descriptor::from(vec![0x2eu8]).resolve(&TABLE), Ok(Some(0x2e)));
        assert_eq!(Descriptor::from(Vec::<u8>::new()).resolve(&TABLE), Ok(None));
        assert!(Descriptor::from(vec![0u8; 5]).resolve(&TABLE).is_err());
    }

    #[test]
    fn codes_pass_through_unchecked() {
        assert_eq!(Descriptor::from(0x80u8).resolve(&TABLE), Ok(Some(0x80)));
        assert_eq!(Descriptor::from(None::<u16>), Descriptor::Empty);
    }
}
