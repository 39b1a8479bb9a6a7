use thiserror::Error;

use crate::packet::PacketError;

/// Errors reported by frame construction, field resolution and serialization.
///
/// # Examples
/// ```
/// use layerforge_core::FrameError;
///
/// let err = FrameError::UnknownType { code: 0x0001 };
/// assert_eq!(err.to_string(), "no layout registered for type code 0x0001");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("invalid type descriptor: {0}")]
    InvalidType(String),
    #[error("no layout registered for type code {code:#06x}")]
    UnknownType { code: u64 },
    #[error("type code {code:#06x} is declared by {count} layouts")]
    AmbiguousType { code: u64, count: usize },
    #[error("{outer} has no slot for a '{field}' sub-type")]
    IncompatibleSubtype { outer: String, field: String },
    #[error("field '{name}' not found in frame")]
    FieldNotFound { name: String },
    #[error("no binding between {lower} and {upper}")]
    IncompatibleLayers { lower: String, upper: String },
    #[error(transparent)]
    Packet(#[from] PacketError),
}
