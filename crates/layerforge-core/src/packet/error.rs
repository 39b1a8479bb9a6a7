use thiserror::Error;

/// Errors returned by layer encoding and dissection.
///
/// # Examples
/// ```
/// use layerforge_core::packet::PacketError;
///
/// let err = PacketError::TooShort { layer: "HPAI".to_string(), needed: 8, actual: 3 };
/// assert!(err.to_string().contains("too short"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("{layer}: input too short: need {needed} bytes, got {actual}")]
    TooShort {
        layer: String,
        needed: usize,
        actual: usize,
    },
    #[error("cannot encode field '{field}': {reason}")]
    Encode { field: String, reason: String },
    #[error("bit field '{field}' does not end on a byte boundary")]
    Unaligned { field: String },
}

impl PacketError {
    pub(crate) fn encode(field: &str, reason: impl Into<String>) -> Self {
        PacketError::Encode {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
