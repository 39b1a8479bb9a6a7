use crate::descriptor::Descriptor;
use crate::frame::{FrameError, resolve};
use crate::packet::{Layer, Value};
use crate::protocols::catalog;

use super::layers::{self, HEADER};
use super::layout::{MESSAGE_CODES, SERVICES};
use super::{KnxFrame, cemi_layouts, service_layouts};

/// Field holding the cEMI message inside tunnelling and configuration bodies.
const CEMI_SLOT: &str = "cemi";

impl KnxFrame {
    /// Build the frame a service descriptor names. An empty descriptor yields
    /// the header-only frame.
    ///
    /// # Examples
    /// ```
    /// use layerforge_core::KnxFrame;
    ///
    /// let frame = KnxFrame::with_type("DESCRIPTION REQUEST")?;
    /// assert_eq!(frame.type_name(), "DESCRIPTION_REQUEST");
    /// assert_eq!(
    ///     frame.to_bytes()?,
    ///     [0x06, 0x10, 0x02, 0x03, 0x00, 0x0e, 0x08, 0x01, 0, 0, 0, 0, 0, 0]
    /// );
    /// # Ok::<(), layerforge_core::FrameError>(())
    /// ```
    pub fn with_type(descriptor: impl Into<Descriptor>) -> Result<Self, FrameError> {
        let mut frame = Self::new();
        frame.set_type(descriptor)?;
        Ok(frame)
    }

    pub fn builder() -> KnxFrameBuilder {
        KnxFrameBuilder::default()
    }

    /// Replace the layer tree with the header followed by the body the
    /// descriptor names.
    pub fn set_type(&mut self, descriptor: impl Into<Descriptor>) -> Result<(), FrameError> {
        let descriptor = descriptor.into();
        let Some(code) = descriptor.resolve(&SERVICES)? else {
            *self.root_mut() = layers::header();
            return Ok(());
        };
        let body = service_layouts().lookup(code).inspect_err(|_| {
            tracing::debug!(descriptor = %descriptor, code, "no service layout");
        })?;
        let mut root = catalog().compose(layers::header(), body());
        root.set(service_layouts().discriminator(), code);
        tracing::trace!(code, body = root.deepest().name(), "service resolved");
        *self.root_mut() = root;
        Ok(())
    }

    /// Select the cEMI message of a tunnelling or configuration frame. An
    /// empty descriptor leaves the frame unchanged.
    pub fn set_cemi(&mut self, descriptor: impl Into<Descriptor>) -> Result<(), FrameError> {
        let descriptor = descriptor.into();
        let Some(code) = descriptor.resolve(&MESSAGE_CODES)? else {
            return Ok(());
        };
        let slot = resolve::resolve(self.root(), CEMI_SLOT)
            .filter(|path| path.payload_depth() > 0)
            .ok_or_else(|| FrameError::IncompatibleSubtype {
                outer: self.type_name().to_string(),
                field: CEMI_SLOT.to_string(),
            })?;
        let data = cemi_layouts().lookup(code)?;
        let owner = resolve::layer_at_mut(self.root_mut(), slot.steps()).ok_or_else(|| {
            FrameError::FieldNotFound {
                name: CEMI_SLOT.to_string(),
            }
        })?;
        let mut message = layers::cemi();
        message.set(cemi_layouts().discriminator(), code);
        message.set("cemi_data", data());
        owner.fields_mut()[slot.index()].set(message.into());
        tracing::trace!(code, "cEMI message resolved");
        Ok(())
    }
}

enum Init {
    Value(String, Value),
    Raw(String, Vec<u8>),
}

/// Step-by-step construction of a [`KnxFrame`].
///
/// Wire bytes, when supplied, take precedence over the service and cEMI
/// descriptors. Field initializers are applied afterwards in the order they
/// were given; the first failing one aborts the build.
///
/// # Examples
/// ```
/// use layerforge_core::KnxFrame;
///
/// let frame = KnxFrame::builder()
///     .service("CONFIGURATION REQUEST")
///     .cemi("L_Data.req")
///     .field("data", 4u8)
///     .build()?;
/// assert_eq!(frame.get("message_code")?.as_int(), Some(0x11));
/// frame.to_bytes()?;
/// # Ok::<(), layerforge_core::FrameError>(())
/// ```
#[derive(Default)]
pub struct KnxFrameBuilder {
    service: Descriptor,
    cemi: Descriptor,
    bytes: Option<Vec<u8>>,
    inits: Vec<Init>,
}

impl KnxFrameBuilder {
    pub fn service(mut self, descriptor: impl Into<Descriptor>) -> Self {
        self.service = descriptor.into();
        self
    }

    pub fn cemi(mut self, descriptor: impl Into<Descriptor>) -> Self {
        self.cemi = descriptor.into();
        self
    }

    pub fn bytes(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.bytes = Some(bytes.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inits.push(Init::Value(name.into(), value.into()));
        self
    }

    pub fn raw_field(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.inits.push(Init::Raw(name.into(), bytes.into()));
        self
    }

    pub fn build(self) -> Result<KnxFrame, FrameError> {
        let mut frame = match &self.bytes {
            Some(bytes) => KnxFrame::from_bytes(bytes)?,
            None => {
                let mut frame = KnxFrame::with_type(self.service)?;
                frame.set_cemi(self.cemi)?;
                frame
            }
        };
        for init in self.inits {
            match init {
                Init::Value(name, value) => frame.set(&name, value)?,
                Init::Raw(name, bytes) => frame.set_raw(&name, &bytes)?,
            }
        }
        Ok(frame)
    }
}

/// Whether `layer` is the KNXnet/IP header.
pub fn is_header(layer: &Layer) -> bool {
    layer.name() == HEADER
}
