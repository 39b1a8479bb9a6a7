//! KNXnet/IP frames.
//!
//! The header carries a `service_identifier` selecting one of the service
//! bodies in `layers`; tunnelling and configuration bodies carry a cEMI
//! message whose `message_code` selects its own layout. Both selections are
//! exposed as read-only [`LayoutRegistry`] tables built once per process.
//!
//! Codes and names live in `layout`, layer constructors in `layers`, and the
//! descriptor-driven construction of [`KnxFrame`] in `builder`.

pub mod builder;
pub mod layers;
pub mod layout;

use std::sync::LazyLock;

use crate::frame::{Frame, Protocol};
use crate::packet::{Binding, Bindings, Layer};
use crate::protocols::catalog;
use crate::registry::LayoutRegistry;

pub use builder::KnxFrameBuilder;
pub use layout::{KNX_PORT, MESSAGE_CODES, SERVICES};

/// Protocol configuration for [`KnxFrame`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Knx;

impl Protocol for Knx {
    const NAME: &'static str = "KnxFrame";

    fn empty() -> Layer {
        layers::header()
    }
}

pub type KnxFrame = Frame<Knx>;

/// Header-to-body bindings, one per service identifier.
pub fn bindings() -> Bindings {
    layers::SERVICE_BODIES
        .iter()
        .fold(Bindings::new(), |table, (code, ctor)| {
            table.bind(
                Binding::new(layers::HEADER, *ctor).when("service_identifier", u64::from(*code)),
            )
        })
}

static SERVICE_LAYOUTS: LazyLock<LayoutRegistry> = LazyLock::new(|| {
    LayoutRegistry::from_bindings(catalog(), layers::HEADER, "service_identifier")
});

static CEMI_LAYOUTS: LazyLock<LayoutRegistry> = LazyLock::new(|| {
    LayoutRegistry::new(
        "message_code",
        layers::CEMI_BODIES
            .iter()
            .map(|(code, ctor)| (u64::from(*code), *ctor)),
    )
});

/// Service body layouts keyed by `service_identifier`.
pub fn service_layouts() -> &'static LayoutRegistry {
    &SERVICE_LAYOUTS
}

/// cEMI payload layouts keyed by `message_code`.
pub fn cemi_layouts() -> &'static LayoutRegistry {
    &CEMI_LAYOUTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registries_are_well_formed() {
        assert!(service_layouts().validate().is_ok());
        assert!(cemi_layouts().validate().is_ok());
        assert_eq!(service_layouts().len(), SERVICES.iter().count());
    }

    #[test]
    fn every_service_has_a_name() {
        for code in service_layouts().codes() {
            assert!(SERVICES.name(code).is_some(), "missing name for {code:#06x}");
        }
    }
}
