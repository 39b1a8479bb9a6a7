//! UDP header layer, so KNXnet/IP frames can be composed with and dissected
//! from their transport header.

pub mod layout;

use crate::frame::{Frame, Protocol};
use crate::packet::{Auto, Binding, Bindings, FieldDef, Layer, Value};
use crate::protocols::knx::{KNX_PORT, layers::header};

use layout::{DEFAULT_PORT, UDP};

pub fn udp() -> Layer {
    let port = Value::Int(DEFAULT_PORT.into());
    Layer::new(UDP)
        .with_field(FieldDef::u16("sport").with_default(port.clone()))
        .with_field(FieldDef::u16("dport").with_default(port))
        .with_field(FieldDef::u16("len").auto(Auto::TotalLength))
        .with_field(FieldDef::u16("chksum"))
}

/// UDP to KNXnet/IP on the KNX port. The two-port binding comes first so
/// composition writes both ports; dissection accepts either one.
pub fn bindings() -> Bindings {
    let port = u64::from(KNX_PORT);
    Bindings::new()
        .bind(Binding::new(UDP, header).when("dport", port).when("sport", port))
        .bind(Binding::new(UDP, header).when("dport", port))
        .bind(Binding::new(UDP, header).when("sport", port))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Udp;

impl Protocol for Udp {
    const NAME: &'static str = "UdpFrame";

    fn empty() -> Layer {
        udp()
    }
}

pub type UdpFrame = Frame<Udp>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::catalog;

    #[test]
    fn composition_sets_both_ports() {
        let stacked = catalog().compose(udp(), header());
        assert_eq!(
            stacked.encode().unwrap(),
            vec![0x0e, 0x57, 0x0e, 0x57, 0x00, 0x0e, 0x00, 0x00, 0x06, 0x10, 0x00, 0x00, 0x00, 0x06]
        );
    }

    #[test]
    fn header_is_fixed_size() {
        assert_eq!(udp().wire_len(), layout::HEADER_LEN);
        assert_eq!(UdpFrame::new().len(), layout::HEADER_LEN);
    }

    #[test]
    fn dissection_accepts_either_port() {
        let bytes = [0x0e, 0x57, 0xc3, 0x50, 0x00, 0x0e, 0x00, 0x00, 0x06, 0x10, 0x00, 0x00, 0x00, 0x06];
        let frame = UdpFrame::from_bytes(&bytes).unwrap();
        assert_eq!(frame.root().payload().unwrap().name(), "KNXnet/IP");
        assert_eq!(frame.get("dport").unwrap(), &Value::Int(50000));
    }
}
