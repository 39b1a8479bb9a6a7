use std::net::{IpAddr, SocketAddr};

use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use pcap_parser::Linktype;
use thiserror::Error;

/// Errors returned by UDP slicing.
///
/// # Examples
/// ```
/// use layerforge_core::capture::UdpError;
///
/// let err = UdpError::MissingNetworkLayer;
/// assert!(err.to_string().contains("missing network layer"));
/// ```
#[derive(Debug, Error)]
pub enum UdpError {
    #[error("packet slice error: {0}")]
    Slice(String),
    #[error("missing network layer in packet")]
    MissingNetworkLayer,
}

/// UDP datagram sliced out of a link-layer packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram<'a> {
    pub src: SocketAddr,
    pub dst: SocketAddr,
    pub payload: &'a [u8],
}

impl Datagram<'_> {
    /// Whether either endpoint uses `port`.
    pub fn uses_port(&self, port: u16) -> bool {
        self.src.port() == port || self.dst.port() == port
    }
}

/// Slice a UDP datagram from an Ethernet or raw IP packet.
///
/// Returns `Ok(None)` for other linktypes and non-UDP traffic.
pub fn slice_udp(linktype: Linktype, data: &[u8]) -> Result<Option<Datagram<'_>>, UdpError> {
    let sliced = match linktype {
        Linktype::ETHERNET => SlicedPacket::from_ethernet(data),
        Linktype::RAW | Linktype::IPV4 | Linktype::IPV6 => SlicedPacket::from_ip(data),
        _ => return Ok(None),
    }
    .map_err(|e| UdpError::Slice(e.to_string()))?;

    let net = sliced.net.ok_or(UdpError::MissingNetworkLayer)?;
    let Some(TransportSlice::Udp(udp)) = sliced.transport else {
        return Ok(None);
    };
    let (src_ip, dst_ip) = match &net {
        NetSlice::Ipv4(ipv4) => (
            IpAddr::V4(ipv4.header().source_addr()),
            IpAddr::V4(ipv4.header().destination_addr()),
        ),
        NetSlice::Ipv6(ipv6) => (
            IpAddr::V6(ipv6.header().source_addr()),
            IpAddr::V6(ipv6.header().destination_addr()),
        ),
    };
    Ok(Some(Datagram {
        src: SocketAddr::new(src_ip, udp.source_port()),
        dst: SocketAddr::new(dst_ip, udp.destination_port()),
        payload: udp.payload(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use etherparse::PacketBuilder;

    fn ethernet_udp(sport: u16, dport: u16, payload: &[u8]) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
            .ipv4([192, 168, 0, 1], [192, 168, 0, 2], 64)
            .udp(sport, dport);
        let mut packet = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut packet, payload).unwrap();
        packet
    }

    #[test]
    fn slices_udp_payload() {
        let packet = ethernet_udp(50000, 3671, &[0x06, 0x10]);
        let datagram = slice_udp(Linktype::ETHERNET, &packet).unwrap().unwrap();
        assert_eq!(datagram.src.to_string(), "192.168.0.1:50000");
        assert_eq!(datagram.dst.port(), 3671);
        assert_eq!(datagram.payload, &[0x06, 0x10]);
        assert!(datagram.uses_port(3671));
    }

    #[test]
    fn ignores_tcp() {
        let builder = PacketBuilder::ethernet2([1; 6], [2; 6])
            .ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
            .tcp(1000, 3671, 0, 0);
        let mut packet = Vec::with_capacity(builder.size(0));
        builder.write(&mut packet, &[]).unwrap();
        assert!(slice_udp(Linktype::ETHERNET, &packet).unwrap().is_none());
    }

    #[test]
    fn empty_frame_is_a_slice_error() {
        let result = slice_udp(Linktype::ETHERNET, &[]);
        assert!(matches!(result, Err(UdpError::Slice(_))));
    }
}
