//! Offline packet input.
//!
//! Sources yield link-layer packets with their capture timestamp; `udp`
//! slices them down to UDP datagrams. All file I/O of the crate lives here.

mod pcap;
pub mod udp;

pub use pcap::PcapFileSource;
pub use udp::{Datagram, UdpError, slice_udp};

use pcap_parser::Linktype;
use thiserror::Error;

/// One captured link-layer packet.
#[derive(Debug, Clone)]
pub struct PacketEvent {
    /// Capture time in seconds since the Unix epoch, when recorded.
    pub ts: Option<f64>,
    pub linktype: Linktype,
    pub data: Vec<u8>,
}

pub trait PacketSource {
    fn next_packet(&mut self) -> Result<Option<PacketEvent>, SourceError>;
}

/// In-memory source, handy for feeding captured frames back through the
/// inspection pipeline.
impl PacketSource for std::vec::IntoIter<PacketEvent> {
    fn next_packet(&mut self) -> Result<Option<PacketEvent>, SourceError> {
        Ok(self.next())
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("capture format error: {0}")]
    Format(String),
}

impl From<pcap::error::PcapSourceError> for SourceError {
    fn from(value: pcap::error::PcapSourceError) -> Self {
        match value {
            pcap::error::PcapSourceError::Io(err) => SourceError::Io(err),
            pcap::error::PcapSourceError::Pcap { context, message } => {
                SourceError::Format(format!("{context}: {message}"))
            }
        }
    }
}
