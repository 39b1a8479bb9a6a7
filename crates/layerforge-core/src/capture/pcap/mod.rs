//! PCAP and PCAPNG file source.

pub mod error;
mod reader;

use std::fs::File;
use std::path::Path;

use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{Block, LegacyPcapReader, Linktype, PcapBlockOwned, PcapError, PcapNGReader};

use super::{PacketEvent, PacketSource, SourceError};
use error::PcapSourceError;
use reader::{
    READER_BUFFER_SIZE, interface_linktype, is_pcapng, legacy_seconds, pcapng_seconds, peek_magic,
};

/// Packet source over a capture file, format detected from its magic.
pub struct PcapFileSource {
    format: Format,
}

enum Format {
    Legacy {
        reader: LegacyPcapReader<File>,
        linktype: Linktype,
    },
    Ng {
        reader: PcapNGReader<File>,
        linktypes: Vec<Linktype>,
    },
}

impl PcapFileSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let mut file = File::open(path)?;
        let magic = peek_magic(&mut file)?;
        let format = if is_pcapng(&magic) {
            let reader = PcapNGReader::new(READER_BUFFER_SIZE, file)
                .map_err(|e| PcapSourceError::pcap("pcapng header", e))?;
            Format::Ng {
                reader,
                linktypes: Vec::new(),
            }
        } else {
            let reader = LegacyPcapReader::new(READER_BUFFER_SIZE, file)
                .map_err(|e| PcapSourceError::pcap("pcap header", e))?;
            Format::Legacy {
                reader,
                linktype: Linktype::ETHERNET,
            }
        };
        tracing::debug!(path = %path.display(), pcapng = is_pcapng(&magic), "capture opened");
        Ok(Self { format })
    }
}

impl PacketSource for PcapFileSource {
    fn next_packet(&mut self) -> Result<Option<PacketEvent>, SourceError> {
        let event = match &mut self.format {
            Format::Legacy { reader, linktype } => pump(reader, "pcap", |block| match block {
                PcapBlockOwned::LegacyHeader(header) => {
                    *linktype = header.network;
                    None
                }
                PcapBlockOwned::Legacy(packet) => Some(PacketEvent {
                    ts: Some(legacy_seconds(packet.ts_sec, packet.ts_usec)),
                    linktype: *linktype,
                    data: packet.data.to_vec(),
                }),
                _ => None,
            }),
            Format::Ng { reader, linktypes } => pump(reader, "pcapng", |block| match block {
                PcapBlockOwned::NG(Block::InterfaceDescription(intf)) => {
                    linktypes.push(intf.linktype);
                    None
                }
                PcapBlockOwned::NG(Block::EnhancedPacket(packet)) => Some(PacketEvent {
                    ts: Some(pcapng_seconds(packet.ts_high, packet.ts_low)),
                    linktype: interface_linktype(linktypes, packet.if_id),
                    data: packet.data.to_vec(),
                }),
                _ => None,
            }),
        };
        Ok(event?)
    }
}

/// Read blocks until `on_block` yields a packet, refilling the buffer when a
/// block straddles it.
fn pump<R, F>(
    reader: &mut R,
    context: &'static str,
    mut on_block: F,
) -> Result<Option<PacketEvent>, PcapSourceError>
where
    R: PcapReaderIterator,
    F: FnMut(PcapBlockOwned<'_>) -> Option<PacketEvent>,
{
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                let event = on_block(block);
                reader.consume(offset);
                if event.is_some() {
                    return Ok(event);
                }
            }
            Err(PcapError::Eof) => return Ok(None),
            Err(PcapError::Incomplete(_)) => {
                reader
                    .refill()
                    .map_err(|e| PcapSourceError::pcap(context, e))?;
            }
            Err(e) => return Err(PcapSourceError::pcap(context, e)),
        }
    }
}
