use std::io::{Read, Seek, SeekFrom};

use pcap_parser::Linktype;

use super::error::PcapSourceError;

pub const PCAPNG_MAGIC: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];
pub const READER_BUFFER_SIZE: usize = 65536;

/// Peek at the file magic, leaving the reader at offset 0.
pub fn peek_magic<R: Read + Seek>(reader: &mut R) -> Result<[u8; 4], PcapSourceError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(magic)
}

pub fn is_pcapng(magic: &[u8; 4]) -> bool {
    *magic == PCAPNG_MAGIC
}

/// Linktype of a PCAPNG interface; unknown interfaces read as Ethernet.
pub fn interface_linktype(linktypes: &[Linktype], if_id: u32) -> Linktype {
    linktypes
        .get(if_id as usize)
        .copied()
        .unwrap_or(Linktype::ETHERNET)
}

/// PCAPNG timestamps default to microsecond resolution.
pub fn pcapng_seconds(ts_high: u32, ts_low: u32) -> f64 {
    let ticks = (u64::from(ts_high) << 32) | u64::from(ts_low);
    ticks as f64 / 1e6
}

pub fn legacy_seconds(ts_sec: u32, ts_usec: u32) -> f64 {
    f64::from(ts_sec) + f64::from(ts_usec) / 1e6
}
