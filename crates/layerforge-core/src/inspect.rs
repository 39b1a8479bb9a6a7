//! Offline inspection of KNXnet/IP traffic in capture files.
//!
//! Every UDP datagram on the inspected port is decoded with
//! [`KnxFrame::from_bytes`] and summarized in an [`InspectReport`]. Records keep
//! capture order; service counts are sorted by service name.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::capture::{PacketEvent, PacketSource, PcapFileSource, SourceError, slice_udp};
use crate::protocols::knx::KnxFrame;

/// Current report schema version.
pub const REPORT_VERSION: u32 = 1;
/// Default timestamp used when no capture time is available.
pub const DEFAULT_GENERATED_AT: &str = "1970-01-01T00:00:00Z";

#[derive(Debug, Error)]
pub enum InspectError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}

/// Inspection report with deterministic ordering.
///
/// # Examples
/// ```
/// use layerforge_core::InspectReport;
///
/// let report = InspectReport::empty("capture.pcapng", 123);
/// assert_eq!(report.report_version, layerforge_core::REPORT_VERSION);
/// assert!(report.frames.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectReport {
    /// Report schema version (not the binary version).
    pub report_version: u32,
    pub tool: ToolInfo,
    /// RFC3339 timestamp of the last (or first) captured packet.
    pub generated_at: String,
    pub input: InputInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_summary: Option<CaptureSummary>,
    /// Datagrams on the inspected port, in capture order.
    pub frames: Vec<FrameRecord>,
    /// Decoded frames per service, sorted by service name.
    pub service_counts: Vec<ServiceCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputInfo {
    /// Input path as provided to the inspector.
    pub path: String,
    pub bytes: u64,
}

/// Capture-wide counters (timestamps may be absent).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSummary {
    pub packets_total: u64,
    /// UDP datagrams on the inspected port.
    pub datagrams: u64,
    pub decoded: u64,
    pub errors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_end: Option<String>,
}

/// One datagram on the inspected port.
///
/// Decoded frames carry `service` and `layers`; failed ones carry `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Zero-based packet index in the capture.
    pub index: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub src: String,
    pub dst: String,
    /// Payload length in bytes.
    pub length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_identifier: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layers: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCount {
    pub service: String,
    pub count: u64,
}

impl InspectReport {
    /// Report skeleton for `path`, before any packet is read.
    pub fn empty(path: &str, bytes: u64) -> Self {
        Self {
            report_version: REPORT_VERSION,
            tool: ToolInfo {
                name: "layerforge".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            generated_at: DEFAULT_GENERATED_AT.to_string(),
            input: InputInfo {
                path: path.to_string(),
                bytes,
            },
            capture_summary: None,
            frames: Vec::new(),
            service_counts: Vec::new(),
        }
    }
}

/// Inspect a PCAP/PCAPNG file for KNXnet/IP datagrams on `port`.
///
/// # Examples
/// ```no_run
/// use std::path::Path;
///
/// use layerforge_core::{KNX_PORT, inspect_capture_file};
///
/// let report = inspect_capture_file(Path::new("capture.pcapng"), KNX_PORT)?;
/// println!("decoded: {}", report.frames.len());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn inspect_capture_file(path: &Path, port: u16) -> Result<InspectReport, InspectError> {
    let source = PcapFileSource::open(path)?;
    inspect_source(path, source, port)
}

/// Inspect packets from any source; `path` only labels the report and sizes
/// the input.
pub fn inspect_source<S: PacketSource>(
    path: &Path,
    mut source: S,
    port: u16,
) -> Result<InspectReport, InspectError> {
    let mut report = InspectReport::empty(&path.display().to_string(), path.metadata()?.len());
    let mut packets_total = 0u64;
    let mut first_ts = None;
    let mut last_ts = None;
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();

    while let Some(PacketEvent { ts, linktype, data }) = source.next_packet()? {
        let index = packets_total;
        packets_total += 1;
        update_ts_bounds(&mut first_ts, &mut last_ts, ts);
        let datagram = match slice_udp(linktype, &data) {
            Ok(Some(datagram)) if datagram.uses_port(port) => datagram,
            Ok(_) => continue,
            Err(err) => {
                tracing::trace!(index, error = %err, "packet skipped");
                continue;
            }
        };
        let mut record = FrameRecord {
            index,
            timestamp: ts_to_rfc3339(ts),
            src: datagram.src.to_string(),
            dst: datagram.dst.to_string(),
            length: datagram.payload.len(),
            service: None,
            service_identifier: None,
            layers: None,
            error: None,
        };
        match KnxFrame::from_bytes(datagram.payload) {
            Ok(frame) => {
                let service = frame.type_name().to_string();
                *counts.entry(service.clone()).or_default() += 1;
                record.service_identifier = frame
                    .get("service_identifier")
                    .ok()
                    .and_then(|value| value.as_int());
                record.layers = serde_json::to_value(&frame).ok();
                record.service = Some(service);
            }
            Err(err) => {
                tracing::debug!(index, error = %err, "datagram did not decode");
                record.error = Some(err.to_string());
            }
        }
        report.frames.push(record);
    }

    let datagrams = report.frames.len() as u64;
    let errors = report
        .frames
        .iter()
        .filter(|record| record.error.is_some())
        .count() as u64;
    report.capture_summary = Some(CaptureSummary {
        packets_total,
        datagrams,
        decoded: datagrams - errors,
        errors,
        time_start: ts_to_rfc3339(first_ts),
        time_end: ts_to_rfc3339(last_ts),
    });
    report.generated_at = report
        .capture_summary
        .as_ref()
        .and_then(|summary| summary.time_end.clone().or(summary.time_start.clone()))
        .unwrap_or_else(|| DEFAULT_GENERATED_AT.to_string());
    report.service_counts = counts
        .into_iter()
        .map(|(service, count)| ServiceCount { service, count })
        .collect();
    tracing::debug!(packets_total, datagrams, errors, "inspection finished");
    Ok(report)
}

fn update_ts_bounds(first: &mut Option<f64>, last: &mut Option<f64>, ts: Option<f64>) {
    let Some(ts) = ts else {
        return;
    };
    if first.is_none_or(|existing| ts < existing) {
        *first = Some(ts);
    }
    if last.is_none_or(|existing| ts > existing) {
        *last = Some(ts);
    }
}

fn ts_to_rfc3339(ts: Option<f64>) -> Option<String> {
    let ts = ts?;
    if !ts.is_finite() {
        return None;
    }
    let nanos = (ts * 1_000_000_000.0).round() as i128;
    let dt = OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()?;
    dt.format(&Rfc3339).ok()
}
