//! Layerforge core library: structured protocol frames without hand-encoding.
//!
//! The crate is split in three tiers:
//! - `packet`: the field/layer primitive (typed fields, bit packing, automatic
//!   length fields, nested layers, dissection and layer bindings).
//! - `frame`: the protocol-agnostic [`Frame`] facade, which resolves field
//!   names across nested layers and payloads and exposes typed and raw access.
//! - `protocols`: concrete layouts (KNXnet/IP, UDP) plus the read-only
//!   [`LayoutRegistry`] tables that map type codes to layouts.
//!
//! `capture` and `inspect` feed recorded traffic through the same decoder and
//! aggregate the result into a deterministic report. All file I/O is isolated
//! in `capture`.
//!
//! Invariants:
//! - Assignment never fails on value shape; encoding is the single point where
//!   values are validated.
//! - Field lookup is deterministic: own fields, then nested layers, then payload.
//! - Registries and the binding catalog are built once and never mutated.
//!
//! Version française (résumé):
//! Cette crate fournit des trames protocolaires structurées : primitives de
//! champs et de couches (`packet`), façade générique (`frame`), définitions
//! KNXnet/IP et UDP (`protocols`). L'inspection hors ligne de captures PCAP
//! réutilise le même décodeur et produit un rapport déterministe.
//!
//! # Examples
//! ```
//! use layerforge_core::KnxFrame;
//!
//! let mut frame = KnxFrame::with_type("TUNNELING_REQUEST")?;
//! frame.set("destination_address", "1/2/4")?;
//! let bytes = frame.to_bytes()?;
//!
//! let decoded = KnxFrame::from_bytes(&bytes)?;
//! assert_eq!(decoded.type_name(), "TUNNELING_REQUEST");
//! assert_eq!(decoded.get("destination_address")?.as_int(), Some(0x0a04));
//! # Ok::<(), layerforge_core::FrameError>(())
//! ```

pub mod capture;
pub mod descriptor;
pub mod frame;
mod inspect;
pub mod packet;
pub mod protocols;
pub mod registry;

pub use capture::{PacketEvent, PacketSource, PcapFileSource, SourceError};
pub use descriptor::Descriptor;
pub use frame::{FieldRef, Frame, FrameError, Lookup, Protocol};
pub use inspect::{
    CaptureSummary, DEFAULT_GENERATED_AT, FrameRecord, InputInfo, InspectError, InspectReport,
    REPORT_VERSION, ServiceCount, ToolInfo, inspect_capture_file, inspect_source,
};
pub use protocols::knx::{KNX_PORT, KnxFrame, KnxFrameBuilder};
pub use protocols::raw::RawFrame;
pub use protocols::udp::UdpFrame;
pub use registry::{CodeTable, LayoutRegistry};
