//! Typed binary records: fields, layers and the bindings that stack them.
//!
//! A [`Layer`] is an ordered list of named [`Field`]s, each encoded by a
//! [`FieldKind`] rule, plus an optional payload layer. Layers encode strictly
//! (`Layer::encode`) and dissect from bytes (`Layer::dissect`), guessing the
//! payload layout from a [`Bindings`] table.
//!
//! # Examples
//! ```
//! use layerforge_core::packet::{Auto, FieldDef, Layer};
//!
//! let layer = Layer::new("Header")
//!     .with_field(FieldDef::u8("header_length").auto(Auto::OwnLength))
//!     .with_field(FieldDef::u16("code"));
//! assert_eq!(layer.encode()?, vec![0x03, 0x00, 0x00]);
//! # Ok::<(), layerforge_core::packet::PacketError>(())
//! ```

mod bind;
mod error;
pub mod field;
mod layer;
mod reader;
pub mod value;

pub use bind::{Binding, Bindings, Template, between_in, guess_in};
pub use error::PacketError;
pub use field::{
    Auto, Condition, Field, FieldDef, FieldKind, LayerCtor, LayerSource, Length, LengthFn,
    SelectFn,
};
pub use layer::{Layer, RAW_LAYER};
pub use reader::{BitWriter, LayerReader, Shortfall};
pub use value::Value;
