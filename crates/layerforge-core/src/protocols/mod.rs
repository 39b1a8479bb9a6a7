//! Protocol definitions built on the `packet` primitive.
//!
//! Each protocol module provides:
//! - `layout`: codes, names and sizes (source of truth)
//! - layer constructors returning layers with default values
//! - the bindings stacking its layers, merged into [`catalog`]
//! - a [`crate::frame::Protocol`] configuration for the frame facade

pub mod knx;
pub mod raw;
pub mod udp;

use std::sync::LazyLock;

use crate::packet::Bindings;

static CATALOG: LazyLock<Bindings> = LazyLock::new(|| {
    let mut table = Bindings::new();
    for binding in knx::bindings().iter().chain(udp::bindings().iter()) {
        table.push(binding.clone());
    }
    tracing::trace!(bindings = table.len(), "binding catalog built");
    table
});

/// Process-wide, read-only binding table of every protocol module.
pub fn catalog() -> &'static Bindings {
    &CATALOG
}
