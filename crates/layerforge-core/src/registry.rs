//! Read-only lookup tables: discriminator code to layout constructor, and
//! code to symbolic name.

use std::collections::BTreeMap;

use crate::frame::FrameError;
use crate::packet::{Bindings, LayerCtor, Template};

/// Maps a discriminator code to the layer constructor that declares it.
///
/// Built once from a binding table: every binding from `lower` constrained on
/// the discriminator field contributes one entry.
///
/// # Examples
/// ```
/// use layerforge_core::packet::Layer;
/// use layerforge_core::registry::LayoutRegistry;
///
/// fn body() -> Layer {
///     Layer::new("Body")
/// }
///
/// let registry = LayoutRegistry::new("code", [(0x10, body as fn() -> Layer)]);
/// assert_eq!(registry.lookup(0x10)?().name(), "Body");
/// assert!(registry.lookup(0x11).is_err());
/// # Ok::<(), layerforge_core::FrameError>(())
/// ```
#[derive(Debug, Clone)]
pub struct LayoutRegistry {
    discriminator: String,
    entries: Vec<(u64, LayerCtor)>,
}

impl LayoutRegistry {
    pub fn new(
        discriminator: impl Into<String>,
        entries: impl IntoIterator<Item = (u64, LayerCtor)>,
    ) -> Self {
        Self {
            discriminator: discriminator.into(),
            entries: entries.into_iter().collect(),
        }
    }

    pub fn from_bindings(bindings: &Bindings, lower: &str, discriminator: &str) -> Self {
        let entries = bindings
            .iter()
            .filter(|binding| binding.lower() == lower)
            .filter_map(|binding| {
                let Template::Ctor(ctor) = binding.template() else {
                    return None;
                };
                binding
                    .constraints()
                    .iter()
                    .find(|(field, _)| field == discriminator)
                    .map(|(_, code)| (*code, *ctor))
            });
        Self::new(discriminator, entries)
    }

    /// Name of the field whose value selects the layout.
    pub fn discriminator(&self) -> &str {
        &self.discriminator
    }

    pub fn lookup(&self, code: u64) -> Result<LayerCtor, FrameError> {
        let mut matches = self.entries.iter().filter(|(entry, _)| *entry == code);
        let Some((_, ctor)) = matches.next() else {
            return Err(FrameError::UnknownType { code });
        };
        let extra = matches.count();
        if extra > 0 {
            return Err(FrameError::AmbiguousType {
                code,
                count: extra + 1,
            });
        }
        Ok(*ctor)
    }

    /// Report the first code declared more than once.
    pub fn validate(&self) -> Result<(), FrameError> {
        let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
        for (code, _) in &self.entries {
            *counts.entry(*code).or_default() += 1;
        }
        match counts.into_iter().find(|(_, count)| *count > 1) {
            Some((code, count)) => Err(FrameError::AmbiguousType { code, count }),
            None => Ok(()),
        }
    }

    pub fn codes(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.iter().map(|(code, _)| *code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Static code to name table for a discriminator.
#[derive(Debug, Clone, Copy)]
pub struct CodeTable {
    entries: &'static [(u64, &'static str)],
}

impl CodeTable {
    pub const fn new(entries: &'static [(u64, &'static str)]) -> Self {
        Self { entries }
    }

    pub fn name(&self, code: u64) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == code)
            .map(|(_, name)| *name)
    }

    /// Code whose normalized name equals the normalized `name`.
    pub fn code(&self, name: &str) -> Option<u64> {
        let wanted = normalize(name);
        if wanted.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|(_, entry)| normalize(entry) == wanted)
            .map(|(code, _)| *code)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &'static str)> + '_ {
        self.entries.iter().copied()
    }
}

/// ASCII lower-case `name` and collapse every run of characters outside
/// `[0-9a-zA-Z]` into `_`.
///
/// # Examples
/// ```
/// use layerforge_core::registry::normalize;
///
/// assert_eq!(normalize("DESCRIPTION REQUEST"), "description_request");
/// assert_eq!(normalize("  PropWrite.req "), "propwrite_req");
/// ```
pub fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending && !out.is_empty() {
                out.push('_');
            }
            pending = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending = true;
        }
    }
    out
}
