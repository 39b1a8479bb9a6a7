//! Protocol-agnostic frames: an empty root, with every dissected byte kept
//! in a `Raw` payload unless a binding claims it.

use crate::frame::{Frame, Protocol};
use crate::packet::Layer;

#[derive(Debug, Clone, Copy, Default)]
pub struct Raw;

impl Protocol for Raw {
    const NAME: &'static str = "RawFrame";

    fn empty() -> Layer {
        Layer::new(Self::NAME)
    }
}

pub type RawFrame = Frame<Raw>;
