#![forbid(unsafe_code)]

mod attachment;
mod cell;
mod element;
mod keyed;
mod matrix;
pub(crate) mod meta;
mod study;

pub use attachment::*;
pub use cell::*;
pub use element::*;
pub use keyed::*;
pub use matrix::*;
pub use meta::{Entity, Identified, Versioned};
pub use study::*;
