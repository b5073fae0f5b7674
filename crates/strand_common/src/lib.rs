//! Shared foundational types for the Strand cycle simulator.
//!
//! This crate provides the fixed-width [`Bits`] value type, the dense
//! [`Arena`] used for ID-indexed storage, and interned identifiers for
//! module and signal names.

#![warn(missing_docs)]

pub mod arena;
pub mod bits;
pub mod ident;

pub use arena::{Arena, ArenaId};
pub use bits::{Bits, WidthError};
pub use ident::{Ident, Interner};
