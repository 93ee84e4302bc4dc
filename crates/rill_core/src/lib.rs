//! Core types for the Rill execution engine.
//!
//! This crate contains the fundamental types that are independent of the
//! runtime:
//! - `Cell` - fixed-size tagged value record
//! - `Kind` / `TypeSet` - datatype kinds and the quote-encoding kind byte
//! - `Binding` - unbound / relative / specific word binding
//! - handle newtypes into the runtime's stub table

pub mod bind;
pub mod cell;
pub mod flags;
pub mod id;
pub mod kind;

pub use bind::Binding;
pub use cell::{Cell, CellHeader, Payload, cell_flags};
pub use flags::{ActionFlags, ParamClass, ParamSpec, series as series_flags};
pub use id::{ActionId, ArrayId, ContextId, PairId, StubId, SymbolId};
pub use kind::{Kind, MAX_INLINE_QUOTE, MAX_KIND, TypeSet};
