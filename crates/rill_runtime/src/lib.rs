//! Rill execution core: series memory, garbage collection, and the frame
//! evaluator.

#![allow(clippy::new_without_default)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::bool_assert_comparison)]

pub mod core;
pub mod errors;
mod eval;
mod gc;
mod natives;
mod quoting;
mod runtime;

pub use crate::core::action::{ActionInfo, Dispatch, Dispatcher};
pub use crate::core::array::{CopyMode, scan_to_end};
pub use crate::core::heap::{Stub, StubData};
pub use crate::core::symbol::SymbolTable;
pub use errors::{Raise, ReadOnlyCause};
pub use eval::{Feed, Frame, Step};
pub use gc::Guard;
pub use runtime::{Runtime, RuntimeConfig};

pub use rill_core::{
    ActionFlags, ActionId, ArrayId, Binding, Cell, ContextId, Kind, MAX_INLINE_QUOTE,
    PairId, ParamClass, ParamSpec, Payload, StubId, SymbolId, TypeSet,
    series_flags,
};
