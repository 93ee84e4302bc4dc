//! Core runtime infrastructure.
//!
//! - `heap` - the stub table and allocation accounting
//! - `series` - the width-typed buffer manager
//! - `array` / `context` / `action` - the structured layers over series
//! - `symbol` - word spelling interner

pub mod action;
pub mod array;
pub mod context;
pub mod heap;
pub mod series;
pub mod symbol;
