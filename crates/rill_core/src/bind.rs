//! Word binding.
//!
//! A cell's binding slot is exactly one of: unbound, relative to an action
//! (legal only inside that action's unexpanded body), or specific to a
//! context.  Modeling this as an enum instead of a nullable pointer plus a
//! side flag makes "forgot to check which kind" unrepresentable.

use crate::id::{ActionId, ContextId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Binding {
    #[default]
    Unbound,
    /// Bound to a parameter of an action; resolved against a live frame
    /// running that action.
    Relative(ActionId),
    /// Bound to a field of a context.
    Specific(ContextId),
}

impl Binding {
    pub fn is_unbound(self) -> bool {
        matches!(self, Binding::Unbound)
    }

    pub fn specific(self) -> Option<ContextId> {
        match self {
            Binding::Specific(ctx) => Some(ctx),
            _ => None,
        }
    }

    pub fn relative(self) -> Option<ActionId> {
        match self {
            Binding::Relative(act) => Some(act),
            _ => None,
        }
    }
}
