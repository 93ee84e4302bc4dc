//! Actions: the callable unit.
//!
//! An action is a paramlist (keylist-shaped array whose slot 0 is the
//! action archetype), a details array for dispatcher-specific payload, a
//! native dispatcher function, and cached property flags computed once from
//! the compiled paramlist.  Specialization layers an exemplar context over
//! a prior action; the *underlying* action at the root of the chain supplies
//! the canonical parameter identity.

use rill_core::{
    ActionFlags, ActionId, ArrayId, Cell, ContextId, Kind, ParamClass, ParamSpec, StubId,
    SymbolId, series_flags as sf,
};

use crate::core::heap::{Stub, StubData};
use crate::errors::Raise;
use crate::runtime::Runtime;

/// What a dispatcher tells the evaluator to do next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dispatch {
    /// Normal completion with a result value.
    Done(Cell),
    /// Re-invoke the frame with a different phase.  `checked` says whether
    /// the argument types are already known to satisfy that phase.
    Redo { phase: ActionId, checked: bool },
    /// Non-local unwind carrying a payload.
    Thrown(Cell),
}

pub type Dispatcher = fn(&mut Runtime, frame: usize) -> Result<Dispatch, Raise>;

pub struct ActionInfo {
    pub paramlist: ArrayId,
    pub details: ArrayId,
    pub dispatcher: Dispatcher,
    pub flags: ActionFlags,
    /// Root of the specialization/adaptation chain; equals the action's own
    /// id for unspecialized actions.
    pub underlying: ActionId,
    /// Pre-filled argument exemplar, present on specialized actions.
    pub exemplar: Option<ContextId>,
}

impl Runtime {
    /// Validate and compile a parameter spec into a new action.  The
    /// compiled key cells are staged on the data stack, the way all
    /// paramlist construction works here.
    pub fn action_new(&mut self, spec: &[ParamSpec], dispatcher: Dispatcher) -> Result<ActionId, Raise> {
        debug_assert!(
            spec.iter().filter(|p| p.class == ParamClass::Return).count() <= 1,
            "multiple return parameters"
        );

        #[cfg(debug_assertions)]
        for (i, a) in spec.iter().enumerate() {
            for b in &spec[i + 1..] {
                debug_assert!(a.name != b.name, "duplicate parameter #{}", a.name.0);
            }
        }

        let ds_base = self.data_stack.len();
        for param in spec {
            self.data_stack.push(Cell::key(*param));
        }
        let built = self.action_build(spec, dispatcher, ds_base);
        // The staging must unwind even when allocation raised.
        self.data_stack.truncate(ds_base);
        built
    }

    fn action_build(
        &mut self,
        spec: &[ParamSpec],
        dispatcher: Dispatcher,
        ds_base: usize,
    ) -> Result<ActionId, Raise> {
        let paramlist = self.array_alloc_gc(spec.len() + 1)?;
        let stub = Stub {
            flags: sf::MANAGED,
            width: std::mem::size_of::<Cell>() as u8,
            used: 0,
            cap: 0,
            link: None,
            data: StubData::Action(Box::new(ActionInfo {
                paramlist,
                details: ArrayId(StubId(usize::MAX)),
                dispatcher,
                flags: compute_flags(spec),
                underlying: ActionId(StubId(usize::MAX)),
                exemplar: None,
            })),
        };
        let id = ActionId(self.heap.alloc(stub));

        let details = self.array_alloc_gc(1)?;
        {
            let info = self.action_info_mut(id);
            info.underlying = id;
            info.details = details;
        }

        self.array_push(paramlist, Cell::action(id))?; // archetype
        for i in ds_base..self.data_stack.len() {
            let key = self.data_stack[i];
            self.array_push(paramlist, key)?;
        }
        Ok(id)
    }

    pub fn action_info(&self, id: ActionId) -> &ActionInfo {
        match &self.heap.get(id.stub()).data {
            StubData::Action(info) => info,
            _ => panic!("stub is not an action"),
        }
    }

    pub(crate) fn action_info_mut(&mut self, id: ActionId) -> &mut ActionInfo {
        match &mut self.heap.get_mut(id.stub()).data {
            StubData::Action(info) => info,
            _ => panic!("stub is not an action"),
        }
    }

    pub fn action_paramlist(&self, id: ActionId) -> ArrayId {
        self.action_info(id).paramlist
    }

    /// Declared parameter count (paramlist minus the archetype slot).
    pub fn action_num_params(&self, id: ActionId) -> usize {
        self.array_len(self.action_paramlist(id)) - 1
    }

    pub fn action_param(&self, id: ActionId, index: usize) -> ParamSpec {
        debug_assert!(index >= 1);
        self.array_get(self.action_paramlist(id), index)
            .expect("paramlist inaccessible")
            .as_key()
    }

    /// Declared return constraint, if the action has one.
    pub fn action_return_spec(&self, id: ActionId) -> Option<ParamSpec> {
        let n = self.action_num_params(id);
        (1..=n)
            .map(|i| self.action_param(id, i))
            .find(|p| p.class == ParamClass::Return)
    }

    /// Derive an action with some parameters pre-filled.  The result shares
    /// the base's underlying identity; dispatch resolves through the
    /// exemplar to find which parameters remain user-fillable.
    pub fn action_specialize(
        &mut self,
        base: ActionId,
        fills: &[(SymbolId, Cell)],
    ) -> Result<ActionId, Raise> {
        let base_info = self.action_info(base);
        let underlying = base_info.underlying;
        let paramlist = base_info.paramlist;
        let base_exemplar = base_info.exemplar;
        let dispatcher = base_info.dispatcher;
        let flags = base_info.flags;
        let num_params = self.action_num_params(base);

        // The paramlist doubles as the exemplar's keylist; any later key
        // mutation of the exemplar must fork rather than edit it.
        self.keylist_mark_shared(paramlist);

        let varlist = self.array_alloc(num_params + 1, 0)?;
        let exemplar = ContextId(varlist.stub());
        self.heap.get_mut(varlist.stub()).link = Some(paramlist.stub());
        self.array_push(varlist, Cell::object(exemplar))?;
        for index in 1..=num_params {
            let inherited = match base_exemplar {
                Some(prior) => self.context_var(prior, index)?,
                None => Cell::nulled(),
            };
            self.array_push(varlist, inherited)?;
        }

        for &(name, value) in fills {
            let index = self
                .context_find(exemplar, name)
                .ok_or(Raise::Unbound(name))?;
            let param = self.context_key(exemplar, index);
            // Null marks an unspecialized slot, so no fill may carry it.
            if value.kind() == Kind::Nulled {
                return Err(Raise::TypeMismatch {
                    param: Some(name),
                    expected: param.constraint,
                    found: Kind::Nulled,
                });
            }
            if param.class != ParamClass::Refinement
                && !param.constraint.is_empty()
                && !param.constraint.contains(value.kind())
            {
                return Err(Raise::TypeMismatch {
                    param: Some(name),
                    expected: param.constraint,
                    found: value.kind(),
                });
            }
            self.context_set_var(exemplar, index, value)?;
        }
        self.context_manage(exemplar);

        let details = self.array_alloc_gc(1)?;
        self.array_push(details, Cell::object(exemplar))?;
        let stub = Stub {
            flags: sf::MANAGED,
            width: std::mem::size_of::<Cell>() as u8,
            used: 0,
            cap: 0,
            link: None,
            data: StubData::Action(Box::new(ActionInfo {
                paramlist,
                details,
                dispatcher,
                flags,
                underlying,
                exemplar: Some(exemplar),
            })),
        };
        Ok(ActionId(self.heap.alloc(stub)))
    }
}

fn compute_flags(spec: &[ParamSpec]) -> ActionFlags {
    let checks_return = spec
        .iter()
        .any(|p| p.class == ParamClass::Return && !p.constraint.is_empty());
    ActionFlags { checks_return }
}
