//! Call execution: argument fulfillment and dispatch.
//!
//! Per call: PUSH argument storage sized to the underlying action, GATHER
//! arguments left-to-right from the feed according to each parameter's
//! class, DISPATCH the phase's native dispatcher (which may redo with a
//! different phase), TYPECHECK the return if declared, then DROP.

use rill_core::{
    ActionId, ArrayId, Cell, ContextId, Kind, ParamClass, ParamSpec, SymbolId,
    series_flags as sf,
};

use crate::core::action::Dispatch;
use crate::core::heap::{Stub, StubData};
use crate::errors::Raise;
use crate::eval::Step;
use crate::runtime::Runtime;

impl Runtime {
    /// Invoke an action, consuming arguments from the parent frame's feed.
    pub(crate) fn run_action(
        &mut self,
        parent: usize,
        action: ActionId,
        label: Option<SymbolId>,
    ) -> Result<Step, Raise> {
        let feed = self.frames[parent].feed;
        let child = self.frame_push(feed);
        let result = self.call_with_frame(child, action, label);
        let advanced = self.frames[child].feed.index;
        self.frame_drop(child);
        self.frames[parent].feed.index = advanced;
        result
    }

    fn call_with_frame(
        &mut self,
        child: usize,
        action: ActionId,
        label: Option<SymbolId>,
    ) -> Result<Step, Raise> {
        let info = self.action_info(action);
        let exemplar = info.exemplar;
        let paramlist = info.paramlist;
        let num_params = self.action_num_params(action);

        let args = self.push_args(paramlist, num_params)?;
        {
            let frame = &mut self.frames[child];
            frame.original = Some(action);
            frame.phase = Some(action);
            frame.args = Some(args);
            frame.label = label;
        }

        match self.gather(child, action, exemplar, paramlist, num_params)? {
            Some(thrown) => return Ok(Step::Thrown(thrown)),
            None => {}
        }

        let out = loop {
            let phase = self.frames[child].phase.expect("dispatch without phase");
            let dispatcher = self.action_info(phase).dispatcher;
            match dispatcher(self, child)? {
                Dispatch::Done(value) => break value,
                Dispatch::Thrown(payload) => return Ok(Step::Thrown(payload)),
                Dispatch::Redo { phase, checked } => {
                    self.frames[child].phase = Some(phase);
                    if !checked {
                        self.typecheck_args(child, phase)?;
                    }
                }
            }
        };

        if self.action_info(action).flags.checks_return {
            if let Some(ret) = self.action_return_spec(action) {
                if !ret.constraint.contains(out.kind()) {
                    return Err(Raise::TypeMismatch {
                        param: None,
                        expected: ret.constraint,
                        found: out.kind(),
                    });
                }
            }
        }

        self.frames[child].out = out;
        Ok(Step::Value(out))
    }

    /// Allocate (or recycle) argument storage keyed by the shared
    /// paramlist.  The varlist stays unmanaged; the frame owns it unless a
    /// dispatcher captures it.
    fn push_args(&mut self, paramlist: ArrayId, num_params: usize) -> Result<ContextId, Raise> {
        self.keylist_mark_shared(paramlist);
        self.check_memory((num_params + 2) * std::mem::size_of::<Cell>())?;

        let mut cells = self.varlist_pool.pop().unwrap_or_default();
        cells.clear();
        cells.push(Cell::blank()); // archetype, patched below
        for _ in 0..num_params {
            cells.push(Cell::nulled());
        }
        cells.push(Cell::END);

        let stub = Stub {
            flags: sf::IS_ARRAY,
            width: std::mem::size_of::<Cell>() as u8,
            used: num_params + 1,
            cap: num_params + 1,
            link: Some(paramlist.stub()),
            data: StubData::Cells(cells),
        };
        let args = ContextId(self.heap.alloc(stub));
        *self.array_cell_mut(args.varlist(), 0) = Cell::object(args);
        Ok(args)
    }

    /// Walk the source feed, filling each declared parameter per its class.
    /// Returns a thrown payload if argument evaluation threw.
    fn gather(
        &mut self,
        child: usize,
        action: ActionId,
        exemplar: Option<ContextId>,
        paramlist: ArrayId,
        num_params: usize,
    ) -> Result<Option<Cell>, Raise> {
        let args = self.frame_args(child);
        // Parameters ahead of any refinement are unconditionally in use.
        let mut in_use = true;

        for slot in 1..=num_params {
            let param = self
                .array_get(paramlist, slot)
                .expect("paramlist inaccessible")
                .as_key();

            if let Some(exemplar) = exemplar {
                let prefilled = self.context_var(exemplar, slot)?;
                if prefilled.kind() != Kind::Nulled {
                    if param.class == ParamClass::Refinement {
                        in_use = prefilled.is_truthy();
                    }
                    *self.array_cell_mut(args.varlist(), slot) = prefilled;
                    continue;
                }
            }

            match param.class {
                // Variadic slots stay unfulfilled; the dispatcher pulls from
                // the feed itself.
                ParamClass::Local | ParamClass::Return | ParamClass::Variadic => continue,
                ParamClass::Refinement => {
                    // Not specialized on: it and its gated parameters stay
                    // unfulfilled.
                    in_use = false;
                    continue;
                }
                _ if !in_use => continue,

                ParamClass::Normal => match self.eval_step(child)? {
                    Step::Finished => {
                        return Err(Raise::ArityMismatch { param: param.name });
                    }
                    Step::Thrown(payload) => return Ok(Some(payload)),
                    Step::Value(value) => {
                        check_arg(&param, value)?;
                        *self.array_cell_mut(args.varlist(), slot) = value;
                    }
                },

                ParamClass::HardQuote => {
                    let feed = self.frames[child].feed;
                    if feed.index >= self.array_len(feed.array) {
                        if param.skippable {
                            continue;
                        }
                        return Err(Raise::ArityMismatch { param: param.name });
                    }
                    let next = self.array_get(feed.array, feed.index)?;
                    if param.skippable
                        && !param.constraint.is_empty()
                        && !param.constraint.contains(next.kind())
                    {
                        // Declines the input; slot stays unfulfilled and the
                        // feed is not consumed.
                        continue;
                    }
                    self.frames[child].feed.index = feed.index + 1;
                    check_arg(&param, next)?;
                    *self.array_cell_mut(args.varlist(), slot) = next;
                }

                ParamClass::SoftQuote => {
                    let feed = self.frames[child].feed;
                    if feed.index >= self.array_len(feed.array) {
                        if param.skippable {
                            continue;
                        }
                        return Err(Raise::ArityMismatch { param: param.name });
                    }
                    let next = self.array_get(feed.array, feed.index)?;
                    if param.skippable
                        && !param.constraint.is_empty()
                        && !param.constraint.contains(next.kind())
                    {
                        // Declined on the literal token, before any escape
                        // evaluation; the feed is not consumed.
                        continue;
                    }
                    self.frames[child].feed.index = feed.index + 1;
                    // Literal, except groups and get-words still evaluate.
                    let value = match next.kind() {
                        Kind::Group => {
                            let (array, _) = next.as_array();
                            match self.eval_array(array)? {
                                Step::Value(value) => value,
                                Step::Thrown(payload) => return Ok(Some(payload)),
                                Step::Finished => unreachable!(),
                            }
                        }
                        Kind::GetWord => self.word_fetch(&next)?,
                        _ => next,
                    };
                    check_arg(&param, value)?;
                    *self.array_cell_mut(args.varlist(), slot) = value;
                }
            }
        }
        Ok(None)
    }

    /// Re-validate already-gathered arguments against another phase's
    /// paramlist (redo with `checked: false`).
    fn typecheck_args(&mut self, child: usize, phase: ActionId) -> Result<(), Raise> {
        let num_params = self.action_num_params(phase);
        for slot in 1..=num_params {
            let param = self.action_param(phase, slot);
            if !param.class.fulfills_from_feed() {
                continue;
            }
            let arg = self.frame_arg(child, slot);
            if arg.kind() != Kind::Nulled {
                check_arg(&param, arg)?;
            }
        }
        Ok(())
    }
}

fn check_arg(param: &ParamSpec, value: Cell) -> Result<(), Raise> {
    if !param.constraint.is_empty() && !param.constraint.contains(value.kind()) {
        return Err(Raise::TypeMismatch {
            param: Some(param.name),
            expected: param.constraint,
            found: value.kind(),
        });
    }
    Ok(())
}
