//! Native dispatchers and the base context.
//!
//! Every callable ends in a native dispatcher; interpreted functions are
//! natives whose details carry a relatively-bound body block.  The base
//! context binds a small set of these for evaluation.

use rill_core::{
    ActionId, ArrayId, Binding, Cell, ContextId, Kind, ParamSpec, TypeSet,
};

use crate::core::action::Dispatch;
use crate::core::array::CopyMode;
use crate::errors::Raise;
use crate::eval::Step;
use crate::runtime::Runtime;

const NUMERIC: TypeSet = TypeSet::just(Kind::Integer).with(Kind::Decimal);

fn arith(
    rt: &Runtime,
    frame: usize,
    int_op: fn(i64, i64) -> i64,
    dec_op: fn(f64, f64) -> f64,
) -> Cell {
    let a = rt.frame_arg(frame, 1);
    let b = rt.frame_arg(frame, 2);
    if a.kind() == Kind::Integer && b.kind() == Kind::Integer {
        Cell::integer(int_op(a.as_integer(), b.as_integer()))
    } else {
        let to_f = |c: Cell| match c.kind() {
            Kind::Integer => c.as_integer() as f64,
            _ => c.as_decimal(),
        };
        Cell::decimal(dec_op(to_f(a), to_f(b)))
    }
}

fn n_add(rt: &mut Runtime, frame: usize) -> Result<Dispatch, Raise> {
    Ok(Dispatch::Done(arith(rt, frame, |a, b| a.wrapping_add(b), |a, b| a + b)))
}

fn n_multiply(rt: &mut Runtime, frame: usize) -> Result<Dispatch, Raise> {
    Ok(Dispatch::Done(arith(rt, frame, |a, b| a.wrapping_mul(b), |a, b| a * b)))
}

fn n_negate(rt: &mut Runtime, frame: usize) -> Result<Dispatch, Raise> {
    let arg = rt.frame_arg(frame, 1);
    let out = match arg.kind() {
        Kind::Integer => Cell::integer(-arg.as_integer()),
        _ => Cell::decimal(-arg.as_decimal()),
    };
    Ok(Dispatch::Done(out))
}

/// `the` hands back its argument exactly as written.
fn n_the(rt: &mut Runtime, frame: usize) -> Result<Dispatch, Raise> {
    Ok(Dispatch::Done(rt.frame_arg(frame, 1)))
}

fn n_throw(rt: &mut Runtime, frame: usize) -> Result<Dispatch, Raise> {
    Ok(Dispatch::Thrown(rt.frame_arg(frame, 1)))
}

/// `catch` evaluates its block and stops a throw, yielding the thrown
/// payload; null if nothing threw.
fn n_catch(rt: &mut Runtime, frame: usize) -> Result<Dispatch, Raise> {
    let block = rt.frame_arg(frame, 1);
    let (body, _) = block.as_array();
    match rt.eval_array(body)? {
        Step::Thrown(payload) => Ok(Dispatch::Done(payload)),
        Step::Value(_) => Ok(Dispatch::Done(Cell::nulled())),
        Step::Finished => unreachable!(),
    }
}

/// Dispatcher for interpreted functions: evaluate the relatively-bound body
/// from details slot 0.
fn dispatch_interpreted(rt: &mut Runtime, frame: usize) -> Result<Dispatch, Raise> {
    let body = rt.frame_detail(frame, 0);
    let (array, _) = body.as_array();
    match rt.eval_array(array)? {
        Step::Value(value) => Ok(Dispatch::Done(value)),
        Step::Thrown(payload) => Ok(Dispatch::Thrown(payload)),
        Step::Finished => unreachable!(),
    }
}

impl Runtime {
    /// Create an interpreted function: the body is deep-copied and its
    /// parameter words bound relative to the new action.
    pub fn func_new(&mut self, spec: &[ParamSpec], body: ArrayId) -> Result<ActionId, Raise> {
        let action = self.action_new(spec, dispatch_interpreted)?;
        let deep = TypeSet::just(Kind::Block).with(Kind::Group);
        let copy = self.array_copy(body, CopyMode::Deep { types: deep })?;
        self.bind_relative(copy, action)?;
        self.heap.manage(copy.stub());
        let details = self.action_info(action).details;
        self.array_push(details, Cell::block(copy))?;
        Ok(action)
    }

    /// Bind words matching the action's parameters relative to it, deeply.
    fn bind_relative(&mut self, array: ArrayId, action: ActionId) -> Result<(), Raise> {
        let num_params = self.action_num_params(action);
        for i in 0..self.array_len(array) {
            let cell = self.array_get(array, i)?;
            if cell.kind().is_word_kind() {
                let name = cell.as_word();
                let bound = (1..=num_params)
                    .any(|slot| self.action_param(action, slot).name == name);
                if bound {
                    self.array_cell_mut(array, i).binding = Binding::Relative(action);
                }
            } else if cell.kind().is_array_kind() {
                let (inner, _) = cell.as_array();
                self.bind_relative(inner, action)?;
            }
        }
        Ok(())
    }

    /// Build a context with the base natives bound into it.  The context is
    /// GC-managed; callers typically make it a root or bind code to it.
    pub fn base_context(&mut self) -> Result<ContextId, Raise> {
        let any = TypeSet::ANY;
        let block = TypeSet::just(Kind::Block);

        let ctx = self.context_alloc(8)?;
        self.context_manage(ctx);

        let value = self.intern("value");
        let a = self.intern("a");
        let b = self.intern("b");

        let add = self.action_new(
            &[ParamSpec::normal(a, NUMERIC), ParamSpec::normal(b, NUMERIC)],
            n_add,
        )?;
        let multiply = self.action_new(
            &[ParamSpec::normal(a, NUMERIC), ParamSpec::normal(b, NUMERIC)],
            n_multiply,
        )?;
        let negate = self.action_new(&[ParamSpec::normal(value, NUMERIC)], n_negate)?;
        let the = self.action_new(&[ParamSpec::hard_quote(value, any)], n_the)?;
        let throw = self.action_new(&[ParamSpec::normal(value, any)], n_throw)?;
        let catch = self.action_new(&[ParamSpec::normal(value, block)], n_catch)?;

        for (name, action) in [
            ("add", add),
            ("multiply", multiply),
            ("negate", negate),
            ("the", the),
            ("throw", throw),
            ("catch", catch),
        ] {
            let symbol = self.intern(name);
            let slot = self.context_append_key(ctx, ParamSpec::local(symbol))?;
            self.context_set_var(ctx, slot, Cell::action(action))?;
        }
        Ok(ctx)
    }
}
