use rill_runtime::{
    Cell, ContextId, Dispatch, Kind, ParamSpec, Raise, Runtime, RuntimeConfig, Step, TypeSet,
};

fn setup() -> (Runtime, ContextId) {
    let mut rt = Runtime::new();
    let ctx = rt.base_context().unwrap();
    rt.root_push(Cell::object(ctx));
    (rt, ctx)
}

fn define(rt: &mut Runtime, ctx: ContextId, name: &str, value: Cell) {
    let symbol = rt.intern(name);
    let slot = rt.context_append_key(ctx, ParamSpec::local(symbol)).unwrap();
    rt.context_set_var(ctx, slot, value).unwrap();
}

fn eval(rt: &mut Runtime, ctx: ContextId, cells: &[Cell]) -> Result<Step, Raise> {
    let source = rt.array_alloc(cells.len(), 0)?;
    for &cell in cells {
        rt.array_push(source, cell)?;
    }
    rt.bind_array_deep(source, ctx)?;
    rt.eval_array(source)
}

fn base_action(rt: &mut Runtime, ctx: ContextId, name: &str) -> rill_runtime::ActionId {
    let symbol = rt.intern(name);
    let slot = rt.context_find(ctx, symbol).unwrap();
    rt.context_var(ctx, slot).unwrap().as_action()
}

#[test]
fn prefilled_parameters_are_not_gathered() {
    let (mut rt, ctx) = setup();
    let add = base_action(&mut rt, ctx, "add");
    let b = rt.intern("b");

    let add2 = rt.action_specialize(add, &[(b, Cell::integer(2))]).unwrap();
    define(&mut rt, ctx, "add2", Cell::action(add2));

    // add2 takes only the remaining parameter from the feed.
    let add2_word = Cell::word(rt.intern("add2"));
    let result = eval(&mut rt, ctx, &[add2_word, Cell::integer(5)]);
    assert_eq!(result, Ok(Step::Value(Cell::integer(7))));
}

#[test]
fn specialization_shares_the_parameter_identity() {
    let (mut rt, ctx) = setup();
    let add = base_action(&mut rt, ctx, "add");
    let b = rt.intern("b");

    let add2 = rt.action_specialize(add, &[(b, Cell::integer(2))]).unwrap();
    assert_eq!(rt.action_info(add2).underlying, add);
    assert_eq!(
        rt.action_paramlist(add2).stub(),
        rt.action_paramlist(add).stub()
    );
    assert_eq!(rt.action_num_params(add2), rt.action_num_params(add));
}

#[test]
fn layered_specialization_inherits_earlier_fills() {
    let (mut rt, ctx) = setup();
    let add = base_action(&mut rt, ctx, "add");
    let a = rt.intern("a");
    let b = rt.intern("b");

    let add2 = rt.action_specialize(add, &[(b, Cell::integer(2))]).unwrap();
    let seven = rt.action_specialize(add2, &[(a, Cell::integer(5))]).unwrap();
    assert_eq!(rt.action_info(seven).underlying, add);
    define(&mut rt, ctx, "seven", Cell::action(seven));

    // Fully specialized: nothing left to gather.
    let seven_word = Cell::word(rt.intern("seven"));
    assert_eq!(
        eval(&mut rt, ctx, &[seven_word]),
        Ok(Step::Value(Cell::integer(7)))
    );
}

#[test]
fn filling_an_unknown_parameter_raises() {
    let (mut rt, ctx) = setup();
    let add = base_action(&mut rt, ctx, "add");
    let nowhere = rt.intern("nowhere");
    assert_eq!(
        rt.action_specialize(add, &[(nowhere, Cell::integer(1))]).unwrap_err(),
        Raise::Unbound(nowhere)
    );
}

#[test]
fn fill_values_are_typechecked_against_the_parameter() {
    let (mut rt, ctx) = setup();
    let add = base_action(&mut rt, ctx, "add");
    let b = rt.intern("b");
    let err = rt
        .action_specialize(add, &[(b, Cell::logic(true))])
        .unwrap_err();
    match err {
        Raise::TypeMismatch { param, found, .. } => {
            assert_eq!(param, Some(b));
            assert_eq!(found, Kind::Logic);
        }
        other => panic!("unexpected raise: {other:?}"),
    }
}

#[test]
fn filling_a_parameter_with_null_raises() {
    let (mut rt, ctx) = setup();
    let add = base_action(&mut rt, ctx, "add");
    let b = rt.intern("b");

    // Null marks an unspecialized slot, so it is never a valid fill.
    let err = rt.action_specialize(add, &[(b, Cell::nulled())]).unwrap_err();
    match err {
        Raise::TypeMismatch { param, found, .. } => {
            assert_eq!(param, Some(b));
            assert_eq!(found, Kind::Nulled);
        }
        other => panic!("unexpected raise: {other:?}"),
    }
}

#[test]
fn failed_action_creation_leaves_the_data_stack_balanced() {
    let mut rt = Runtime::with_config(RuntimeConfig {
        memory_limit: Some(0),
        ..Default::default()
    });
    let a = rt.intern("a");
    let depth = rt.data_stack_depth();

    let err = rt
        .action_new(&[ParamSpec::normal(a, TypeSet::ANY)], |_rt, _frame| {
            unreachable!("never dispatched")
        })
        .unwrap_err();
    assert!(matches!(err, Raise::OutOfMemory { .. }));
    assert_eq!(rt.data_stack_depth(), depth);
}

#[test]
fn refinements_gate_their_parameters() {
    let numeric = TypeSet::just(Kind::Integer).with(Kind::Decimal);
    let (mut rt, ctx) = setup();
    let value = rt.intern("value");
    let scale = rt.intern("scale");
    let factor = rt.intern("factor");

    let scaled = rt.action_new(
        &[
            ParamSpec::normal(value, numeric),
            ParamSpec::refinement(scale),
            ParamSpec::normal(factor, numeric),
        ],
        |rt, frame| {
            let value = rt.frame_arg(frame, 1);
            let out = if rt.frame_arg(frame, 2).is_truthy() {
                let factor = rt.frame_arg(frame, 3);
                Cell::integer(value.as_integer() * factor.as_integer())
            } else {
                value
            };
            Ok(Dispatch::Done(out))
        },
    ).unwrap();
    define(&mut rt, ctx, "scaled", Cell::action(scaled));

    // Unspecialized: the refinement is off and gates factor out of the
    // gather, so only value comes from the feed.
    let scaled_word = Cell::word(rt.intern("scaled"));
    let result = eval(&mut rt, ctx, &[scaled_word, Cell::integer(5)]);
    assert_eq!(result, Ok(Step::Value(Cell::integer(5))));

    // Specialized on: factor becomes an ordinary feed parameter.
    let on = rt.action_specialize(scaled, &[(scale, Cell::logic(true))]).unwrap();
    define(&mut rt, ctx, "scaled-on", Cell::action(on));
    let on_word = Cell::word(rt.intern("scaled-on"));
    let result = eval(&mut rt, ctx, &[on_word, Cell::integer(5), Cell::integer(3)]);
    assert_eq!(result, Ok(Step::Value(Cell::integer(15))));
}

#[test]
fn specialized_actions_survive_collection() {
    let (mut rt, ctx) = setup();
    let add = base_action(&mut rt, ctx, "add");
    let b = rt.intern("b");
    let add2 = rt.action_specialize(add, &[(b, Cell::integer(2))]).unwrap();
    define(&mut rt, ctx, "add2", Cell::action(add2));

    rt.collect_garbage();

    let add2_word = Cell::word(rt.intern("add2"));
    let result = eval(&mut rt, ctx, &[add2_word, Cell::integer(5)]);
    assert_eq!(result, Ok(Step::Value(Cell::integer(7))));
}
