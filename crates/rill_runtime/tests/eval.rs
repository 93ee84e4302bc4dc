use rill_runtime::{
    Cell, ContextId, Dispatch, Kind, ParamSpec, Raise, Runtime, Step, StubId, TypeSet,
};

fn setup() -> (Runtime, ContextId) {
    let mut rt = Runtime::new();
    let ctx = rt.base_context().unwrap();
    rt.root_push(Cell::object(ctx));
    (rt, ctx)
}

/// Build a source array, bind it into the context, and evaluate it.
fn eval(rt: &mut Runtime, ctx: ContextId, cells: &[Cell]) -> Result<Step, Raise> {
    let source = rt.array_alloc(cells.len(), 0)?;
    for &cell in cells {
        rt.array_push(source, cell)?;
    }
    rt.bind_array_deep(source, ctx)?;
    rt.eval_array(source)
}

fn block_of(rt: &mut Runtime, cells: &[Cell]) -> Cell {
    let arr = rt.array_alloc(cells.len(), 0).unwrap();
    for &cell in cells {
        rt.array_push(arr, cell).unwrap();
    }
    Cell::block(arr)
}

#[test]
fn literals_evaluate_to_themselves() {
    let (mut rt, ctx) = setup();
    assert_eq!(
        eval(&mut rt, ctx, &[Cell::integer(42)]),
        Ok(Step::Value(Cell::integer(42)))
    );
    assert_eq!(
        eval(&mut rt, ctx, &[Cell::logic(false)]),
        Ok(Step::Value(Cell::logic(false)))
    );
    let block = block_of(&mut rt, &[Cell::integer(1)]);
    assert_eq!(eval(&mut rt, ctx, &[block]), Ok(Step::Value(block)));
}

#[test]
fn calls_consume_their_arguments() {
    let (mut rt, ctx) = setup();
    let add = Cell::word(rt.intern("add"));
    let result = eval(&mut rt, ctx, &[add, Cell::integer(1), Cell::integer(2)]);
    assert_eq!(result, Ok(Step::Value(Cell::integer(3))));
}

#[test]
fn nested_calls_gather_right_to_left() {
    let (mut rt, ctx) = setup();
    let add = Cell::word(rt.intern("add"));
    let negate = Cell::word(rt.intern("negate"));
    // add negate 3 10 == 7
    let result = eval(
        &mut rt,
        ctx,
        &[add, negate, Cell::integer(3), Cell::integer(10)],
    );
    assert_eq!(result, Ok(Step::Value(Cell::integer(7))));
}

#[test]
fn groups_evaluate_eagerly() {
    let (mut rt, ctx) = setup();
    let add = Cell::word(rt.intern("add"));
    let inner = rt.array_alloc(3, 0).unwrap();
    rt.array_push(inner, add).unwrap();
    rt.array_push(inner, Cell::integer(1)).unwrap();
    rt.array_push(inner, Cell::integer(2)).unwrap();

    let result = eval(&mut rt, ctx, &[add, Cell::group(inner), Cell::integer(3)]);
    assert_eq!(result, Ok(Step::Value(Cell::integer(6))));
}

#[test]
fn running_out_of_arguments_reports_the_parameter() {
    let (mut rt, ctx) = setup();
    let b = rt.intern("b");
    let add = Cell::word(rt.intern("add"));
    assert_eq!(
        eval(&mut rt, ctx, &[add, Cell::integer(1)]),
        Err(Raise::ArityMismatch { param: b })
    );
}

#[test]
fn argument_outside_the_constraint_reports_the_mismatch() {
    let (mut rt, ctx) = setup();
    let add = Cell::word(rt.intern("add"));
    let err = eval(&mut rt, ctx, &[add, Cell::integer(1), Cell::logic(true)]).unwrap_err();
    match err {
        Raise::TypeMismatch { found, .. } => assert_eq!(found, Kind::Logic),
        other => panic!("unexpected raise: {other:?}"),
    }
}

#[test]
fn hard_quoted_parameters_take_the_source_verbatim() {
    let (mut rt, ctx) = setup();
    let the = Cell::word(rt.intern("the"));
    let add = rt.intern("add");
    // "the add" yields the word itself, not the action it names.
    let result = eval(&mut rt, ctx, &[the, Cell::word(add)]).unwrap();
    let Step::Value(value) = result else { panic!("expected a value") };
    assert_eq!(value.kind(), Kind::Word);
    assert_eq!(value.as_word(), add);
}

#[test]
fn soft_quoted_parameters_evaluate_only_escapes() {
    let (mut rt, ctx) = setup();
    let value = rt.intern("value");
    let soft = rt.action_new(
        &[ParamSpec::soft_quote(value, TypeSet::ANY)],
        |rt, frame| Ok(Dispatch::Done(rt.frame_arg(frame, 1))),
    ).unwrap();
    let soft_slot = rt.intern("soft");
    let slot = rt.context_append_key(ctx, ParamSpec::local(soft_slot)).unwrap();
    rt.context_set_var(ctx, slot, Cell::action(soft)).unwrap();
    let soft_word = Cell::word(soft_slot);

    // Plain words pass through unevaluated.
    let other = rt.intern("add");
    let result = eval(&mut rt, ctx, &[soft_word, Cell::word(other)]).unwrap();
    let Step::Value(passed) = result else { panic!("expected a value") };
    assert_eq!(passed.kind(), Kind::Word);
    assert_eq!(passed.as_word(), other);

    // Groups still evaluate.
    let add = Cell::word(other);
    let inner = rt.array_alloc(3, 0).unwrap();
    rt.array_push(inner, add).unwrap();
    rt.array_push(inner, Cell::integer(2)).unwrap();
    rt.array_push(inner, Cell::integer(3)).unwrap();
    let result = eval(&mut rt, ctx, &[soft_word, Cell::group(inner)]).unwrap();
    assert_eq!(result, Step::Value(Cell::integer(5)));
}

#[test]
fn skippable_hard_quote_declines_nonmatching_input() {
    let (mut rt, ctx) = setup();
    let value = rt.intern("value");
    let maybe = rt.action_new(
        &[ParamSpec::hard_quote(value, TypeSet::just(Kind::Word)).skip()],
        |rt, frame| Ok(Dispatch::Done(rt.frame_arg(frame, 1))),
    ).unwrap();
    let name = rt.intern("maybe");
    let slot = rt.context_append_key(ctx, ParamSpec::local(name)).unwrap();
    rt.context_set_var(ctx, slot, Cell::action(maybe)).unwrap();
    let maybe_word = Cell::word(name);

    // The integer is declined, left on the feed, and evaluated after the
    // call completes.
    let result = eval(&mut rt, ctx, &[maybe_word, Cell::integer(5)]).unwrap();
    assert_eq!(result, Step::Value(Cell::integer(5)));

    // A word is accepted and consumed.
    let target = rt.intern("add");
    let result = eval(&mut rt, ctx, &[maybe_word, Cell::word(target)]).unwrap();
    let Step::Value(taken) = result else { panic!("expected a value") };
    assert_eq!(taken.kind(), Kind::Word);
    assert_eq!(taken.as_word(), target);
}

#[test]
fn skippable_soft_quote_declines_nonmatching_input() {
    let (mut rt, ctx) = setup();
    let value = rt.intern("value");
    let maybe = rt.action_new(
        &[ParamSpec::soft_quote(value, TypeSet::just(Kind::Word)).skip()],
        |rt, frame| Ok(Dispatch::Done(rt.frame_arg(frame, 1))),
    ).unwrap();
    let name = rt.intern("maybe");
    let slot = rt.context_append_key(ctx, ParamSpec::local(name)).unwrap();
    rt.context_set_var(ctx, slot, Cell::action(maybe)).unwrap();
    let maybe_word = Cell::word(name);

    // The integer is declined and evaluated after the call completes.
    let result = eval(&mut rt, ctx, &[maybe_word, Cell::integer(5)]).unwrap();
    assert_eq!(result, Step::Value(Cell::integer(5)));

    // A word is accepted without evaluation.
    let target = rt.intern("add");
    let result = eval(&mut rt, ctx, &[maybe_word, Cell::word(target)]).unwrap();
    let Step::Value(taken) = result else { panic!("expected a value") };
    assert_eq!(taken.kind(), Kind::Word);
    assert_eq!(taken.as_word(), target);

    // End of feed is also a decline, not an arity error.
    let result = eval(&mut rt, ctx, &[maybe_word]).unwrap();
    let Step::Value(empty) = result else { panic!("expected a value") };
    assert_eq!(empty.kind(), Kind::Nulled);
}

#[test]
fn variadic_parameters_let_the_dispatcher_walk_the_feed() {
    let (mut rt, ctx) = setup();
    let rest = rt.intern("rest");
    let numeric = TypeSet::just(Kind::Integer).with(Kind::Decimal);
    let sum = rt.action_new(
        &[ParamSpec::variadic(rest, numeric)],
        |rt, frame| {
            let mut total = 0i64;
            loop {
                match rt.eval_step(frame)? {
                    Step::Finished => break,
                    Step::Thrown(payload) => return Ok(Dispatch::Thrown(payload)),
                    Step::Value(value) => total += value.as_integer(),
                }
            }
            Ok(Dispatch::Done(Cell::integer(total)))
        },
    ).unwrap();
    let name = rt.intern("sum");
    let slot = rt.context_append_key(ctx, ParamSpec::local(name)).unwrap();
    rt.context_set_var(ctx, slot, Cell::action(sum)).unwrap();

    // The gather leaves `rest` unfulfilled; the dispatcher drains the feed.
    let sum_word = Cell::word(name);
    let result = eval(
        &mut rt,
        ctx,
        &[sum_word, Cell::integer(1), Cell::integer(2), Cell::integer(3)],
    );
    assert_eq!(result, Ok(Step::Value(Cell::integer(6))));
}

#[test]
fn captured_arguments_leave_an_inaccessible_husk_behind() {
    let (mut rt, ctx) = setup();
    let value = rt.intern("value");
    // Captures its own argument context, reporting the pre-steal identity.
    let keep = rt.action_new(
        &[ParamSpec::normal(value, TypeSet::ANY)],
        |rt, frame| {
            let before = rt.frame_args(frame);
            rt.frame_capture_args(frame)?;
            Ok(Dispatch::Done(Cell::integer(before.varlist().stub().0 as i64)))
        },
    ).unwrap();
    let name = rt.intern("keep");
    let slot = rt.context_append_key(ctx, ParamSpec::local(name)).unwrap();
    rt.context_set_var(ctx, slot, Cell::action(keep)).unwrap();

    let result = eval(&mut rt, ctx, &[Cell::word(name), Cell::integer(888)]).unwrap();
    let Step::Value(reported) = result else { panic!("expected a value") };
    let husk = ContextId(StubId(reported.as_integer() as usize));
    rt.root_push(Cell::object(husk));

    // The husk keeps its identity: stale references see an inaccessible
    // context, never another series that reused the slot.
    assert_eq!(rt.context_var(husk, 1), Err(Raise::Inaccessible));
    for _ in 0..4 {
        let fresh = rt.array_alloc(2, 0).unwrap();
        assert_ne!(fresh.stub(), husk.varlist().stub());
    }
    assert_eq!(rt.context_var(husk, 1), Err(Raise::Inaccessible));
}

#[test]
fn set_word_assigns_and_passes_the_value_through() {
    let (mut rt, ctx) = setup();
    let x = rt.intern("x");
    let slot = rt.context_append_key(ctx, ParamSpec::local(x)).unwrap();
    let add = Cell::word(rt.intern("add"));

    let result = eval(
        &mut rt,
        ctx,
        &[Cell::set_word(x), add, Cell::integer(1), Cell::integer(2)],
    );
    assert_eq!(result, Ok(Step::Value(Cell::integer(3))));
    assert_eq!(rt.context_var(ctx, slot).unwrap(), Cell::integer(3));
}

#[test]
fn get_word_fetches_without_invoking() {
    let (mut rt, ctx) = setup();
    let add = rt.intern("add");
    let result = eval(&mut rt, ctx, &[Cell::get_word(add)]).unwrap();
    let Step::Value(value) = result else { panic!("expected a value") };
    assert_eq!(value.kind(), Kind::Action);
}

#[test]
fn unbound_and_null_words_raise() {
    let (mut rt, ctx) = setup();
    let nowhere = rt.intern("nowhere");
    assert_eq!(
        eval(&mut rt, ctx, &[Cell::word(nowhere)]),
        Err(Raise::Unbound(nowhere))
    );

    let empty = rt.intern("empty");
    rt.context_append_key(ctx, ParamSpec::local(empty)).unwrap();
    assert_eq!(
        eval(&mut rt, ctx, &[Cell::word(empty)]),
        Err(Raise::NotAValue(empty))
    );
}

#[test]
fn quoted_values_shed_one_level_per_evaluation() {
    let (mut rt, ctx) = setup();
    let q2 = rt.quotify(Cell::integer(9), 2).unwrap();
    let result = eval(&mut rt, ctx, &[q2]).unwrap();
    let Step::Value(value) = result else { panic!("expected a value") };
    assert_eq!(rt.quote_depth(&value), 1);
    assert_eq!(rt.unquotify(value, 1).unwrap(), Cell::integer(9));
}

#[test]
fn throw_unwinds_to_the_nearest_catch() {
    let (mut rt, ctx) = setup();
    let catch = Cell::word(rt.intern("catch"));
    let throw = Cell::word(rt.intern("throw"));
    let add = Cell::word(rt.intern("add"));

    // catch [add 1 throw 42] == 42; the add never completes.
    let body = block_of(&mut rt, &[add, Cell::integer(1), throw, Cell::integer(42)]);
    let result = eval(&mut rt, ctx, &[catch, body]);
    assert_eq!(result, Ok(Step::Value(Cell::integer(42))));
}

#[test]
fn catch_of_a_quiet_block_yields_null() {
    let (mut rt, ctx) = setup();
    let catch = Cell::word(rt.intern("catch"));
    let body = block_of(&mut rt, &[Cell::integer(1)]);
    assert_eq!(eval(&mut rt, ctx, &[catch, body]), Ok(Step::Value(Cell::nulled())));
}

#[test]
fn uncaught_throw_surfaces_as_a_step() {
    let (mut rt, ctx) = setup();
    let throw = Cell::word(rt.intern("throw"));
    let result = eval(&mut rt, ctx, &[throw, Cell::integer(7)]);
    assert_eq!(result, Ok(Step::Thrown(Cell::integer(7))));
}

#[test]
fn interpreted_functions_bind_parameters_relatively() {
    let (mut rt, ctx) = setup();
    let n = rt.intern("n");
    let add = Cell::word(rt.intern("add"));

    let body = rt.array_alloc(3, 0).unwrap();
    rt.array_push(body, add).unwrap();
    rt.array_push(body, Cell::word(n)).unwrap();
    rt.array_push(body, Cell::word(n)).unwrap();
    rt.bind_array_deep(body, ctx).unwrap();

    let numeric = TypeSet::just(Kind::Integer).with(Kind::Decimal);
    let double = rt.func_new(&[ParamSpec::normal(n, numeric)], body).unwrap();
    let name = rt.intern("double");
    let slot = rt.context_append_key(ctx, ParamSpec::local(name)).unwrap();
    rt.context_set_var(ctx, slot, Cell::action(double)).unwrap();

    let result = eval(&mut rt, ctx, &[Cell::word(name), Cell::integer(21)]);
    assert_eq!(result, Ok(Step::Value(Cell::integer(42))));
}

#[test]
fn stacks_balance_across_evaluation() {
    let (mut rt, ctx) = setup();
    let ds = rt.data_stack_depth();
    let add = Cell::word(rt.intern("add"));
    let negate = Cell::word(rt.intern("negate"));
    eval(&mut rt, ctx, &[add, negate, Cell::integer(3), Cell::integer(10)]).unwrap();
    assert_eq!(rt.data_stack_depth(), ds);
    assert_eq!(rt.frame_depth(), 0);
}

#[test]
fn stacks_balance_across_raises_and_throws() {
    let (mut rt, ctx) = setup();
    let ds = rt.data_stack_depth();
    let add = Cell::word(rt.intern("add"));
    let throw = Cell::word(rt.intern("throw"));

    eval(&mut rt, ctx, &[add, Cell::integer(1)]).unwrap_err();
    assert_eq!(rt.data_stack_depth(), ds);
    assert_eq!(rt.frame_depth(), 0);

    eval(&mut rt, ctx, &[throw, Cell::integer(1)]).unwrap();
    assert_eq!(rt.data_stack_depth(), ds);
    assert_eq!(rt.frame_depth(), 0);
}

#[test]
#[should_panic(expected = "stack overflow")]
fn runaway_recursion_trips_the_depth_check() {
    let (mut rt, ctx) = setup();
    let f = rt.intern("f");
    let slot = rt.context_append_key(ctx, ParamSpec::local(f)).unwrap();

    let body = rt.array_alloc(1, 0).unwrap();
    rt.array_push(body, Cell::word(f)).unwrap();
    rt.bind_array_deep(body, ctx).unwrap();

    let action = rt.func_new(&[], body).unwrap();
    rt.context_set_var(ctx, slot, Cell::action(action)).unwrap();

    let _ = eval(&mut rt, ctx, &[Cell::word(f)]);
}
