use rill_runtime::{Cell, ParamSpec, Runtime};

#[test]
fn unreferenced_managed_series_are_reclaimed() {
    let mut rt = Runtime::new();
    let arr = rt.array_alloc(4, 0).unwrap();
    rt.array_push(arr, Cell::integer(1)).unwrap();
    rt.series_manage(arr.stub());

    rt.collect_garbage();
    assert!(!rt.stub_is_live(arr.stub()));
}

#[test]
fn guarded_series_survive_until_dropped() {
    let mut rt = Runtime::new();
    let arr = rt.array_alloc(4, 0).unwrap();
    rt.series_manage(arr.stub());
    rt.guard_push(arr.stub());

    rt.collect_garbage();
    assert!(rt.stub_is_live(arr.stub()));
    assert_eq!(rt.array_len(arr), 0);

    rt.guard_drop(arr.stub());
    rt.collect_garbage();
    assert!(!rt.stub_is_live(arr.stub()));
}

#[test]
fn value_guards_pin_everything_reachable() {
    let mut rt = Runtime::new();
    let outer = rt.array_alloc(2, 0).unwrap();
    let inner = rt.array_alloc(2, 0).unwrap();
    rt.array_push(inner, Cell::integer(5)).unwrap();
    rt.array_push(outer, Cell::block(inner)).unwrap();
    rt.series_manage(outer.stub());
    rt.series_manage(inner.stub());

    rt.guard_push_value(Cell::block(outer));
    rt.collect_garbage();
    assert!(rt.stub_is_live(outer.stub()));
    assert!(rt.stub_is_live(inner.stub()));
    rt.guard_drop_value(Cell::block(outer));
}

#[test]
fn roots_are_permanent() {
    let mut rt = Runtime::new();
    let arr = rt.array_alloc(2, 0).unwrap();
    rt.series_manage(arr.stub());
    rt.root_push(Cell::block(arr));

    rt.collect_garbage();
    rt.collect_garbage();
    assert!(rt.stub_is_live(arr.stub()));
}

#[test]
fn manual_series_are_never_swept() {
    let mut rt = Runtime::new();
    let manual = rt.array_alloc(2, 0).unwrap();
    // Managed child reachable only through the manual parent.
    let child = rt.array_alloc(2, 0).unwrap();
    rt.series_manage(child.stub());
    rt.array_push(manual, Cell::block(child)).unwrap();

    rt.collect_garbage();
    assert!(rt.stub_is_live(manual.stub()));
    assert!(rt.stub_is_live(child.stub()));
}

#[test]
fn guard_discipline_is_strictly_lifo() {
    let mut rt = Runtime::new();
    let a = rt.array_alloc(1, 0).unwrap();
    let b = rt.array_alloc(1, 0).unwrap();
    rt.guard_push(a.stub());
    rt.guard_push(b.stub());
    assert_eq!(rt.guard_depth(), 2);
    rt.guard_drop(b.stub());
    rt.guard_drop(a.stub());
    assert_eq!(rt.guard_depth(), 0);
}

#[test]
#[should_panic(expected = "guard dropped out of order")]
fn out_of_order_guard_drop_is_fatal() {
    let mut rt = Runtime::new();
    let a = rt.array_alloc(1, 0).unwrap();
    let b = rt.array_alloc(1, 0).unwrap();
    rt.guard_push(a.stub());
    rt.guard_push(b.stub());
    rt.guard_drop(a.stub());
}

#[test]
#[should_panic(expected = "guard stack empty")]
fn dropping_from_an_empty_guard_stack_is_fatal() {
    let mut rt = Runtime::new();
    let a = rt.array_alloc(1, 0).unwrap();
    rt.guard_drop(a.stub());
}

#[test]
fn quote_pairings_follow_their_cell() {
    let mut rt = Runtime::new();
    let q5 = rt.quotify(Cell::integer(9), 5).unwrap();
    rt.guard_push_value(q5);

    rt.collect_garbage();
    assert_eq!(rt.quote_depth(&q5), 5);
    assert_eq!(rt.unquotify(q5, 5).unwrap(), Cell::integer(9));

    rt.guard_drop_value(q5);
    rt.collect_garbage();
    let Cell { payload: rill_runtime::Payload::Pair(pair), .. } = q5 else {
        panic!("expected an overflowed quote");
    };
    assert!(!rt.stub_is_live(pair.stub()));
}

#[test]
fn context_interiors_are_traced_through_the_keylist_link() {
    let mut rt = Runtime::new();
    let ctx = rt.context_alloc(2).unwrap();
    let x = rt.intern("x");
    let slot = rt.context_append_key(ctx, ParamSpec::local(x)).unwrap();

    let value = rt.array_alloc(1, 0).unwrap();
    rt.array_push(value, Cell::integer(3)).unwrap();
    rt.series_manage(value.stub());
    rt.context_set_var(ctx, slot, Cell::block(value)).unwrap();

    rt.context_manage(ctx);
    rt.root_push(Cell::object(ctx));
    rt.collect_garbage();

    assert!(rt.stub_is_live(ctx.varlist().stub()));
    assert!(rt.stub_is_live(rt.context_keylist(ctx).stub()));
    assert!(rt.stub_is_live(value.stub()));
    assert_eq!(rt.context_find(ctx, x), Some(slot));
    assert_eq!(rt.context_var(ctx, slot).unwrap(), Cell::block(value));
}

#[test]
fn collection_reports_the_surviving_population() {
    let mut rt = Runtime::new();
    let before = rt.collect_garbage();

    let keep = rt.array_alloc(1, 0).unwrap();
    rt.series_manage(keep.stub());
    rt.guard_push(keep.stub());
    let lose = rt.array_alloc(1, 0).unwrap();
    rt.series_manage(lose.stub());

    let after = rt.collect_garbage();
    assert_eq!(after, before + 1);
    rt.guard_drop(keep.stub());
}

#[test]
fn evaluation_works_after_a_full_collection() {
    let mut rt = Runtime::new();
    let ctx = rt.base_context().unwrap();
    rt.root_push(Cell::object(ctx));
    rt.collect_garbage();

    let add = rt.intern("add");
    let source = rt.array_alloc(3, 0).unwrap();
    rt.array_push(source, Cell::word(add)).unwrap();
    rt.array_push(source, Cell::integer(2)).unwrap();
    rt.array_push(source, Cell::integer(3)).unwrap();
    rt.bind_array_deep(source, ctx).unwrap();

    let result = rt.eval_array(source).unwrap();
    assert_eq!(result, rill_runtime::Step::Value(Cell::integer(5)));
}
