//! The frame evaluator.
//!
//! A frame is one in-progress evaluation: a feed cursor over a source
//! array, an output cell, and (during a call) the phase action plus an
//! argument context.  Frames live on an explicit stack which mirrors the
//! native call stack; push and drop must balance per call, and the data
//! stack pointer is snapshotted on push and compared on drop.

mod fulfill;

use rill_core::{ActionId, ArrayId, Cell, ContextId, Kind, MAX_KIND, SymbolId};

use crate::errors::Raise;
use crate::runtime::Runtime;

/// Cursor into a source array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feed {
    pub array: ArrayId,
    pub index: usize,
}

impl Feed {
    pub fn new(array: ArrayId) -> Feed {
        Feed { array, index: 0 }
    }
}

/// What one evaluator step produced.  Recoverable failures travel in the
/// `Result` wrapper around this.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    Value(Cell),
    /// Non-local unwind in flight; propagate until a catch point.
    Thrown(Cell),
    /// The feed is exhausted.
    Finished,
}

pub struct Frame {
    pub feed: Feed,
    pub out: Cell,
    /// The action as invoked (identity for relative binding).
    pub original: Option<ActionId>,
    /// The action currently executing; dispatchers may redo with another.
    pub phase: Option<ActionId>,
    pub args: Option<ContextId>,
    pub label: Option<SymbolId>,
    /// Feed index where the current expression started.
    pub expr_index: usize,
    pub(crate) ds_base: usize,
    pub(crate) took_hold: bool,
}

impl Runtime {
    /// Open a frame over a feed.  Trips the fatal overflow check before
    /// recursion can corrupt anything.
    pub fn frame_push(&mut self, feed: Feed) -> usize {
        assert!(
            self.frames.len() < self.config.max_frame_depth,
            "stack overflow: frame depth {} reached",
            self.frames.len()
        );
        let took_hold = self.series_take_hold(feed.array.stub());
        self.frames.push(Frame {
            feed,
            out: Cell::nulled(),
            original: None,
            phase: None,
            args: None,
            label: None,
            expr_index: feed.index,
            ds_base: self.data_stack.len(),
            took_hold,
        });
        self.frames.len() - 1
    }

    /// Close the top frame.  Dropping any other frame, or dropping with the
    /// data stack out of balance, is a fatal usage error.
    pub fn frame_drop(&mut self, index: usize) {
        assert!(
            index + 1 == self.frames.len(),
            "frame dropped out of order ({} of {})",
            index,
            self.frames.len()
        );
        let frame = self.frames.pop().expect("frame stack empty");
        assert!(
            self.data_stack.len() == frame.ds_base,
            "data stack unbalanced on frame drop: {} != {}",
            self.data_stack.len(),
            frame.ds_base
        );
        if frame.took_hold {
            self.series_release_hold(frame.feed.array.stub());
        }
        if let Some(args) = frame.args {
            self.drop_args(args);
        }
    }

    /// Argument storage release: recycle the varlist if it never escaped;
    /// if it was managed or stolen during the call, keep its identity as a
    /// disconnected stub but let go of the bulk memory.
    fn drop_args(&mut self, args: ContextId) {
        use crate::core::heap::StubData;
        use rill_core::series_flags as sf;

        let stub_id = args.varlist().stub();
        if !self.heap.is_live(stub_id) {
            return;
        }
        if self.heap.get(stub_id).flags & sf::INACCESSIBLE != 0 {
            // A steal already gutted the varlist.  Bindings may still point
            // at this husk, so its slot belongs to the collector, never the
            // free list.
            if !self.heap.get(stub_id).is_managed() {
                self.heap.manage(stub_id);
            }
            return;
        }
        if self.heap.get(stub_id).is_managed() {
            let stub = self.heap.get_mut(stub_id);
            let data = std::mem::replace(&mut stub.data, StubData::Bytes(Default::default()));
            stub.used = 0;
            stub.cap = 0;
            stub.link = None;
            stub.flags |= sf::INACCESSIBLE;
            if let StubData::Cells(mut cells) = data {
                cells.clear();
                self.varlist_pool.push(cells);
            }
        } else {
            let stub = self.heap.get_mut(stub_id);
            let data = std::mem::replace(&mut stub.data, StubData::Bytes(Default::default()));
            if let StubData::Cells(mut cells) = data {
                cells.clear();
                self.varlist_pool.push(cells);
            }
            self.heap.free(stub_id);
        }
    }

    /// Evaluate one expression from the frame's feed into a step result.
    /// This is a GC safe point.
    pub fn eval_step(&mut self, index: usize) -> Result<Step, Raise> {
        self.maybe_gc();
        let feed = self.frames[index].feed;
        if feed.index >= self.array_len(feed.array) {
            return Ok(Step::Finished);
        }
        let cell = self.array_get(feed.array, feed.index)?;
        {
            let frame = &mut self.frames[index];
            frame.expr_index = feed.index;
            frame.feed.index = feed.index + 1;
        }
        self.eval_cell(index, cell)
    }

    /// Evaluate a whole array in a fresh frame, yielding its last value.
    pub fn eval_array(&mut self, array: ArrayId) -> Result<Step, Raise> {
        let index = self.frame_push(Feed::new(array));
        let mut last = Cell::nulled();
        let result = loop {
            match self.eval_step(index) {
                Ok(Step::Finished) => break Ok(Step::Value(last)),
                Ok(Step::Value(value)) => last = value,
                Ok(Step::Thrown(payload)) => break Ok(Step::Thrown(payload)),
                Err(raise) => break Err(raise),
            }
        };
        self.frame_drop(index);
        result
    }

    fn eval_cell(&mut self, index: usize, cell: Cell) -> Result<Step, Raise> {
        // Inline-quoted values evaluate by shedding one quote level, same
        // as the overflowed form below.
        if cell.header.byte >= MAX_KIND {
            return Ok(Step::Value(self.unquotify(cell, 1)?));
        }
        match cell.kind() {
            Kind::End => panic!("end marker reached the evaluator"),
            Kind::Key => panic!("key cell reached the evaluator"),
            Kind::Quoted => Ok(Step::Value(self.unquotify(cell, 1)?)),

            Kind::Nulled
            | Kind::Blank
            | Kind::Logic
            | Kind::Integer
            | Kind::Decimal
            | Kind::Text
            | Kind::Object
            | Kind::Block => Ok(Step::Value(cell)),

            Kind::Action => self.run_action(index, cell.as_action(), None),

            Kind::Word => {
                let fetched = self.word_fetch(&cell)?;
                if fetched.kind() == Kind::Action {
                    self.run_action(index, fetched.as_action(), Some(cell.as_word()))
                } else if fetched.kind() == Kind::Nulled {
                    Err(Raise::NotAValue(cell.as_word()))
                } else {
                    Ok(Step::Value(fetched))
                }
            }

            Kind::GetWord => Ok(Step::Value(self.word_fetch(&cell)?)),

            Kind::SetWord => match self.eval_step(index)? {
                Step::Finished => Err(Raise::NotAValue(cell.as_word())),
                Step::Thrown(payload) => Ok(Step::Thrown(payload)),
                Step::Value(value) => {
                    self.word_assign(&cell, value)?;
                    Ok(Step::Value(value))
                }
            },

            Kind::Group => {
                let (array, at) = cell.as_array();
                debug_assert_eq!(at, 0, "group evaluation from an offset");
                self.eval_array(array)
            }
        }
    }

    // -- word access -------------------------------------------------------

    /// Fetch the variable a word refers to.
    pub fn word_fetch(&mut self, word: &Cell) -> Result<Cell, Raise> {
        let symbol = word.as_word();
        let context = self.word_locate(word)?;
        let slot = self
            .context_find(context, symbol)
            .ok_or(Raise::Unbound(symbol))?;
        self.context_var(context, slot)
    }

    /// Assign through a word's binding.
    pub fn word_assign(&mut self, word: &Cell, value: Cell) -> Result<(), Raise> {
        let symbol = word.as_word();
        let context = self.word_locate(word)?;
        let slot = self
            .context_find(context, symbol)
            .ok_or(Raise::Unbound(symbol))?;
        self.context_set_var(context, slot, value)
    }

    /// Resolve a word's binding to a concrete context.  Relative bindings
    /// are only meaningful while a frame for their action is live.
    fn word_locate(&self, word: &Cell) -> Result<ContextId, Raise> {
        use rill_core::Binding;
        let symbol = word.as_word();
        match word.binding {
            Binding::Unbound => Err(Raise::Unbound(symbol)),
            Binding::Specific(context) => Ok(context),
            Binding::Relative(action) => {
                for frame in self.frames.iter().rev() {
                    let Some(original) = frame.original else { continue };
                    if original == action
                        || self.action_info(original).underlying == action
                    {
                        return Ok(frame.args.expect("call frame without args"));
                    }
                }
                Err(Raise::Unbound(symbol))
            }
        }
    }

    // -- frame introspection (for dispatchers) ----------------------------

    pub fn frame_args(&self, index: usize) -> ContextId {
        self.frames[index].args.expect("frame has no argument context")
    }

    /// Argument in parameter slot `param` (1-based, underlying order).
    pub fn frame_arg(&self, index: usize, param: usize) -> Cell {
        let args = self.frame_args(index);
        self.context_var(args, param).expect("argument context inaccessible")
    }

    pub fn frame_label(&self, index: usize) -> Option<SymbolId> {
        self.frames[index].label
    }

    /// Detail cell of the frame's current phase.
    pub fn frame_detail(&self, index: usize, slot: usize) -> Cell {
        let phase = self.frames[index].phase.expect("frame has no phase");
        let details = self.action_info(phase).details;
        self.array_get(details, slot).expect("details inaccessible")
    }

    /// Move the frame's argument context into a surviving GC-managed node,
    /// for dispatchers that need the arguments to outlive the call.
    pub fn frame_capture_args(&mut self, index: usize) -> Result<ContextId, Raise> {
        let args = self.frame_args(index);
        let stolen = self.context_steal(args)?;
        Ok(stolen)
    }
}
