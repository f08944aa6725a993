//! Running sketchpad programs under a time limit.
//!
//! A language plugs in through two traits: [`Language`] compiles source text and builds an
//! [`Interpreter`], and the interpreter is a state machine that the [`Driver`] advances one
//! step at a time. The driver runs steps in short slices, injects a timer event between
//! slices, and cuts the run off once its wall-clock budget is spent. Everything the program
//! wants to show ends up in an [`EventSink`], in order.

use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use serde_json::Value;
use sketchpad_events::{Event, InputValue, Interaction};
use sketchpad_render::SurfaceHandle;

mod driver;

pub use driver::{Driver, RunError, RunnerConfig};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ExecutionStatus {
    #[default]
    NotStarted,
    /// Suspended until a host event arrives. The driver moves this back to `Running` at the
    /// start of every slice.
    Waiting,
    Running,
    /// Finished, either normally or with an error.
    Halted,
}

/// Something that happened outside the program and is delivered to it.
#[derive(Clone, Debug, PartialEq)]
pub enum HostEvent {
    /// Fired between time slices.
    Timer,
    Interaction(Interaction),
}

/// Identifies an event in an interpreter's queue.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EventToken(pub u64);

/// A compiler diagnostic, addressed by 1-based line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileDiagnostic {
    pub line: u32,
    pub message: String,
}

impl From<CompileDiagnostic> for Event {
    fn from(d: CompileDiagnostic) -> Event {
        Event::CompileError {
            line: d.line,
            message: d.message,
        }
    }
}

/// The append-only list of events of one run, shared between the driver and the
/// interpreter.
#[derive(Clone, Debug, Default)]
pub struct EventSink(Rc<RefCell<Vec<Event>>>);

impl EventSink {
    pub fn push(&self, ev: impl Into<Event>) {
        let ev = ev.into();
        log::trace!("event {}", ev.tag());
        self.0.borrow_mut().push(ev);
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Remove and return everything collected so far.
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

/// A running program, advanced by the driver.
///
/// The interpreter owns its status. The driver only ever changes it from `Waiting` to
/// `Running`.
pub trait Interpreter {
    fn status(&self) -> ExecutionStatus;
    fn set_status(&mut self, status: ExecutionStatus);

    /// Do a small, bounded amount of work.
    fn exec_step(&mut self);

    /// True if the last step asked to yield to the host before the slice is over.
    fn halt(&self) -> bool;

    /// Go back to the start of the program, ready to run.
    fn reset(&mut self);

    /// Abandon whatever is currently executing.
    fn stop_thread(&mut self);

    /// Queue a host event for the program. Returns `None` if the program doesn't listen
    /// for this kind of event.
    fn enqueue_event(&mut self, event: HostEvent, payload: Value) -> Option<EventToken>;

    /// The token of the pending timer event, if there is one.
    fn timer_token(&self) -> Option<EventToken>;
    fn set_timer_token(&mut self, token: Option<EventToken>);

    /// Give the program a surface it can query (for example, for its size).
    fn bind_canvas(&mut self, _surface: SurfaceHandle) {}
}

pub trait Language {
    type Program;
    type Interpreter: Interpreter;

    fn compile(&self, source: &str) -> Result<Self::Program, Vec<CompileDiagnostic>>;

    /// Build an interpreter for `program`. `inputs` are answers to prompts and
    /// confirmations, consumed front to back; `sink` is where the program's output goes.
    fn instantiate(
        &self,
        program: Self::Program,
        inputs: VecDeque<InputValue>,
        sink: EventSink,
    ) -> Self::Interpreter;
}
