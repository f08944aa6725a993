//! A small LOGO dialect.
//!
//! Source text is parsed with [`nom`] into an AST, checked and lowered to a flat list of
//! instructions, and then run one instruction per step by a [`LogoInterpreter`]. The
//! interpreter never touches a surface directly: turtle moves and canvas calls become
//! events, which the host replays.
//!
//! ```text
//! to square :size
//!   repeat 4 [fd :size rt 90]
//! end
//! square 50
//! ```

use std::collections::VecDeque;

use sketchpad_events::InputValue;
use sketchpad_runner::{CompileDiagnostic, EventSink, Language};

pub mod ast;
mod builtin;
mod compile;
mod error;
mod interp;
pub mod parse;
mod turtle;

pub use builtin::{Builtin, Param};
pub use compile::{compile, Program};
pub use error::{CompileError, LogoError};
pub use interp::{format_number, LogoInterpreter};
pub use turtle::Turtle;

/// The LOGO language, as seen by the driver.
#[derive(Clone, Debug)]
pub struct Logo {
    /// How deeply procedure calls may nest before the program is stopped.
    pub max_depth: usize,
}

impl Default for Logo {
    fn default() -> Self {
        Logo { max_depth: 256 }
    }
}

impl Language for Logo {
    type Program = Program;
    type Interpreter = LogoInterpreter;

    fn compile(&self, source: &str) -> Result<Program, Vec<CompileDiagnostic>> {
        compile(source).map_err(|errs| errs.into_iter().map(CompileDiagnostic::from).collect())
    }

    fn instantiate(
        &self,
        program: Program,
        inputs: VecDeque<InputValue>,
        sink: EventSink,
    ) -> LogoInterpreter {
        LogoInterpreter::new(program, inputs, sink, self.max_depth)
    }
}
