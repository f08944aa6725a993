use sketchpad_runner::CompileDiagnostic;

/// A problem found before the program runs. Every variant knows its line.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("I don't understand {near:?}")]
    Syntax { line: u32, near: String },
    #[error("too deeply nested")]
    TooDeep { line: u32 },
    #[error("I don't know how to {name}")]
    UnknownProcedure { line: u32, name: String },
    #[error("wrong number of inputs to {name} (expected {expected}, found {found})")]
    WrongInputs {
        line: u32,
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("{name} doesn't like {arg} as input")]
    BadInput { line: u32, name: String, arg: String },
    #[error("{name} is already defined")]
    Redefined { line: u32, name: String },
    #[error("{name} is a primitive, it can't be redefined")]
    Primitive { line: u32, name: String },
}

impl CompileError {
    pub fn line(&self) -> u32 {
        match self {
            CompileError::Syntax { line, .. }
            | CompileError::TooDeep { line }
            | CompileError::UnknownProcedure { line, .. }
            | CompileError::WrongInputs { line, .. }
            | CompileError::BadInput { line, .. }
            | CompileError::Redefined { line, .. }
            | CompileError::Primitive { line, .. } => *line,
        }
    }
}

impl From<CompileError> for CompileDiagnostic {
    fn from(e: CompileError) -> Self {
        CompileDiagnostic {
            line: e.line(),
            message: e.to_string(),
        }
    }
}

/// A problem that stops a running program.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum LogoError {
    #[error("{name} has no value")]
    UnknownVariable { name: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("number too big")]
    Overflow,
    #[error("repeat doesn't like {0} as input")]
    BadRepeatCount(f64),
    #[error("{name} doesn't like {arg} as input")]
    BadInput { name: &'static str, arg: String },
    #[error("wrong number of inputs to {name} (found {found})")]
    WrongInputs { name: &'static str, found: usize },
    #[error("too many nested procedure calls (the limit is {0})")]
    TooDeep(usize),
    #[error("{0} has nothing left to read")]
    NoInput(&'static str),
    #[error("{atom} expected {expected}, not {found}")]
    UnexpectedInput {
        atom: &'static str,
        expected: &'static str,
        found: String,
    },
    #[error("there is no canvas to measure")]
    NoCanvas,
    /// Raised by the program itself with `error`.
    #[error("{0}")]
    User(String),
}
