pub type Span<'a> = nom_locate::LocatedSpan<&'a str>;

#[derive(Clone, Debug)]
pub struct Ident<'a>(pub Span<'a>);

impl<'a> Ident<'a> {
    pub fn name(&self) -> &'a str {
        *self.0.fragment()
    }

    pub fn line(&self) -> u32 {
        self.0.location_line()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OpKind {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CmpKind {
    Eq,
    Lt,
    Gt,
}

/// A value that comes from outside the program.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AtomKind {
    /// The next prompt answer, as a number.
    Prompt,
    /// The next confirmation, as 1 or 0.
    Confirm,
    CanvasWidth,
    CanvasHeight,
}

impl AtomKind {
    pub fn name(self) -> &'static str {
        match self {
            AtomKind::Prompt => "prompt",
            AtomKind::Confirm => "confirm",
            AtomKind::CanvasWidth => "canvaswidth",
            AtomKind::CanvasHeight => "canvasheight",
        }
    }
}

#[derive(Clone, Debug)]
pub enum NumExpr<'a> {
    Lit(f64),
    Var(Ident<'a>),
    Neg(Box<NumExpr<'a>>),
    Op(Box<NumExpr<'a>>, OpKind, Box<NumExpr<'a>>),
    Atom(AtomKind),
}

#[derive(Clone, Debug)]
pub struct BoolExpr<'a>(pub NumExpr<'a>, pub CmpKind, pub NumExpr<'a>);

/// An input to a procedure call.
#[derive(Clone, Debug)]
pub enum Arg<'a> {
    Num(NumExpr<'a>),
    /// A quoted word, without its quote.
    Word(Span<'a>),
}

#[derive(Clone, Debug)]
pub enum Statement<'a> {
    Def(ProcedureDef<'a>),
    Call(ProcedureCall<'a>),
    If {
        line: u32,
        cond: BoolExpr<'a>,
        body: Block<'a>,
    },
    Repeat {
        line: u32,
        count: NumExpr<'a>,
        body: Block<'a>,
    },
    Make {
        name: Ident<'a>,
        value: NumExpr<'a>,
    },
}

#[derive(Clone, Debug, Default)]
pub struct Block<'a> {
    pub statements: Vec<Statement<'a>>,
}

#[derive(Clone, Debug)]
pub struct ProcedureDef<'a> {
    pub name: Ident<'a>,
    pub params: Vec<Ident<'a>>,
    pub body: Block<'a>,
    /// The line of the closing `end`.
    pub end_line: u32,
}

#[derive(Clone, Debug)]
pub struct ProcedureCall<'a> {
    pub name: Ident<'a>,
    pub args: Vec<Arg<'a>>,
}
