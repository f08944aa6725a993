use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1},
    character::complete::{
        alpha1, alphanumeric0, char, digit0, digit1, multispace1, not_line_ending, satisfy,
    },
    combinator::{all_consuming, map, map_res, not, opt, recognize, value, verify},
    error::ErrorKind,
    multi::{many0, many0_count},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::{
    ast::{
        Arg, AtomKind, Block, BoolExpr, CmpKind, Ident, NumExpr, OpKind, ProcedureCall,
        ProcedureDef, Span, Statement,
    },
    CompileError,
};

/// Whitespace and `;` comments.
fn blank(input: Span) -> IResult<Span, ()> {
    value(
        (),
        many0_count(alt((
            multispace1,
            recognize(pair(char(';'), not_line_ending)),
        ))),
    )(input)
}

fn ws<'a, F: 'a, O>(inner: F) -> impl FnMut(Span<'a>) -> IResult<Span<'a>, O>
where
    F: FnMut(Span<'a>) -> IResult<Span<'a>, O>,
{
    delimited(blank, inner, blank)
}

/// A keyword, not followed by anything that would make it a longer word.
fn keyword<'a>(kw: &'static str) -> impl FnMut(Span<'a>) -> IResult<Span<'a>, Span<'a>> {
    terminated(tag(kw), not(satisfy(|c: char| c.is_alphanumeric())))
}

const RESERVED: &[&str] = &[
    "to",
    "end",
    "if",
    "repeat",
    "make",
    "prompt",
    "confirm",
    "canvaswidth",
    "canvasheight",
];

pub fn ident(input: Span) -> IResult<Span, Ident> {
    map(
        verify(recognize(pair(alpha1, alphanumeric0)), |s: &Span| {
            !RESERVED.contains(s.fragment())
        }),
        Ident,
    )(input)
}

pub fn number(input: Span) -> IResult<Span, f64> {
    map_res(
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        |s: Span| s.fragment().parse::<f64>(),
    )(input)
}

fn op<'a>(ch: char, kind: OpKind) -> impl FnMut(Span<'a>) -> IResult<Span<'a>, OpKind> {
    ws(value(kind, char(ch)))
}

fn cmp(input: Span) -> IResult<Span, CmpKind> {
    ws(alt((
        value(CmpKind::Eq, char('=')),
        value(CmpKind::Lt, char('<')),
        value(CmpKind::Gt, char('>')),
    )))(input)
}

fn atom_kind(input: Span) -> IResult<Span, AtomKind> {
    alt((
        value(AtomKind::Prompt, keyword("prompt")),
        value(AtomKind::Confirm, keyword("confirm")),
        value(AtomKind::CanvasWidth, keyword("canvaswidth")),
        value(AtomKind::CanvasHeight, keyword("canvasheight")),
    ))(input)
}

/// How deeply parentheses, negations and blocks may nest.
pub const MAX_NESTING: usize = 32;
/// How many operands one chain of `+ -` or `* /` may have.
pub const MAX_OPERANDS: usize = 64;

fn too_deep(input: Span) -> nom::Err<nom::error::Error<Span>> {
    nom::Err::Failure(nom::error::Error::new(input, ErrorKind::TooLarge))
}

/// Fix the nesting depth of a parser that tracks it.
fn at_depth<'a, O>(
    f: fn(Span<'a>, usize) -> IResult<Span<'a>, O>,
    depth: usize,
) -> impl FnMut(Span<'a>) -> IResult<Span<'a>, O> {
    move |input| f(input, depth)
}

pub fn atom<'a>(input: Span<'a>, depth: usize) -> IResult<Span<'a>, NumExpr<'a>> {
    if depth > MAX_NESTING {
        return Err(too_deep(input));
    }
    ws(alt((
        delimited(char('('), at_depth(num_expr, depth + 1), char(')')),
        map(number, NumExpr::Lit),
        map(preceded(char(':'), ident), NumExpr::Var),
        map(preceded(char('-'), at_depth(atom, depth + 1)), |e| {
            NumExpr::Neg(Box::new(e))
        }),
        map(atom_kind, NumExpr::Atom),
    )))(input)
}

/// A left-associative chain of operands joined by the operators `ops` accepts.
fn chain<'a, P>(
    mut ops: P,
    operand: fn(Span<'a>, usize) -> IResult<Span<'a>, NumExpr<'a>>,
    depth: usize,
) -> impl FnMut(Span<'a>) -> IResult<Span<'a>, NumExpr<'a>>
where
    P: FnMut(Span<'a>) -> IResult<Span<'a>, OpKind>,
{
    move |input: Span<'a>| {
        let (mut input, mut lhs) = operand(input, depth)?;
        let mut operands = 1;
        loop {
            let (rest, op) = match ops(input) {
                Ok(parsed) => parsed,
                Err(nom::Err::Error(_)) => return Ok((input, lhs)),
                Err(e) => return Err(e),
            };
            let (rest, rhs) = match operand(rest, depth) {
                Ok(parsed) => parsed,
                Err(nom::Err::Error(_)) => return Ok((input, lhs)),
                Err(e) => return Err(e),
            };
            if operands == MAX_OPERANDS {
                return Err(too_deep(input));
            }
            operands += 1;
            lhs = NumExpr::Op(Box::new(lhs), op, Box::new(rhs));
            input = rest;
        }
    }
}

pub fn term<'a>(input: Span<'a>, depth: usize) -> IResult<Span<'a>, NumExpr<'a>> {
    let mul = op('*', OpKind::Mul);
    let div = op('/', OpKind::Div);
    chain(alt((mul, div)), atom, depth)(input)
}

pub fn num_expr<'a>(input: Span<'a>, depth: usize) -> IResult<Span<'a>, NumExpr<'a>> {
    let add = op('+', OpKind::Add);
    let sub = op('-', OpKind::Sub);
    chain(alt((add, sub)), term, depth)(input)
}

pub fn bool_expr<'a>(input: Span<'a>, depth: usize) -> IResult<Span<'a>, BoolExpr<'a>> {
    map(
        tuple((at_depth(num_expr, depth), cmp, at_depth(num_expr, depth))),
        |(a, cmp, b)| BoolExpr(a, cmp, b),
    )(input)
}

/// A quoted word: `"` followed by anything up to whitespace or a bracket.
pub fn word(input: Span) -> IResult<Span, Span> {
    preceded(
        char('"'),
        take_till1(|c: char| c.is_whitespace() || c == '[' || c == ']'),
    )(input)
}

pub fn arg<'a>(input: Span<'a>, depth: usize) -> IResult<Span<'a>, Arg<'a>> {
    alt((
        map(ws(word), Arg::Word),
        map(at_depth(num_expr, depth), Arg::Num),
    ))(input)
}

pub fn procedure_def<'a>(input: Span<'a>, depth: usize) -> IResult<Span<'a>, ProcedureDef<'a>> {
    let (input, _) = keyword("to")(input)?;
    if depth >= MAX_NESTING {
        return Err(too_deep(input));
    }
    map(
        tuple((
            ws(ident),
            many0(ws(preceded(char(':'), ident))),
            many0(at_depth(statement, depth + 1)),
            keyword("end"),
        )),
        |(name, params, statements, end)| ProcedureDef {
            name,
            params,
            body: Block { statements },
            end_line: end.location_line(),
        },
    )(input)
}

pub fn procedure_call<'a>(input: Span<'a>, depth: usize) -> IResult<Span<'a>, ProcedureCall<'a>> {
    map(
        tuple((ws(ident), many0(at_depth(arg, depth)))),
        |(name, args)| ProcedureCall { name, args },
    )(input)
}

pub fn block<'a>(input: Span<'a>, depth: usize) -> IResult<Span<'a>, Block<'a>> {
    let (input, _) = ws(char('['))(input)?;
    if depth >= MAX_NESTING {
        return Err(too_deep(input));
    }
    map(
        terminated(many0(at_depth(statement, depth + 1)), ws(char(']'))),
        |statements| Block { statements },
    )(input)
}

pub fn statement<'a>(input: Span<'a>, depth: usize) -> IResult<Span<'a>, Statement<'a>> {
    let if_statement = map(
        tuple((
            keyword("if"),
            at_depth(bool_expr, depth),
            at_depth(block, depth),
        )),
        |(kw, cond, body)| Statement::If {
            line: kw.location_line(),
            cond,
            body,
        },
    );
    let repeat_statement = map(
        tuple((
            keyword("repeat"),
            at_depth(num_expr, depth),
            at_depth(block, depth),
        )),
        |(kw, count, body)| Statement::Repeat {
            line: kw.location_line(),
            count,
            body,
        },
    );
    let make_statement = map(
        tuple((
            keyword("make"),
            ws(preceded(char('"'), ident)),
            at_depth(num_expr, depth),
        )),
        |(_, name, value)| Statement::Make { name, value },
    );
    ws(alt((
        if_statement,
        repeat_statement,
        make_statement,
        map(at_depth(procedure_def, depth), Statement::Def),
        map(at_depth(procedure_call, depth), Statement::Call),
    )))(input)
}

pub fn program(input: Span) -> IResult<Span, Block> {
    all_consuming(map(ws(many0(at_depth(statement, 0))), |statements| {
        Block { statements }
    }))(input)
}

/// The start of the line where parsing got stuck, for error messages.
fn snippet(rest: &Span) -> String {
    let line = rest.fragment().lines().next().unwrap_or("").trim();
    match line.char_indices().nth(24) {
        Some((i, _)) => format!("{}...", &line[..i]),
        None => line.to_owned(),
    }
}

pub fn parse(source: &str) -> Result<Block<'_>, CompileError> {
    match program(Span::new(source)) {
        Ok((_, block)) => Ok(block),
        Err(nom::Err::Failure(e)) if e.code == ErrorKind::TooLarge => {
            Err(CompileError::TooDeep {
                line: e.input.location_line(),
            })
        }
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(CompileError::Syntax {
            line: e.input.location_line(),
            near: snippet(&e.input),
        }),
        Err(nom::Err::Incomplete(_)) => Err(CompileError::Syntax {
            line: source.lines().count().max(1) as u32,
            near: String::new(),
        }),
    }
}
