//! Lowering the syntax tree to a flat list of instructions.
//!
//! Control flow becomes jumps, so that the interpreter can stop after any instruction and
//! pick up again later. Procedure definitions are hoisted: a procedure can be called
//! anywhere in the program, including before (or inside) its own definition.

use std::collections::HashMap;

use crate::{
    ast::{self, AtomKind, Block, CmpKind, NumExpr, OpKind, ProcedureCall, ProcedureDef, Statement},
    builtin::{Builtin, Param},
    parse::parse,
    CompileError,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Num(f64),
    Var(String),
    Neg(Box<Expr>),
    Op(Box<Expr>, OpKind, Box<Expr>),
    Atom(AtomKind),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    Num(Expr),
    Word(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Cond {
    pub lhs: Expr,
    pub cmp: CmpKind,
    pub rhs: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Instr {
    Builtin { builtin: Builtin, args: Vec<Arg> },
    Make { name: String, value: Expr },
    Call { proc: usize, args: Vec<Expr> },
    /// Leave the current procedure, or end the program if there isn't one.
    Return,
    JumpUnless { cond: Cond, target: usize },
    /// Start a loop of `count` iterations, or jump to `exit` if there are none.
    LoopStart { count: Expr, exit: usize },
    /// Count down the innermost loop, jumping back to `body` unless it's finished.
    LoopNext { body: usize },
    Halt,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Proc {
    pub name: String,
    pub params: Vec<String>,
    pub entry: usize,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    pub code: Vec<Instr>,
    /// The source line of each instruction.
    pub lines: Vec<u32>,
    pub procs: Vec<Proc>,
}

impl Program {
    fn emit(&mut self, instr: Instr, line: u32) -> usize {
        self.code.push(instr);
        self.lines.push(line);
        self.code.len() - 1
    }

    pub fn line(&self, pc: usize) -> u32 {
        self.lines.get(pc).copied().unwrap_or(0)
    }
}

fn collect_defs<'b, 'a>(block: &'b Block<'a>, out: &mut Vec<&'b ProcedureDef<'a>>) {
    for stmt in &block.statements {
        match stmt {
            Statement::Def(def) => {
                out.push(def);
                collect_defs(&def.body, out);
            }
            Statement::If { body, .. } | Statement::Repeat { body, .. } => collect_defs(body, out),
            Statement::Call(_) | Statement::Make { .. } => {}
        }
    }
}

fn lower(e: &NumExpr) -> Expr {
    match e {
        NumExpr::Lit(x) => Expr::Num(*x),
        NumExpr::Var(v) => Expr::Var(v.name().to_owned()),
        NumExpr::Neg(inner) => match lower(inner) {
            Expr::Num(x) => Expr::Num(-x),
            other => Expr::Neg(Box::new(other)),
        },
        NumExpr::Op(l, op, r) => Expr::Op(Box::new(lower(l)), *op, Box::new(lower(r))),
        NumExpr::Atom(a) => Expr::Atom(*a),
    }
}

#[derive(Default)]
struct Compiler {
    program: Program,
    proc_index: HashMap<String, usize>,
    errors: Vec<CompileError>,
}

impl Compiler {
    fn declare(&mut self, def: &ProcedureDef) -> bool {
        let name = def.name.name();
        if name == "stop" || Builtin::lookup(name).is_some() {
            self.errors.push(CompileError::Primitive {
                line: def.name.line(),
                name: name.to_owned(),
            });
            return false;
        }
        if self.proc_index.contains_key(name) {
            self.errors.push(CompileError::Redefined {
                line: def.name.line(),
                name: name.to_owned(),
            });
            return false;
        }
        self.proc_index
            .insert(name.to_owned(), self.program.procs.len());
        self.program.procs.push(Proc {
            name: name.to_owned(),
            params: def.params.iter().map(|p| p.name().to_owned()).collect(),
            entry: 0,
        });
        true
    }

    fn block(&mut self, block: &Block) {
        for stmt in &block.statements {
            self.statement(stmt);
        }
    }

    fn statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Def(_) => {}
            Statement::Call(call) => self.call(call),
            Statement::Make { name, value } => {
                self.program.emit(
                    Instr::Make {
                        name: name.name().to_owned(),
                        value: lower(value),
                    },
                    name.line(),
                );
            }
            Statement::If { line, cond, body } => {
                let cond = Cond {
                    lhs: lower(&cond.0),
                    cmp: cond.1,
                    rhs: lower(&cond.2),
                };
                let jump = self
                    .program
                    .emit(Instr::JumpUnless { cond, target: 0 }, *line);
                self.block(body);
                let after = self.program.code.len();
                if let Instr::JumpUnless { target, .. } = &mut self.program.code[jump] {
                    *target = after;
                }
            }
            Statement::Repeat { line, count, body } => {
                let start = self.program.emit(
                    Instr::LoopStart {
                        count: lower(count),
                        exit: 0,
                    },
                    *line,
                );
                let body_start = self.program.code.len();
                self.block(body);
                self.program
                    .emit(Instr::LoopNext { body: body_start }, *line);
                let after = self.program.code.len();
                if let Instr::LoopStart { exit, .. } = &mut self.program.code[start] {
                    *exit = after;
                }
            }
        }
    }

    fn wrong_inputs(&mut self, call: &ProcedureCall, expected: usize) {
        self.errors.push(CompileError::WrongInputs {
            line: call.name.line(),
            name: call.name.name().to_owned(),
            expected,
            found: call.args.len(),
        });
    }

    fn bad_input(&mut self, call: &ProcedureCall, arg: &str) {
        self.errors.push(CompileError::BadInput {
            line: call.name.line(),
            name: call.name.name().to_owned(),
            arg: arg.to_owned(),
        });
    }

    /// Lower the inputs of a call, checking them against what the callee accepts.
    fn args(&mut self, call: &ProcedureCall, params: &[Param]) -> Option<Vec<Arg>> {
        if call.args.len() != params.len() {
            self.wrong_inputs(call, params.len());
            return None;
        }
        let mut ok = true;
        let mut args = Vec::with_capacity(params.len());
        for (arg, param) in call.args.iter().zip(params) {
            match (arg, param) {
                (ast::Arg::Word(w), Param::Num) => {
                    self.bad_input(call, &format!("\"{}", w.fragment()));
                    ok = false;
                }
                (ast::Arg::Num(e), Param::Word) => {
                    let shown = match e {
                        NumExpr::Lit(x) => x.to_string(),
                        _ => "a number".to_owned(),
                    };
                    self.bad_input(call, &shown);
                    ok = false;
                }
                (ast::Arg::Word(w), _) => args.push(Arg::Word(w.fragment().to_string())),
                (ast::Arg::Num(e), _) => args.push(Arg::Num(lower(e))),
            }
        }
        ok.then_some(args)
    }

    fn call(&mut self, call: &ProcedureCall) {
        let name = call.name.name();
        let line = call.name.line();
        if name == "stop" {
            if self.args(call, &[]).is_some() {
                self.program.emit(Instr::Return, line);
            }
        } else if let Some(builtin) = Builtin::lookup(name) {
            if let Some(args) = self.args(call, builtin.params()) {
                self.program.emit(Instr::Builtin { builtin, args }, line);
            }
        } else if let Some(&proc) = self.proc_index.get(name) {
            let params = vec![Param::Num; self.program.procs[proc].params.len()];
            if let Some(args) = self.args(call, &params) {
                let args = args
                    .into_iter()
                    .filter_map(|a| match a {
                        Arg::Num(e) => Some(e),
                        Arg::Word(_) => None,
                    })
                    .collect();
                self.program.emit(Instr::Call { proc, args }, line);
            }
        } else {
            self.errors.push(CompileError::UnknownProcedure {
                line,
                name: name.to_owned(),
            });
        }
    }
}

/// Parse and compile a program, reporting every problem found.
pub fn compile(source: &str) -> Result<Program, Vec<CompileError>> {
    let block = parse(source).map_err(|e| vec![e])?;

    let mut defs = Vec::new();
    collect_defs(&block, &mut defs);

    let mut c = Compiler::default();
    let declared: Vec<_> = defs.into_iter().filter(|def| c.declare(def)).collect();

    let last_line = source.lines().count().max(1) as u32;
    c.block(&block);
    c.program.emit(Instr::Halt, last_line);

    for (index, def) in declared.into_iter().enumerate() {
        c.program.procs[index].entry = c.program.code.len();
        c.block(&def.body);
        c.program.emit(Instr::Return, def.end_line);
    }

    if c.errors.is_empty() {
        log::debug!(
            "compiled {} instructions, {} procedures",
            c.program.code.len(),
            c.program.procs.len()
        );
        Ok(c.program)
    } else {
        c.errors.sort_by_key(CompileError::line);
        Err(c.errors)
    }
}
