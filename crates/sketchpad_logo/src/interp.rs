use std::{
    collections::{HashMap, VecDeque},
    rc::Rc,
};

use kurbo::{Point, Vec2};
use serde_json::Value;
use sketchpad_events::{CanvasCmd, Color, Event, InputValue, Rgba8, TextAlign, TurtleCmd};
use sketchpad_render::SurfaceHandle;
use sketchpad_runner::{EventSink, EventToken, ExecutionStatus, HostEvent, Interpreter};

use crate::{
    ast::{AtomKind, CmpKind, OpKind},
    builtin::{Builtin, Param},
    compile::{Arg, Expr, Instr, Program},
    turtle::Turtle,
    LogoError,
};

#[derive(Debug, Default)]
struct Frame {
    vars: HashMap<String, f64>,
    /// Remaining iterations of the loops running in this frame, innermost last.
    loops: Vec<u64>,
    return_pc: usize,
}

/// Format a number the way `print` shows it: integers without a fractional part.
pub fn format_number(x: f64) -> String {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        x.to_string()
    }
}

fn describe_input(input: &InputValue) -> String {
    match input {
        InputValue::Confirm(b) => format!("a confirmation ({b})"),
        InputValue::Prompt(s) => format!("{s:?}"),
        InputValue::Interaction(i) => format!("a {} interaction", i.classname),
    }
}

/// Runs a compiled program one instruction at a time.
pub struct LogoInterpreter {
    program: Rc<Program>,
    max_depth: usize,
    pc: usize,
    // Invariant: while running, this is non-empty and the first frame holds the globals.
    frames: Vec<Frame>,
    turtle: Turtle,
    status: ExecutionStatus,
    halt: bool,
    sink: EventSink,
    initial_inputs: VecDeque<InputValue>,
    inputs: VecDeque<InputValue>,
    events: VecDeque<(EventToken, HostEvent)>,
    next_token: u64,
    timer: Option<EventToken>,
    waiting_for_timer: bool,
    canvas: Option<SurfaceHandle>,
}

impl LogoInterpreter {
    pub fn new(
        program: Program,
        inputs: VecDeque<InputValue>,
        sink: EventSink,
        max_depth: usize,
    ) -> Self {
        LogoInterpreter {
            program: Rc::new(program),
            max_depth,
            pc: 0,
            frames: vec![Frame::default()],
            turtle: Turtle::default(),
            status: ExecutionStatus::NotStarted,
            halt: false,
            sink,
            initial_inputs: inputs,
            inputs: VecDeque::new(),
            events: VecDeque::new(),
            next_token: 0,
            timer: None,
            waiting_for_timer: false,
            canvas: None,
        }
    }

    fn lookup(&self, name: &str) -> Result<f64, LogoError> {
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.vars.get(name))
            .copied()
            .ok_or_else(|| LogoError::UnknownVariable {
                name: name.to_owned(),
            })
    }

    /// Assign to the innermost variable called `name`, creating a global if there is none.
    fn assign(&mut self, name: &str, value: f64) {
        if let Some(slot) = self
            .frames
            .iter_mut()
            .rev()
            .find_map(|f| f.vars.get_mut(name))
        {
            *slot = value;
        } else if let Some(globals) = self.frames.first_mut() {
            globals.vars.insert(name.to_owned(), value);
        }
    }

    fn next_input(&mut self, atom: AtomKind) -> Result<InputValue, LogoError> {
        self.inputs
            .pop_front()
            .ok_or(LogoError::NoInput(atom.name()))
    }

    fn atom(&mut self, atom: AtomKind) -> Result<f64, LogoError> {
        let unexpected = |expected, found: &InputValue| LogoError::UnexpectedInput {
            atom: atom.name(),
            expected,
            found: describe_input(found),
        };
        match atom {
            AtomKind::Prompt => match self.next_input(atom)? {
                InputValue::Prompt(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|x| x.is_finite())
                    .ok_or_else(|| unexpected("a number", &InputValue::Prompt(s.clone()))),
                other => Err(unexpected("a number", &other)),
            },
            AtomKind::Confirm => match self.next_input(atom)? {
                InputValue::Confirm(b) => Ok(if b { 1.0 } else { 0.0 }),
                other => Err(unexpected("a confirmation", &other)),
            },
            AtomKind::CanvasWidth | AtomKind::CanvasHeight => {
                let canvas = self.canvas.as_ref().ok_or(LogoError::NoCanvas)?;
                let surface = canvas.borrow();
                Ok(f64::from(if atom == AtomKind::CanvasWidth {
                    surface.width()
                } else {
                    surface.height()
                }))
            }
        }
    }

    fn eval(&mut self, e: &Expr) -> Result<f64, LogoError> {
        let x = match e {
            Expr::Num(x) => *x,
            Expr::Var(name) => self.lookup(name)?,
            Expr::Neg(e) => -self.eval(e)?,
            Expr::Op(l, op, r) => {
                let l = self.eval(l)?;
                let r = self.eval(r)?;
                match op {
                    OpKind::Add => l + r,
                    OpKind::Sub => l - r,
                    OpKind::Mul => l * r,
                    OpKind::Div if r == 0.0 => return Err(LogoError::DivisionByZero),
                    OpKind::Div => l / r,
                }
            }
            Expr::Atom(a) => self.atom(*a)?,
        };
        if x.is_finite() {
            Ok(x)
        } else {
            Err(LogoError::Overflow)
        }
    }

    fn num(&mut self, builtin: Builtin, arg: &Arg) -> Result<f64, LogoError> {
        match arg {
            Arg::Num(e) => self.eval(e),
            Arg::Word(w) => Err(LogoError::BadInput {
                name: builtin.name(),
                arg: format!("\"{w}"),
            }),
        }
    }

    fn text(&mut self, arg: &Arg) -> Result<String, LogoError> {
        match arg {
            Arg::Num(e) => Ok(format_number(self.eval(e)?)),
            Arg::Word(w) => Ok(w.clone()),
        }
    }

    fn draw(&self, cmd: Option<TurtleCmd>) {
        if let Some(cmd) = cmd {
            self.sink.push(cmd);
        }
    }

    fn exec_builtin(&mut self, builtin: Builtin, args: &[Arg]) -> Result<(), LogoError> {
        use Builtin as B;

        // Numeric inputs are evaluated up front, in order. Word-or-number inputs are
        // evaluated where they are used.
        let mut nums = Vec::with_capacity(args.len());
        for (arg, param) in args.iter().zip(builtin.params()) {
            if *param == Param::Num {
                nums.push(self.num(builtin, arg)?);
            }
        }
        let corners = |n: &[f64]| [Point::new(n[0], n[1]), Point::new(n[2], n[3])];
        let unit = |x: f64| x.clamp(0.0, 1.0);
        let byte = |x: f64| x.round().clamp(0.0, 255.0) as u8;
        let circle = |r: f64| {
            let sq = r * r;
            if sq.is_finite() {
                Ok(Vec2::new(sq, sq))
            } else {
                Err(LogoError::Overflow)
            }
        };

        match (builtin, nums.as_slice()) {
            (B::Forward, &[d]) => {
                let cmd = self.turtle.forward(d);
                self.draw(cmd);
            }
            (B::Back, &[d]) => {
                let cmd = self.turtle.back(d);
                self.draw(cmd);
            }
            (B::Left, &[a]) => self.turtle.left(a),
            (B::Right, &[a]) => self.turtle.right(a),
            (B::PenUp, []) => self.turtle.pen_down = false,
            (B::PenDown, []) => self.turtle.pen_down = true,
            (B::Home, []) => {
                let cmd = self.turtle.home();
                self.draw(cmd);
            }
            (B::SetColor, &[r, g, b]) => self.turtle.color = Color::rgb(unit(r), unit(g), unit(b)),
            (B::Arc, &[degrees, radius]) => {
                for cmd in self.turtle.arc(degrees, radius) {
                    self.sink.push(cmd);
                }
            }
            (B::Wait, []) => {
                self.waiting_for_timer = true;
                self.status = ExecutionStatus::Waiting;
                self.halt = true;
            }
            (B::Print, _) => {
                let text = self.text_arg(builtin, args, 0)?;
                self.sink.push(Event::print(text));
            }
            (B::Error, _) => {
                let text = self.text_arg(builtin, args, 0)?;
                return Err(LogoError::User(text));
            }
            (B::Clear, []) => self.sink.push(CanvasCmd::Clear),
            (B::SetFillColor, &[r, g, b, a]) => self
                .sink
                .push(CanvasCmd::SetFillColor(Color::rgba(unit(r), unit(g), unit(b), unit(a)))),
            (B::SetLineColor, &[r, g, b, a]) => self
                .sink
                .push(CanvasCmd::SetLineColor(Color::rgba(unit(r), unit(g), unit(b), unit(a)))),
            (B::SetOpacity, &[a]) => self.sink.push(CanvasCmd::SetOpacity(unit(a))),
            (B::SetFont, []) => {
                let font = self.text_arg(builtin, args, 0)?;
                self.sink.push(CanvasCmd::SetFont(font.replace('_', " ")));
            }
            (B::SetTextAlign, []) => {
                let align = match self.text_arg(builtin, args, 0)?.as_str() {
                    "left" | "start" => TextAlign::Left,
                    "center" => TextAlign::Center,
                    "right" | "end" => TextAlign::Right,
                    other => {
                        return Err(LogoError::BadInput {
                            name: builtin.name(),
                            arg: format!("\"{other}"),
                        })
                    }
                };
                self.sink.push(CanvasCmd::SetTextAlign(align));
            }
            (B::FillRect, n @ &[_, _, _, _]) => {
                self.sink.push(CanvasCmd::FillRect { corners: corners(n) })
            }
            (B::FrameRect, n @ &[_, _, _, _]) => {
                self.sink.push(CanvasCmd::FrameRect { corners: corners(n) })
            }
            (B::FillCircle, &[x, y, r]) => self.sink.push(CanvasCmd::FillEllipse {
                center: Point::new(x, y),
                radii_sq: circle(r)?,
            }),
            (B::FrameCircle, &[x, y, r]) => self.sink.push(CanvasCmd::StrokeEllipse {
                center: Point::new(x, y),
                radii_sq: circle(r)?,
            }),
            (B::Line, n @ &[_, _, _, _]) => {
                let [from, to] = corners(n);
                self.sink.push(CanvasCmd::Line { from, to });
            }
            (B::Text, &[x, y]) => {
                let text = self.text_arg(builtin, args, 2)?;
                self.sink.push(CanvasCmd::Text {
                    text,
                    position: Point::new(x, y),
                });
            }
            (B::SetPixel, &[x, y, r, g, b, a]) => self.sink.push(CanvasCmd::SetPixel {
                x,
                y,
                rgba: Rgba8::new(byte(r), byte(g), byte(b), byte(a)),
            }),
            (b, _) => {
                return Err(LogoError::WrongInputs {
                    name: b.name(),
                    found: args.len(),
                })
            }
        }
        Ok(())
    }

    /// The text of input number `i`, which may be a word or a number.
    fn text_arg(&mut self, builtin: Builtin, args: &[Arg], i: usize) -> Result<String, LogoError> {
        match args.get(i) {
            Some(arg) => self.text(arg),
            None => Err(LogoError::WrongInputs {
                name: builtin.name(),
                found: args.len(),
            }),
        }
    }

    fn ret(&mut self) {
        if self.frames.len() <= 1 {
            self.status = ExecutionStatus::Halted;
        } else if let Some(frame) = self.frames.pop() {
            self.pc = frame.return_pc;
        }
    }

    /// Execute the instruction at `pc`.
    fn step(&mut self) -> Result<(), LogoError> {
        let program = Rc::clone(&self.program);
        let Some(instr) = program.code.get(self.pc) else {
            self.status = ExecutionStatus::Halted;
            return Ok(());
        };
        let mut next = self.pc + 1;
        match instr {
            Instr::Builtin { builtin, args } => self.exec_builtin(*builtin, args)?,
            Instr::Make { name, value } => {
                let value = self.eval(value)?;
                self.assign(name, value);
            }
            Instr::Call { proc, args } => {
                if self.frames.len() > self.max_depth {
                    return Err(LogoError::TooDeep(self.max_depth));
                }
                let proc = &program.procs[*proc];
                let mut vars = HashMap::with_capacity(args.len());
                for (name, arg) in proc.params.iter().zip(args) {
                    vars.insert(name.clone(), self.eval(arg)?);
                }
                self.frames.push(Frame {
                    vars,
                    loops: Vec::new(),
                    return_pc: next,
                });
                next = proc.entry;
            }
            Instr::Return => {
                self.ret();
                if self.status == ExecutionStatus::Halted {
                    return Ok(());
                }
                next = self.pc;
            }
            Instr::JumpUnless { cond, target } => {
                let lhs = self.eval(&cond.lhs)?;
                let rhs = self.eval(&cond.rhs)?;
                let holds = match cond.cmp {
                    CmpKind::Eq => lhs == rhs,
                    CmpKind::Lt => lhs < rhs,
                    CmpKind::Gt => lhs > rhs,
                };
                if !holds {
                    next = *target;
                }
            }
            Instr::LoopStart { count, exit } => {
                let n = self.eval(count)?;
                if n < 0.0 || n.fract() != 0.0 {
                    return Err(LogoError::BadRepeatCount(n));
                }
                if n == 0.0 {
                    next = *exit;
                } else if let Some(frame) = self.frames.last_mut() {
                    frame.loops.push(n as u64);
                }
            }
            Instr::LoopNext { body } => {
                if let Some(frame) = self.frames.last_mut() {
                    match frame.loops.last_mut() {
                        Some(left) if *left > 1 => {
                            *left -= 1;
                            next = *body;
                        }
                        _ => {
                            frame.loops.pop();
                        }
                    }
                }
            }
            Instr::Halt => {
                self.status = ExecutionStatus::Halted;
                return Ok(());
            }
        }
        self.pc = next;
        Ok(())
    }

    fn queue(&mut self, event: HostEvent) -> EventToken {
        self.next_token += 1;
        let token = EventToken(self.next_token);
        self.events.push_back((token, event));
        token
    }

    fn dispatch(&mut self, token: EventToken, event: HostEvent) {
        match event {
            HostEvent::Timer => {
                if self.timer == Some(token) {
                    self.timer = None;
                }
                self.waiting_for_timer = false;
            }
            HostEvent::Interaction(i) => {
                log::debug!("no handler for {} ({})", i.kind(), i.classname)
            }
        }
    }
}

impl Interpreter for LogoInterpreter {
    fn status(&self) -> ExecutionStatus {
        self.status
    }

    fn set_status(&mut self, status: ExecutionStatus) {
        self.status = status;
    }

    fn exec_step(&mut self) {
        self.halt = false;
        if self.status != ExecutionStatus::Running {
            return;
        }
        if let Some((token, event)) = self.events.pop_front() {
            self.dispatch(token, event);
            return;
        }
        if self.waiting_for_timer {
            self.status = ExecutionStatus::Waiting;
            self.halt = true;
            return;
        }
        if let Err(e) = self.step() {
            let line = self.program.line(self.pc);
            log::debug!("runtime error on line {line}: {e}");
            self.sink.push(Event::RuntimeError {
                message: format!("Line {line}: {e}"),
            });
            self.status = ExecutionStatus::Halted;
        }
    }

    fn halt(&self) -> bool {
        self.halt
    }

    fn reset(&mut self) {
        self.pc = 0;
        self.frames = vec![Frame::default()];
        self.turtle = Turtle::default();
        self.inputs.clear();
        self.events.clear();
        // Interactions are host events; only prompt and confirm answers feed the input atoms.
        for input in self.initial_inputs.clone() {
            match input {
                InputValue::Interaction(i) => {
                    self.queue(HostEvent::Interaction(i));
                }
                answer => self.inputs.push_back(answer),
            }
        }
        self.timer = None;
        self.waiting_for_timer = false;
        self.halt = false;
        self.status = ExecutionStatus::Running;
    }

    fn stop_thread(&mut self) {
        self.events.clear();
        self.timer = None;
        self.waiting_for_timer = false;
        self.status = ExecutionStatus::Halted;
    }

    fn enqueue_event(&mut self, event: HostEvent, _payload: Value) -> Option<EventToken> {
        Some(self.queue(event))
    }

    fn timer_token(&self) -> Option<EventToken> {
        self.timer
    }

    fn set_timer_token(&mut self, token: Option<EventToken>) {
        self.timer = token;
    }

    fn bind_canvas(&mut self, surface: SurfaceHandle) {
        self.canvas = Some(surface);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;

    fn interp(src: &str, inputs: Vec<InputValue>) -> (LogoInterpreter, EventSink) {
        let sink = EventSink::default();
        let program = compile(src).unwrap();
        let mut i = LogoInterpreter::new(program, inputs.into(), sink.clone(), 8);
        i.reset();
        (i, sink)
    }

    fn run(i: &mut LogoInterpreter) {
        for _ in 0..10_000 {
            if i.status() != ExecutionStatus::Running {
                return;
            }
            i.exec_step();
        }
        panic!("didn't halt");
    }

    #[test]
    fn numbers_print_like_integers() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(1e20), "100000000000000000000");
    }

    #[test]
    fn one_instruction_per_step() {
        let (mut i, sink) = interp("print 1\nprint 2", vec![]);
        i.exec_step();
        assert_eq!(sink.len(), 1);
        i.exec_step();
        assert_eq!(sink.len(), 2);
        i.exec_step();
        assert_eq!(i.status(), ExecutionStatus::Halted);
    }

    #[test]
    fn variables_are_dynamically_scoped() {
        let src = "make \"x 1\nto show\n  print :x\nend\nto inner :x\n  show\n  make \"x 5\n  show\nend\ninner 3\nshow";
        let (mut i, sink) = interp(src, vec![]);
        run(&mut i);
        assert_eq!(
            sink.take(),
            vec![Event::print("3"), Event::print("5"), Event::print("1")]
        );
    }

    #[test]
    fn recursion_limit() {
        let (mut i, sink) = interp("to down :n\n  down :n + 1\nend\ndown 0", vec![]);
        run(&mut i);
        assert_eq!(
            sink.take(),
            vec![Event::RuntimeError {
                message: "Line 2: too many nested procedure calls (the limit is 8)".into()
            }]
        );
        assert_eq!(i.status(), ExecutionStatus::Halted);
    }

    #[test]
    fn nested_loops_and_stop() {
        let src = "to f\n  repeat 3 [repeat 2 [print 1 stop]]\nend\nf\nprint 2";
        let (mut i, sink) = interp(src, vec![]);
        run(&mut i);
        assert_eq!(sink.take(), vec![Event::print("1"), Event::print("2")]);
    }

    #[test]
    fn wait_until_the_timer_fires() {
        let (mut i, sink) = interp("wait\nprint 1", vec![]);
        i.exec_step();
        assert_eq!(i.status(), ExecutionStatus::Waiting);
        assert!(i.halt());

        // Promoted without a timer: still waiting.
        i.set_status(ExecutionStatus::Running);
        i.exec_step();
        assert_eq!(i.status(), ExecutionStatus::Waiting);

        i.set_status(ExecutionStatus::Running);
        let token = i.enqueue_event(HostEvent::Timer, Value::Null);
        i.set_timer_token(token);
        run(&mut i);
        assert_eq!(i.timer_token(), None);
        assert_eq!(sink.take(), vec![Event::print("1")]);
    }

    #[test]
    fn interactions_skip_the_input_queue() {
        let click = sketchpad_events::Interaction {
            classname: "canvas.mousedown".into(),
            event: Value::Null,
        };
        let inputs = vec![
            InputValue::Interaction(click.clone()),
            InputValue::Prompt("5".into()),
        ];
        let (mut i, sink) = interp("print prompt", inputs);
        assert_eq!(i.events.len(), 1);
        assert_eq!(i.inputs, VecDeque::from([InputValue::Prompt("5".into())]));
        assert!(i
            .enqueue_event(HostEvent::Interaction(click), Value::Null)
            .is_some());
        run(&mut i);
        assert_eq!(sink.take(), vec![Event::print("5")]);
        assert!(i.events.is_empty());
    }

    #[test]
    fn huge_circle_is_an_error() {
        let src = format!("fillcircle 0 0 1{}", "0".repeat(160));
        let (mut i, sink) = interp(&src, vec![]);
        run(&mut i);
        assert_eq!(i.status(), ExecutionStatus::Halted);
        assert_eq!(
            sink.take(),
            vec![Event::RuntimeError {
                message: "Line 1: number too big".into()
            }]
        );
    }

    #[test]
    fn inputs_are_consumed_in_order() {
        let inputs = vec![
            InputValue::Prompt(" 4 ".into()),
            InputValue::Confirm(false),
        ];
        let (mut i, sink) = interp("print prompt * 2\nprint confirm\nprint confirm", inputs);
        run(&mut i);
        assert_eq!(
            sink.take(),
            vec![
                Event::print("8"),
                Event::print("0"),
                Event::RuntimeError {
                    message: "Line 3: confirm has nothing left to read".into()
                },
            ]
        );
    }

    #[test]
    fn reset_restores_inputs_and_turtle() {
        let (mut i, sink) = interp("fd 10\nprint prompt", vec![InputValue::Prompt("1".into())]);
        run(&mut i);
        assert_eq!(sink.take().len(), 2);
        i.reset();
        assert_eq!(i.turtle, Turtle::default());
        run(&mut i);
        assert_eq!(sink.take().len(), 2);
    }

    #[test]
    fn mistyped_input() {
        let (mut i, sink) = interp("print prompt", vec![InputValue::Confirm(true)]);
        run(&mut i);
        assert_eq!(
            sink.take(),
            vec![Event::RuntimeError {
                message: "Line 1: prompt expected a number, not a confirmation (true)".into()
            }]
        );
    }
}
