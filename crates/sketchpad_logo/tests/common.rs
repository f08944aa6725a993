use std::path::Path;

use sketchpad_events::{CanvasCmd, Color, Event, TurtleCmd};
use sketchpad_logo::{format_number, Logo};
use sketchpad_runner::Driver;

#[derive(Default, Clone)]
pub struct TestCase {
    input: String,
    expected: String,
}

fn nums(xs: &[f64]) -> String {
    xs.iter()
        .map(|&x| format_number(x))
        .collect::<Vec<_>>()
        .join(" ")
}

/// A one-line description of an event, in the notation of the `.txt` files.
fn describe(ev: &Event) -> String {
    match ev {
        Event::Print { value } => format!("print {value}"),
        Event::CompileError { line, message } => format!("compile error {line}: {message}"),
        Event::RuntimeError { message } => format!("runtime error: {message}"),
        Event::Timeout => "timeout".to_owned(),
        Event::Message { kind, value } => format!("{kind} {value}"),
        Event::Turtle(TurtleCmd::Line { from, to, color }) => {
            let mut s = format!(
                "line {} -> {}",
                nums(&[from.x, from.y]),
                nums(&[to.x, to.y])
            );
            if *color != Color::BLACK {
                s += &format!(" color {}", nums(&[color.r, color.g, color.b]));
            }
            s
        }
        Event::Canvas(cmd) => match cmd {
            CanvasCmd::FillRect { corners: [a, b] } => {
                format!("fillrect {}", nums(&[a.x, a.y, b.x, b.y]))
            }
            CanvasCmd::FillEllipse { center, radii_sq } => format!(
                "fillcircle {}",
                nums(&[center.x, center.y, radii_sq.x, radii_sq.y])
            ),
            CanvasCmd::Text { text, position } => {
                format!("text {} {text}", nums(&[position.x, position.y]))
            }
            CanvasCmd::SetFillColor(c) => format!("setfillcolor {}", nums(&[c.r, c.g, c.b, c.a])),
            CanvasCmd::SetFont(font) => format!("setfont {font}"),
            CanvasCmd::SetTextAlign(align) => format!("settextalign {align:?}"),
            CanvasCmd::SetPixel { x, y, rgba } => format!(
                "setpixel {} {}",
                nums(&[*x, *y]),
                rgba.to_hex()
            ),
            other => other.tag().to_owned(),
        },
    }
}

fn exec_one(s: &str) -> String {
    let mut driver = Driver::new(Logo::default());
    let events = driver.run(s, 1.0, Vec::new(), None).unwrap();
    events.iter().map(|ev| describe(ev) + "\n").collect()
}

impl TestCase {
    fn exec(&self) {
        assert_eq!(exec_one(&self.input), self.expected, "{}", self.input);
    }
}

pub fn read_tests(path: impl AsRef<Path>) -> Vec<TestCase> {
    let text = std::fs::read_to_string(path).unwrap();
    let mut ret = Vec::new();
    let mut in_input = true;
    let mut cur = TestCase::default();

    fn separator_line(line: &str, ch: u8) -> bool {
        line.trim().len() >= 2 && line.trim().bytes().all(|c| c == ch)
    }

    for line in text.split_inclusive('\n') {
        if in_input {
            if separator_line(line, b'-') {
                in_input = false;
            } else {
                cur.input += line;
            }
        } else if separator_line(line, b'=') {
            in_input = true;
            ret.push(std::mem::take(&mut cur));
        } else {
            cur.expected += line;
        }
    }
    ret
}

#[test]
fn text_tests() {
    let tests = read_tests("tests/run.txt");
    assert!(!tests.is_empty());
    for test in tests {
        test.exec();
    }
}

#[test]
fn text_failures() {
    let tests = read_tests("tests/compile-failures.txt");
    assert!(!tests.is_empty());
    for test in tests {
        test.exec();
    }
}
