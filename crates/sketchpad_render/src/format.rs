use sketchpad_events::{decode_events, Event};

use crate::{apply_canvas, apply_turtle, DrawingState, Surface};

/// What sort of run produced an event stream.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputKind {
    #[default]
    Normal,
    /// The program didn't compile; `text` holds the diagnostics and nothing was drawn.
    CompileError,
    /// The stream starts with a runtime error; `text` holds the messages and nothing was drawn.
    RuntimeError,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormattedOutput {
    pub kind: OutputKind,
    /// One line per textual event, without a trailing newline.
    pub text: String,
    /// The run was stopped by its time limit.
    pub timed_out: bool,
    /// A normal run that hit an error part way through.
    pub failed: bool,
}

/// Format the JSON output of a run. See [`format_events`].
///
/// Empty or unparsable input gives empty output, and leaves the surfaces alone.
pub fn format_output(
    json: &str,
    turtle: Option<&mut dyn Surface>,
    canvas: Option<&mut dyn Surface>,
) -> FormattedOutput {
    if json.trim().is_empty() {
        return FormattedOutput::default();
    }
    match decode_events(json) {
        Ok(events) => format_events(&events, turtle, canvas),
        Err(e) => {
            log::warn!("can't format output: {e}");
            FormattedOutput::default()
        }
    }
}

/// Turn the events of one run into text, and replay its drawing commands.
///
/// Unless the stream is a list of diagnostics, both surfaces are cleared (and the canvas
/// paint state reset) before anything is replayed, so formatting the same events twice
/// gives the same pixels.
pub fn format_events(
    events: &[Event],
    mut turtle: Option<&mut dyn Surface>,
    mut canvas: Option<&mut dyn Surface>,
) -> FormattedOutput {
    match events.first() {
        None => return FormattedOutput::default(),
        Some(Event::CompileError { .. }) => {
            let lines: Vec<_> = events
                .iter()
                .filter_map(|ev| match ev {
                    Event::CompileError { line, message } => Some(format!("Line {line}: {message}")),
                    _ => None,
                })
                .collect();
            return FormattedOutput {
                kind: OutputKind::CompileError,
                text: lines.join("\n"),
                ..Default::default()
            };
        }
        Some(Event::RuntimeError { .. }) => {
            let lines: Vec<_> = events
                .iter()
                .filter_map(|ev| match ev {
                    Event::RuntimeError { message } => Some(message.as_str()),
                    _ => None,
                })
                .collect();
            return FormattedOutput {
                kind: OutputKind::RuntimeError,
                text: lines.join("\n"),
                ..Default::default()
            };
        }
        Some(_) => {}
    }

    if let Some(surface) = turtle.as_deref_mut() {
        surface.clear();
    }
    if let Some(surface) = canvas.as_deref_mut() {
        surface.clear();
    }
    let mut state = DrawingState::default();

    let mut out = FormattedOutput::default();
    let mut lines = Vec::new();
    for ev in events {
        match ev {
            Event::Turtle(cmd) => {
                if let Some(surface) = turtle.as_deref_mut() {
                    apply_turtle(surface, cmd);
                }
            }
            Event::Canvas(cmd) => {
                if let Some(surface) = canvas.as_deref_mut() {
                    apply_canvas(&mut state, surface, cmd);
                }
            }
            Event::Print { value } | Event::Message { value, .. } => lines.push(value.clone()),
            Event::RuntimeError { message } => {
                out.failed = true;
                lines.push(message.clone());
            }
            Event::CompileError { line, message } => {
                log::warn!("compile error in the middle of a run");
                out.failed = true;
                lines.push(format!("Line {line}: {message}"));
            }
            Event::Timeout => out.timed_out = true,
        }
    }
    out.text = lines.join("\n");
    out
}

#[cfg(test)]
mod tests {
    use kurbo::Point;
    use sketchpad_events::{CanvasCmd, Color, Rgba8, TurtleCmd};

    use super::*;
    use crate::Raster;

    fn surfaces() -> (Raster, Raster) {
        (Raster::new(20, 20), Raster::new(20, 20))
    }

    fn format(events: &[Event], turtle: &mut Raster, canvas: &mut Raster) -> FormattedOutput {
        format_events(events, Some(turtle), Some(canvas))
    }

    #[test]
    fn compile_errors() {
        let (mut t, mut c) = surfaces();
        let events = vec![
            Event::CompileError {
                line: 1,
                message: "syntax error".into(),
            },
            Event::CompileError {
                line: 4,
                message: "unknown procedure".into(),
            },
        ];
        let out = format(&events, &mut t, &mut c);
        assert_eq!(out.kind, OutputKind::CompileError);
        assert_eq!(out.text, "Line 1: syntax error\nLine 4: unknown procedure");
    }

    #[test]
    fn leading_runtime_error_skips_rendering() {
        let (mut t, mut c) = surfaces();
        let events = vec![
            Event::RuntimeError {
                message: "assertion failed".into(),
            },
            Event::Canvas(CanvasCmd::FillRect {
                corners: [Point::ORIGIN, Point::new(5.0, 5.0)],
            }),
        ];
        let out = format(&events, &mut t, &mut c);
        assert_eq!(out.kind, OutputKind::RuntimeError);
        assert_eq!(out.text, "assertion failed");
        assert_eq!(c.pixel(1, 1), Some(Rgba8::TRANSPARENT));
    }

    #[test]
    fn normal_run_routes_events() {
        let (mut t, mut c) = surfaces();
        let events = vec![
            Event::print("one"),
            Event::Turtle(TurtleCmd::Line {
                from: Point::ORIGIN,
                to: Point::new(5.0, 0.0),
                color: Color::BLACK,
            }),
            Event::Canvas(CanvasCmd::FillRect {
                corners: [Point::ORIGIN, Point::new(5.0, 5.0)],
            }),
            Event::Message {
                kind: "note".into(),
                value: "two".into(),
            },
            Event::RuntimeError {
                message: "division by zero".into(),
            },
        ];
        let out = format(&events, &mut t, &mut c);
        assert_eq!(out.kind, OutputKind::Normal);
        assert_eq!(out.text, "one\ntwo\ndivision by zero");
        assert!(out.failed);
        assert!(!out.timed_out);
        assert_eq!(t.pixel(12, 10), Some(Rgba8::BLACK));
        assert_eq!(c.pixel(2, 2), Some(Rgba8::BLACK));
        assert_eq!(c.pixel(2, 10), Some(Rgba8::TRANSPARENT));
    }

    #[test]
    fn previous_contents_are_cleared() {
        let (mut t, mut c) = surfaces();
        let fill = Event::Canvas(CanvasCmd::FillRect {
            corners: [Point::ORIGIN, Point::new(5.0, 5.0)],
        });
        format(&[fill], &mut t, &mut c);
        assert_eq!(c.pixel(1, 1), Some(Rgba8::BLACK));
        format(&[Event::print("hi")], &mut t, &mut c);
        assert_eq!(c.pixel(1, 1), Some(Rgba8::TRANSPARENT));
    }

    #[test]
    fn timeout_is_flagged() {
        let (mut t, mut c) = surfaces();
        let out = format(&[Event::print("x"), Event::Timeout], &mut t, &mut c);
        assert!(out.timed_out);
        assert_eq!(out.text, "x");
    }

    #[test]
    fn missing_surfaces() {
        let events = vec![
            Event::print("still printed"),
            Event::Canvas(CanvasCmd::Clear),
        ];
        let out = format_events(&events, None, None);
        assert_eq!(out.text, "still printed");
    }

    #[test]
    fn bad_json_is_empty() {
        let (mut t, mut c) = surfaces();
        for json in ["", "   ", "not json", "{}", "[]"] {
            let out = format_output(json, Some(&mut t), Some(&mut c));
            assert_eq!(out, FormattedOutput::default(), "input {json:?}");
        }
    }
}
