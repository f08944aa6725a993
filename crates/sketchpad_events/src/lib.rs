//! The records that a sketchpad run produces.
//!
//! Everything an interpreter wants the outside world to see (printed values, diagnostics,
//! drawing commands, timeouts) is appended to a single ordered list of [`Event`]s. The order
//! of that list is significant: it is the order in which text appears and in which drawing
//! commands are replayed, and later paint-state changes depend on earlier ones.
//!
//! On the wire, events are a JSON array of records tagged by a `"type"` string. Drawing
//! commands are namespaced as `turtle.<op>` and `canvas.<op>`. See [`decode_events`] and
//! [`encode_events`].

use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};

mod color;
mod input;
mod wire;

pub use color::{Color, Rgba8};
pub use input::{InputValue, Interaction};
pub use wire::{decode_events, decode_record, encode_events};

/// One record in the output of a run.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A compiler diagnostic. A stream that starts with one of these contains nothing else.
    CompileError { line: u32, message: String },
    RuntimeError { message: String },
    /// The run was cut off by the wall-clock limit. Always the last event of its stream.
    Timeout,
    Print { value: String },
    /// Some other record that carries a textual value. `kind` is its original tag.
    Message { kind: String, value: String },
    Turtle(TurtleCmd),
    Canvas(CanvasCmd),
}

impl Event {
    /// The tag this event has on the wire.
    pub fn tag(&self) -> &str {
        match self {
            Event::CompileError { .. } => "compile error",
            Event::RuntimeError { .. } => "runtime error",
            Event::Timeout => "timeout",
            Event::Print { .. } => "print",
            Event::Message { kind, .. } => kind,
            Event::Turtle(cmd) => cmd.tag(),
            Event::Canvas(cmd) => cmd.tag(),
        }
    }

    pub fn print(value: impl Into<String>) -> Event {
        Event::Print {
            value: value.into(),
        }
    }
}

impl From<TurtleCmd> for Event {
    fn from(cmd: TurtleCmd) -> Self {
        Event::Turtle(cmd)
    }
}

impl From<CanvasCmd> for Event {
    fn from(cmd: CanvasCmd) -> Self {
        Event::Canvas(cmd)
    }
}

/// A turtle drawing command.
///
/// Coordinates are turtle-local: the origin is the center of the surface and the y axis
/// points up.
#[derive(Clone, Debug, PartialEq)]
pub enum TurtleCmd {
    Line { from: Point, to: Point, color: Color },
}

impl TurtleCmd {
    pub fn tag(&self) -> &'static str {
        match self {
            TurtleCmd::Line { .. } => "turtle.line",
        }
    }
}

/// A canvas drawing command, in surface pixel coordinates (origin top-left, y down) as
/// modified by the current transform.
#[derive(Clone, Debug, PartialEq)]
pub enum CanvasCmd {
    Clear,
    /// A filled rectangle spanned by two opposite corners.
    FillRect { corners: [Point; 2] },
    /// A stroked rectangle spanned by two opposite corners.
    FrameRect { corners: [Point; 2] },
    /// A filled ellipse. The radii are squared; take the square root before drawing.
    FillEllipse { center: Point, radii_sq: Vec2 },
    /// A stroked ellipse. The radii are squared; take the square root before drawing.
    StrokeEllipse { center: Point, radii_sq: Vec2 },
    Line { from: Point, to: Point },
    Text { text: String, position: Point },
    SetLineColor(Color),
    SetFillColor(Color),
    SetPixel { x: f64, y: f64, rgba: Rgba8 },
    SetOpacity(f64),
    SetFont(String),
    SetTextAlign(TextAlign),
    /// Post-multiply the current transform.
    Transform(Affine),
    ResetTransform,
}

impl CanvasCmd {
    pub fn tag(&self) -> &'static str {
        match self {
            CanvasCmd::Clear => "canvas.clear",
            CanvasCmd::FillRect { .. } => "canvas.fill",
            CanvasCmd::FrameRect { .. } => "canvas.frame",
            CanvasCmd::FillEllipse { .. } => "canvas.ellipseFill",
            CanvasCmd::StrokeEllipse { .. } => "canvas.ellipseCurve",
            CanvasCmd::Line { .. } => "canvas.line",
            CanvasCmd::Text { .. } => "canvas.text",
            CanvasCmd::SetLineColor(_) => "canvas.setLineColor",
            CanvasCmd::SetFillColor(_) => "canvas.setFillColor",
            CanvasCmd::SetPixel { .. } => "canvas.setPixel",
            CanvasCmd::SetOpacity(_) => "canvas.setOpacity",
            CanvasCmd::SetFont(_) => "canvas.setFont",
            CanvasCmd::SetTextAlign(_) => "canvas.setTextAlign",
            CanvasCmd::Transform(_) => "canvas.transform",
            CanvasCmd::ResetTransform => "canvas.resetTransform",
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    #[serde(alias = "start")]
    Left,
    Center,
    #[serde(alias = "end")]
    Right,
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected an array of event records")]
    NotAnArray,
    #[error("event record has no \"type\" tag")]
    MissingType,
    #[error("malformed {tag} event: {reason}")]
    Malformed { tag: String, reason: String },
    #[error("invalid color {0:?}")]
    BadColor(String),
}
