use kurbo::{Affine, Point, Vec2};
use serde::{ser::SerializeMap, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::{
    color::opaque, CanvasCmd, Color, Event, ProtocolError, Rgba8, TextAlign, TurtleCmd,
};

/// The JSON shape of an event record.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum WireEvent {
    #[serde(rename = "compile error")]
    CompileError { line: u32, message: String },
    #[serde(rename = "runtime error")]
    RuntimeError { message: String },
    #[serde(rename = "timeout")]
    Timeout,
    #[serde(rename = "print")]
    Print { value: Value },
    #[serde(rename = "turtle.line")]
    TurtleLine {
        from: [f64; 2],
        to: [f64; 2],
        color: WireColor,
    },
    #[serde(rename = "canvas.clear")]
    CanvasClear,
    #[serde(rename = "canvas.fill")]
    CanvasFill { points: [[f64; 2]; 2] },
    #[serde(rename = "canvas.frame")]
    CanvasFrame { points: [[f64; 2]; 2] },
    #[serde(rename = "canvas.ellipseFill")]
    CanvasEllipseFill { center: [f64; 2], shape: Vec<Vec<f64>> },
    #[serde(rename = "canvas.ellipseCurve")]
    CanvasEllipseCurve { center: [f64; 2], shape: Vec<Vec<f64>> },
    #[serde(rename = "canvas.line")]
    CanvasLine { from: [f64; 2], to: [f64; 2] },
    #[serde(rename = "canvas.text")]
    CanvasText {
        #[serde(rename = "str")]
        text: String,
        position: [f64; 2],
    },
    #[serde(rename = "canvas.setLineColor")]
    CanvasSetLineColor {
        r: f64,
        g: f64,
        b: f64,
        #[serde(default = "opaque")]
        a: f64,
    },
    #[serde(rename = "canvas.setFillColor")]
    CanvasSetFillColor {
        r: f64,
        g: f64,
        b: f64,
        #[serde(default = "opaque")]
        a: f64,
    },
    #[serde(rename = "canvas.setPixel")]
    CanvasSetPixel { x: f64, y: f64, rgba: Rgba8 },
    #[serde(rename = "canvas.setOpacity")]
    CanvasSetOpacity { alpha: f64 },
    #[serde(rename = "canvas.setFont")]
    CanvasSetFont { font: String },
    #[serde(rename = "canvas.setTextAlign")]
    CanvasSetTextAlign { align: TextAlign },
    #[serde(rename = "canvas.transform")]
    CanvasTransform { matrix: [f64; 6] },
    #[serde(rename = "canvas.resetTransform")]
    CanvasResetTransform,
}

/// Turtle colors arrive either as normalized channels or as a hex string.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum WireColor {
    Channels(Color),
    Hex(String),
}

const FIXED_TAGS: &[&str] = &["compile error", "runtime error", "timeout", "print"];

/// Bring a tag into its canonical form.
///
/// Older producers separate the namespace with a space and spell multi-word operations
/// with spaces (`"canvas ellipse fill"`); those become `"canvas.ellipseFill"`. Timeout
/// records sometimes carry an explanation in their tag.
fn canonical_tag(tag: &str) -> String {
    if tag.starts_with("timeout") {
        return "timeout".to_owned();
    }
    for ns in ["turtle", "canvas"] {
        if let Some(rest) = tag.strip_prefix(ns).and_then(|r| r.strip_prefix(' ')) {
            let mut op = String::new();
            for (i, word) in rest.split_whitespace().enumerate() {
                let mut chars = word.chars();
                if let Some(first) = chars.next() {
                    if i == 0 {
                        op.push(first);
                    } else {
                        op.extend(first.to_uppercase());
                    }
                    op.push_str(chars.as_str());
                }
            }
            return format!("{ns}.{op}");
        }
    }
    tag.to_owned()
}

fn is_strict(tag: &str) -> bool {
    FIXED_TAGS.contains(&tag) || tag.starts_with("turtle.") || tag.starts_with("canvas.")
}

fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn malformed(tag: &str, reason: impl Into<String>) -> ProtocolError {
    ProtocolError::Malformed {
        tag: tag.to_owned(),
        reason: reason.into(),
    }
}

fn point(tag: &str, [x, y]: [f64; 2]) -> Result<Point, ProtocolError> {
    if x.is_finite() && y.is_finite() {
        Ok(Point::new(x, y))
    } else {
        Err(malformed(tag, format!("non-finite coordinate ({x}, {y})")))
    }
}

fn radii_sq(tag: &str, shape: &[Vec<f64>]) -> Result<Vec2, ProtocolError> {
    let (x, y) = match shape.first().map(Vec::as_slice) {
        Some([r]) => (*r, *r),
        Some([x, y, ..]) => (*x, *y),
        _ => return Err(malformed(tag, "missing shape")),
    };
    if !(x.is_finite() && y.is_finite()) || x < 0.0 || y < 0.0 {
        return Err(malformed(tag, format!("bad squared radii ({x}, {y})")));
    }
    Ok(Vec2::new(x, y))
}

fn corners(tag: &str, [p, q]: [[f64; 2]; 2]) -> Result<[Point; 2], ProtocolError> {
    Ok([point(tag, p)?, point(tag, q)?])
}

impl TryFrom<WireEvent> for Event {
    type Error = ProtocolError;

    fn try_from(w: WireEvent) -> Result<Self, ProtocolError> {
        use CanvasCmd as C;

        let canvas = |cmd: CanvasCmd| -> Result<Event, ProtocolError> { Ok(Event::Canvas(cmd)) };
        match w {
            WireEvent::CompileError { line, message } => Ok(Event::CompileError { line, message }),
            WireEvent::RuntimeError { message } => Ok(Event::RuntimeError { message }),
            WireEvent::Timeout => Ok(Event::Timeout),
            WireEvent::Print { value } => Ok(Event::Print {
                value: display_value(&value),
            }),
            WireEvent::TurtleLine { from, to, color } => {
                let tag = "turtle.line";
                let color = match color {
                    WireColor::Channels(c) => c,
                    WireColor::Hex(s) => Rgba8::from_hex(&s)?.into(),
                };
                Ok(Event::Turtle(TurtleCmd::Line {
                    from: point(tag, from)?,
                    to: point(tag, to)?,
                    color,
                }))
            }
            WireEvent::CanvasClear => canvas(C::Clear),
            WireEvent::CanvasFill { points } => canvas(C::FillRect {
                corners: corners("canvas.fill", points)?,
            }),
            WireEvent::CanvasFrame { points } => canvas(C::FrameRect {
                corners: corners("canvas.frame", points)?,
            }),
            WireEvent::CanvasEllipseFill { center, shape } => {
                let tag = "canvas.ellipseFill";
                canvas(C::FillEllipse {
                    center: point(tag, center)?,
                    radii_sq: radii_sq(tag, &shape)?,
                })
            }
            WireEvent::CanvasEllipseCurve { center, shape } => {
                let tag = "canvas.ellipseCurve";
                canvas(C::StrokeEllipse {
                    center: point(tag, center)?,
                    radii_sq: radii_sq(tag, &shape)?,
                })
            }
            WireEvent::CanvasLine { from, to } => canvas(C::Line {
                from: point("canvas.line", from)?,
                to: point("canvas.line", to)?,
            }),
            WireEvent::CanvasText { text, position } => canvas(C::Text {
                text,
                position: point("canvas.text", position)?,
            }),
            WireEvent::CanvasSetLineColor { r, g, b, a } => {
                canvas(C::SetLineColor(Color::rgba(r, g, b, a)))
            }
            WireEvent::CanvasSetFillColor { r, g, b, a } => {
                canvas(C::SetFillColor(Color::rgba(r, g, b, a)))
            }
            WireEvent::CanvasSetPixel { x, y, rgba } => {
                let p = point("canvas.setPixel", [x, y])?;
                canvas(C::SetPixel { x: p.x, y: p.y, rgba })
            }
            WireEvent::CanvasSetOpacity { alpha } => {
                if alpha.is_nan() {
                    return Err(malformed("canvas.setOpacity", "alpha is NaN"));
                }
                canvas(C::SetOpacity(alpha))
            }
            WireEvent::CanvasSetFont { font } => canvas(C::SetFont(font)),
            WireEvent::CanvasSetTextAlign { align } => canvas(C::SetTextAlign(align)),
            WireEvent::CanvasTransform { matrix } => {
                if matrix.iter().any(|x| !x.is_finite()) {
                    return Err(malformed("canvas.transform", "non-finite matrix"));
                }
                canvas(C::Transform(Affine::new(matrix)))
            }
            WireEvent::CanvasResetTransform => canvas(C::ResetTransform),
        }
    }
}

impl Event {
    /// The wire form of this event, or `None` for [`Event::Message`], whose tag is dynamic.
    fn to_wire(&self) -> Option<WireEvent> {
        let xy = |p: &Point| [p.x, p.y];
        let shape = |r: &Vec2| vec![vec![r.x, r.y]];
        Some(match self {
            Event::CompileError { line, message } => WireEvent::CompileError {
                line: *line,
                message: message.clone(),
            },
            Event::RuntimeError { message } => WireEvent::RuntimeError {
                message: message.clone(),
            },
            Event::Timeout => WireEvent::Timeout,
            Event::Print { value } => WireEvent::Print {
                value: Value::String(value.clone()),
            },
            Event::Message { .. } => return None,
            Event::Turtle(TurtleCmd::Line { from, to, color }) => WireEvent::TurtleLine {
                from: xy(from),
                to: xy(to),
                color: WireColor::Channels(*color),
            },
            Event::Canvas(cmd) => match cmd {
                CanvasCmd::Clear => WireEvent::CanvasClear,
                CanvasCmd::FillRect { corners: [p, q] } => WireEvent::CanvasFill {
                    points: [xy(p), xy(q)],
                },
                CanvasCmd::FrameRect { corners: [p, q] } => WireEvent::CanvasFrame {
                    points: [xy(p), xy(q)],
                },
                CanvasCmd::FillEllipse { center, radii_sq } => WireEvent::CanvasEllipseFill {
                    center: xy(center),
                    shape: shape(radii_sq),
                },
                CanvasCmd::StrokeEllipse { center, radii_sq } => WireEvent::CanvasEllipseCurve {
                    center: xy(center),
                    shape: shape(radii_sq),
                },
                CanvasCmd::Line { from, to } => WireEvent::CanvasLine {
                    from: xy(from),
                    to: xy(to),
                },
                CanvasCmd::Text { text, position } => WireEvent::CanvasText {
                    text: text.clone(),
                    position: xy(position),
                },
                CanvasCmd::SetLineColor(c) => WireEvent::CanvasSetLineColor {
                    r: c.r,
                    g: c.g,
                    b: c.b,
                    a: c.a,
                },
                CanvasCmd::SetFillColor(c) => WireEvent::CanvasSetFillColor {
                    r: c.r,
                    g: c.g,
                    b: c.b,
                    a: c.a,
                },
                CanvasCmd::SetPixel { x, y, rgba } => WireEvent::CanvasSetPixel {
                    x: *x,
                    y: *y,
                    rgba: *rgba,
                },
                CanvasCmd::SetOpacity(alpha) => WireEvent::CanvasSetOpacity { alpha: *alpha },
                CanvasCmd::SetFont(font) => WireEvent::CanvasSetFont { font: font.clone() },
                CanvasCmd::SetTextAlign(align) => WireEvent::CanvasSetTextAlign { align: *align },
                CanvasCmd::Transform(affine) => WireEvent::CanvasTransform {
                    matrix: affine.as_coeffs(),
                },
                CanvasCmd::ResetTransform => WireEvent::CanvasResetTransform,
            },
        })
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let Event::Message { kind, value } = self {
            let mut map = serializer.serialize_map(Some(2))?;
            map.serialize_entry("type", kind)?;
            map.serialize_entry("value", value)?;
            return map.end();
        }
        match self.to_wire() {
            Some(wire) => wire.serialize(serializer),
            None => Err(serde::ser::Error::custom("event has no wire form")),
        }
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = Value::deserialize(deserializer)?;
        match decode_record(record) {
            Ok(Some(ev)) => Ok(ev),
            Ok(None) => Err(serde::de::Error::custom("record carries no event")),
            Err(e) => Err(serde::de::Error::custom(e)),
        }
    }
}

/// Decode a single record.
///
/// Records with an unknown tag are not an error: if they carry a `value` they become
/// [`Event::Message`], and otherwise they are ignored (`Ok(None)`). Records with a known tag
/// (including anything in the `turtle.` or `canvas.` namespaces) must be well-formed.
pub fn decode_record(mut record: Value) -> Result<Option<Event>, ProtocolError> {
    let tag = record
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?
        .to_owned();
    let canonical = canonical_tag(&tag);

    if !is_strict(&canonical) {
        return Ok(record.get("value").map(|v| Event::Message {
            kind: tag,
            value: display_value(v),
        }));
    }

    if let Some(obj) = record.as_object_mut() {
        obj.insert("type".to_owned(), Value::String(canonical.clone()));
    }
    let wire: WireEvent =
        serde_json::from_value(record).map_err(|e| malformed(&canonical, e.to_string()))?;
    Event::try_from(wire).map(Some)
}

/// Decode a JSON array of event records.
///
/// Only a top-level problem (invalid JSON, or something other than an array) is an error.
/// Individual records that are malformed are dropped with a warning, since they point at a
/// mismatch between producer and consumer rather than at a bug in the user's script.
pub fn decode_events(json: &str) -> Result<Vec<Event>, ProtocolError> {
    let Value::Array(records) = serde_json::from_str(json)? else {
        return Err(ProtocolError::NotAnArray);
    };

    let mut events = Vec::with_capacity(records.len());
    for (i, record) in records.into_iter().enumerate() {
        match decode_record(record) {
            Ok(Some(ev)) => events.push(ev),
            Ok(None) => log::debug!("ignoring record {i}: no renderable content"),
            Err(e) => log::warn!("skipping record {i}: {e}"),
        }
    }
    Ok(events)
}

pub fn encode_events(events: &[Event]) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(events)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(v: Value) -> Vec<Event> {
        decode_events(&v.to_string()).unwrap()
    }

    #[test]
    fn legacy_tags() {
        assert_eq!(canonical_tag("canvas ellipse fill"), "canvas.ellipseFill");
        assert_eq!(canonical_tag("canvas fill"), "canvas.fill");
        assert_eq!(canonical_tag("turtle line"), "turtle.line");
        assert_eq!(
            canonical_tag("timeout - program execution took too long"),
            "timeout"
        );
        assert_eq!(canonical_tag("canvas.setPixel"), "canvas.setPixel");
        assert_eq!(canonical_tag("print"), "print");
    }

    #[test]
    fn decodes_canvas_records() {
        let events = decode(json!([
            {"type": "canvas setFillColor", "r": 1, "g": 0, "b": 0},
            {"type": "canvas.fill", "points": [[1, 2], [3, 4]]},
            {"type": "canvas ellipse curve", "center": [5, 5], "shape": [[4, 9]]},
            {"type": "canvas.ellipseFill", "center": [5, 5], "shape": [[16]]},
        ]));
        assert_eq!(
            events,
            vec![
                Event::Canvas(CanvasCmd::SetFillColor(Color::rgb(1.0, 0.0, 0.0))),
                Event::Canvas(CanvasCmd::FillRect {
                    corners: [Point::new(1.0, 2.0), Point::new(3.0, 4.0)]
                }),
                Event::Canvas(CanvasCmd::StrokeEllipse {
                    center: Point::new(5.0, 5.0),
                    radii_sq: Vec2::new(4.0, 9.0)
                }),
                Event::Canvas(CanvasCmd::FillEllipse {
                    center: Point::new(5.0, 5.0),
                    radii_sq: Vec2::new(16.0, 16.0)
                }),
            ]
        );
    }

    #[test]
    fn malformed_records_are_skipped() {
        let events = decode(json!([
            {"type": "print", "value": "a"},
            {"type": "canvas.fill", "points": [[1, 2]]},
            {"type": "canvas.ellipseFill", "center": [0, 0], "shape": [[-1]]},
            {"type": "canvas.frobnicate"},
            {"value": "no tag"},
            {"type": "print", "value": "b"},
        ]));
        assert_eq!(events, vec![Event::print("a"), Event::print("b")]);
    }

    #[test]
    fn unknown_tags_with_values_become_messages() {
        let events = decode(json!([
            {"type": "warning", "value": "careful"},
            {"type": "mystery"},
            {"type": "print", "value": 42},
        ]));
        assert_eq!(
            events,
            vec![
                Event::Message {
                    kind: "warning".into(),
                    value: "careful".into()
                },
                Event::print("42"),
            ]
        );
    }

    #[test]
    fn turtle_hex_colors() {
        let events = decode(json!([
            {"type": "turtle line", "from": [0, 0], "to": [10, 0], "color": "#ff0000"},
        ]));
        assert_eq!(
            events,
            vec![Event::Turtle(TurtleCmd::Line {
                from: Point::ORIGIN,
                to: Point::new(10.0, 0.0),
                color: Color::rgb(1.0, 0.0, 0.0),
            })]
        );
    }

    #[test]
    fn top_level_must_be_an_array() {
        assert!(matches!(
            decode_events("{\"type\": \"print\"}"),
            Err(ProtocolError::NotAnArray)
        ));
        assert!(matches!(decode_events("[1, "), Err(ProtocolError::Json(_))));
    }

    #[test]
    fn encoded_events_decode_to_themselves() {
        let events = vec![
            Event::CompileError {
                line: 3,
                message: "oops".into(),
            },
            Event::print("hello"),
            Event::Message {
                kind: "note".into(),
                value: "v".into(),
            },
            Event::Canvas(CanvasCmd::SetPixel {
                x: 1.0,
                y: 2.0,
                rgba: Rgba8::new(1, 2, 3, 4),
            }),
            Event::Canvas(CanvasCmd::SetTextAlign(TextAlign::Center)),
            Event::Canvas(CanvasCmd::Transform(Affine::translate((3.0, 4.0)))),
            Event::Timeout,
        ];
        let json = encode_events(&events).unwrap();
        assert_eq!(decode_events(&json).unwrap(), events);

        let v: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v[3]["type"], "canvas.setPixel");
        assert_eq!(v[3]["rgba"], json!([1, 2, 3, 4]));
        assert_eq!(v[6], json!({"type": "timeout"}));
    }
}
