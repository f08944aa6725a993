use kurbo::{Affine, BezPath, Ellipse, Line, Point, Rect, Shape, Vec2};
use sketchpad_events::{CanvasCmd, Rgba8, TextAlign};

use crate::{Paint, Surface, TextRun};

// Flattening tolerance when converting shapes to paths.
pub(crate) const TOLERANCE: f64 = 0.1;

// Ellipses with a larger radius are not drawn. Flattening one costs a number of segments
// that grows with the radius.
const MAX_RADIUS: f64 = 1e6;

pub const DEFAULT_FONT: &str = "16px Helvetica";

/// The paint attributes that canvas commands read and modify.
///
/// A fresh state is used for every render pass: it is never carried from one pass to the
/// next.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawingState {
    pub fill: Rgba8,
    pub stroke: Rgba8,
    /// Global opacity, always in `[0, 1]`.
    pub alpha: f64,
    pub font: String,
    pub align: TextAlign,
    pub transform: Affine,
}

impl Default for DrawingState {
    fn default() -> Self {
        DrawingState {
            fill: Rgba8::BLACK,
            stroke: Rgba8::BLACK,
            alpha: 1.0,
            font: DEFAULT_FONT.to_owned(),
            align: TextAlign::Left,
            transform: Affine::IDENTITY,
        }
    }
}

impl DrawingState {
    fn fill_paint(&self) -> Paint {
        Paint {
            color: self.fill,
            alpha: self.alpha,
        }
    }

    fn stroke_paint(&self) -> Paint {
        Paint {
            color: self.stroke,
            alpha: self.alpha,
        }
    }
}

/// The outline of an ellipse given its squared radii, or `None` if it is too big to draw.
fn ellipse_path(center: Point, radii_sq: Vec2) -> Option<BezPath> {
    let radii = Vec2::new(radii_sq.x.sqrt(), radii_sq.y.sqrt());
    let drawable = |x: f64| x.is_finite() && x <= MAX_RADIUS;
    if !(drawable(radii.x) && drawable(radii.y) && center.x.is_finite() && center.y.is_finite()) {
        log::warn!("skipping ellipse at {center:?} with radii {radii:?}");
        return None;
    }
    Some(Ellipse::new(center, radii, 0.0).to_path(TOLERANCE))
}

/// Apply one canvas command to `surface`.
///
/// Drawing commands use the paint attributes in `state`; setter commands only change
/// `state` and leave no mark.
pub fn apply_canvas<S: Surface + ?Sized>(
    state: &mut DrawingState,
    surface: &mut S,
    cmd: &CanvasCmd,
) {
    log::trace!("{cmd:?}");
    let t = state.transform;
    match cmd {
        CanvasCmd::Clear => surface.clear(),
        CanvasCmd::FillRect { corners: [p, q] } => {
            let path = t * Rect::from_points(*p, *q).to_path(TOLERANCE);
            surface.fill(&path, state.fill_paint());
        }
        CanvasCmd::FrameRect { corners: [p, q] } => {
            let path = t * Rect::from_points(*p, *q).to_path(TOLERANCE);
            surface.stroke(&path, state.stroke_paint());
        }
        CanvasCmd::FillEllipse { center, radii_sq } => {
            if let Some(path) = ellipse_path(*center, *radii_sq) {
                surface.fill(&(t * path), state.fill_paint());
            }
        }
        CanvasCmd::StrokeEllipse { center, radii_sq } => {
            if let Some(path) = ellipse_path(*center, *radii_sq) {
                surface.stroke(&(t * path), state.stroke_paint());
            }
        }
        CanvasCmd::Line { from, to } => {
            let path = t * Line::new(*from, *to).to_path(TOLERANCE);
            surface.stroke(&path, state.stroke_paint());
        }
        CanvasCmd::Text { text, position } => surface.fill_text(TextRun {
            text: text.clone(),
            origin: t * *position,
            font: state.font.clone(),
            align: state.align,
            paint: state.fill_paint(),
        }),
        CanvasCmd::SetLineColor(c) => state.stroke = c.to_rgba8(),
        CanvasCmd::SetFillColor(c) => state.fill = c.to_rgba8(),
        CanvasCmd::SetPixel { x, y, rgba } => {
            let previous = std::mem::replace(&mut state.fill, *rgba);
            let path = t * Rect::new(*x, *y, x + 1.0, y + 1.0).to_path(TOLERANCE);
            surface.fill(&path, state.fill_paint());
            state.fill = previous;
        }
        CanvasCmd::SetOpacity(alpha) => {
            // NaN was rejected when decoding; this only guards the range.
            state.alpha = alpha.clamp(0.0, 1.0);
        }
        CanvasCmd::SetFont(font) => state.font = font.clone(),
        CanvasCmd::SetTextAlign(align) => state.align = *align,
        CanvasCmd::Transform(m) => state.transform = state.transform * *m,
        CanvasCmd::ResetTransform => state.transform = Affine::IDENTITY,
    }
}

#[cfg(test)]
mod tests {
    use sketchpad_events::Color;

    use super::*;
    use crate::Raster;

    const RED: Rgba8 = Rgba8::new(255, 0, 0, 255);

    fn run(cmds: &[CanvasCmd]) -> (DrawingState, Raster) {
        let mut state = DrawingState::default();
        let mut raster = Raster::new(40, 40);
        for cmd in cmds {
            apply_canvas(&mut state, &mut raster, cmd);
        }
        (state, raster)
    }

    fn fill_rect(x0: f64, y0: f64, x1: f64, y1: f64) -> CanvasCmd {
        CanvasCmd::FillRect {
            corners: [Point::new(x0, y0), Point::new(x1, y1)],
        }
    }

    #[test]
    fn fill_color_applies_to_later_rects_only() {
        let red = CanvasCmd::SetFillColor(Color::rgb(1.0, 0.0, 0.0));
        let (_, before) = run(&[red.clone(), fill_rect(0.0, 0.0, 10.0, 10.0)]);
        let (_, after) = run(&[fill_rect(0.0, 0.0, 10.0, 10.0), red]);
        assert_eq!(before.pixel(5, 5), Some(RED));
        assert_eq!(after.pixel(5, 5), Some(Rgba8::BLACK));
    }

    #[test]
    fn corners_in_any_order() {
        let (_, r) = run(&[fill_rect(10.0, 10.0, 0.0, 0.0)]);
        assert_eq!(r.pixel(5, 5), Some(Rgba8::BLACK));
        assert_eq!(r.pixel(10, 10), Some(Rgba8::TRANSPARENT));
    }

    #[test]
    fn set_pixel_restores_fill() {
        let (state, r) = run(&[
            CanvasCmd::SetFillColor(Color::rgb(0.0, 0.0, 1.0)),
            CanvasCmd::SetPixel {
                x: 30.0,
                y: 30.0,
                rgba: RED,
            },
            fill_rect(0.0, 0.0, 10.0, 10.0),
        ]);
        assert_eq!(r.pixel(30, 30), Some(RED));
        assert_eq!(r.pixel(31, 30), Some(Rgba8::TRANSPARENT));
        assert_eq!(r.pixel(5, 5), Some(Rgba8::new(0, 0, 255, 255)));
        assert_eq!(state.fill, Rgba8::new(0, 0, 255, 255));
    }

    #[test]
    fn ellipse_radius_is_squared() {
        // A squared radius of 25 is a radius of 5.
        let (_, r) = run(&[CanvasCmd::FillEllipse {
            center: Point::new(20.0, 20.0),
            radii_sq: Vec2::new(25.0, 25.0),
        }]);
        assert_eq!(r.pixel(23, 20), Some(Rgba8::BLACK));
        assert_eq!(r.pixel(27, 20), Some(Rgba8::TRANSPARENT));
        assert_eq!(r.pixel(20, 12), Some(Rgba8::TRANSPARENT));
    }

    #[test]
    fn huge_ellipses_are_skipped() {
        let (_, r) = run(&[
            CanvasCmd::FillEllipse {
                center: Point::new(20.0, 20.0),
                radii_sq: Vec2::new(1e200, 1e200),
            },
            CanvasCmd::StrokeEllipse {
                center: Point::new(20.0, 20.0),
                radii_sq: Vec2::new(f64::MAX, f64::INFINITY),
            },
            CanvasCmd::FillEllipse {
                center: Point::new(20.0, 20.0),
                radii_sq: Vec2::new(f64::NAN, 25.0),
            },
            fill_rect(0.0, 0.0, 2.0, 2.0),
        ]);
        assert_eq!(r.pixel(20, 20), Some(Rgba8::TRANSPARENT));
        assert_eq!(r.pixel(1, 1), Some(Rgba8::BLACK));
    }

    #[test]
    fn stroked_ellipse_is_hollow() {
        let (_, r) = run(&[CanvasCmd::StrokeEllipse {
            center: Point::new(20.5, 20.5),
            radii_sq: Vec2::new(100.0, 100.0),
        }]);
        assert_eq!(r.pixel(20, 20), Some(Rgba8::TRANSPARENT));
        assert_eq!(r.pixel(30, 20), Some(Rgba8::BLACK));
        assert_eq!(r.pixel(20, 10), Some(Rgba8::BLACK));
    }

    #[test]
    fn opacity_is_clamped_and_used() {
        let (state, r) = run(&[
            CanvasCmd::SetOpacity(7.0),
            fill_rect(0.0, 0.0, 5.0, 5.0),
            CanvasCmd::SetOpacity(0.0),
            fill_rect(10.0, 10.0, 15.0, 15.0),
        ]);
        assert_eq!(state.alpha, 0.0);
        assert_eq!(r.pixel(2, 2), Some(Rgba8::BLACK));
        assert_eq!(r.pixel(12, 12), Some(Rgba8::TRANSPARENT));
    }

    #[test]
    fn text_uses_font_and_alignment() {
        let (_, r) = run(&[
            CanvasCmd::SetFont("12px Courier".into()),
            CanvasCmd::SetTextAlign(TextAlign::Center),
            CanvasCmd::Transform(Affine::translate((5.0, 0.0))),
            CanvasCmd::Text {
                text: "hello".into(),
                position: Point::new(1.0, 2.0),
            },
        ]);
        let run = &r.text_runs()[0];
        assert_eq!(run.text, "hello");
        assert_eq!(run.font, "12px Courier");
        assert_eq!(run.align, TextAlign::Center);
        assert_eq!(run.origin, Point::new(6.0, 2.0));
    }

    #[test]
    fn transforms_compose_and_reset() {
        let (state, r) = run(&[
            CanvasCmd::Transform(Affine::translate((10.0, 0.0))),
            CanvasCmd::Transform(Affine::translate((0.0, 10.0))),
            fill_rect(0.0, 0.0, 2.0, 2.0),
            CanvasCmd::ResetTransform,
        ]);
        assert_eq!(r.pixel(11, 11), Some(Rgba8::BLACK));
        assert_eq!(r.pixel(1, 1), Some(Rgba8::TRANSPARENT));
        assert_eq!(state.transform, Affine::IDENTITY);
    }

    #[test]
    fn line_and_frame_use_stroke_color() {
        let (_, r) = run(&[
            CanvasCmd::SetLineColor(Color::rgb(1.0, 0.0, 0.0)),
            CanvasCmd::SetFillColor(Color::rgb(0.0, 1.0, 0.0)),
            CanvasCmd::Line {
                from: Point::new(0.0, 30.0),
                to: Point::new(39.0, 30.0),
            },
            CanvasCmd::FrameRect {
                corners: [Point::new(5.0, 5.0), Point::new(15.0, 15.0)],
            },
        ]);
        assert_eq!(r.pixel(20, 30), Some(RED));
        assert_eq!(r.pixel(5, 10), Some(RED));
        assert_eq!(r.pixel(10, 10), Some(Rgba8::TRANSPARENT));
    }
}
