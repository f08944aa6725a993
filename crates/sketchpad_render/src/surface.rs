use std::{cell::RefCell, rc::Rc};

use kurbo::{BezPath, Point};
use sketchpad_events::{Rgba8, TextAlign};

/// How to paint a shape: a color, and a global opacity that multiplies the color's own alpha.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Paint {
    pub color: Rgba8,
    pub alpha: f64,
}

impl Paint {
    pub fn solid(color: Rgba8) -> Paint {
        Paint { color, alpha: 1.0 }
    }
}

/// A piece of text drawn at a point. `origin` is already in surface coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub origin: Point,
    pub font: String,
    pub align: TextAlign,
    pub paint: Paint,
}

/// Something that can be drawn on.
///
/// All geometry is given in surface pixel coordinates: the caller has already applied any
/// transform. Strokes are one pixel wide.
pub trait Surface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Erase everything, including any recorded text.
    fn clear(&mut self);
    fn fill(&mut self, path: &BezPath, paint: Paint);
    fn stroke(&mut self, path: &BezPath, paint: Paint);
    fn fill_text(&mut self, run: TextRun);
}

/// A surface shared between the host and an interpreter that wants to know about it.
pub type SurfaceHandle = Rc<RefCell<dyn Surface>>;
