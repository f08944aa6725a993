use kurbo::{Affine, Line, Shape};
use sketchpad_events::TurtleCmd;

use crate::{canvas::TOLERANCE, Paint, Surface};

/// The map from turtle coordinates to surface coordinates: the turtle's origin goes to the
/// center of the surface, and its y axis (which points up) is flipped to point down.
pub fn turtle_to_surface<S: Surface + ?Sized>(surface: &S) -> Affine {
    let center = (
        f64::from(surface.width()) / 2.0,
        f64::from(surface.height()) / 2.0,
    );
    Affine::translate(center) * Affine::FLIP_Y
}

/// Draw one turtle command. Unlike canvas commands, turtle commands carry their own color,
/// so there is no state to thread through.
pub fn apply_turtle<S: Surface + ?Sized>(surface: &mut S, cmd: &TurtleCmd) {
    match cmd {
        TurtleCmd::Line { from, to, color } => {
            let path = turtle_to_surface(surface) * Line::new(*from, *to).to_path(TOLERANCE);
            surface.stroke(&path, Paint::solid(color.to_rgba8()));
        }
    }
}
