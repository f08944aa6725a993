use kurbo::{Point, Vec2};
use sketchpad_events::{Color, TurtleCmd};

// Arcs are drawn as polylines with segments of at most this many degrees.
const ARC_STEP: f64 = 10.0;

/// Round away floating point noise, so that e.g. moving straight up stays on the y axis.
fn snap(p: Point) -> Point {
    let s = |x: f64| {
        let r = (x * 1e9).round() / 1e9 + 0.0;
        if r.is_finite() {
            r
        } else {
            x
        }
    };
    Point::new(s(p.x), s(p.y))
}

#[derive(Clone, Debug, PartialEq)]
pub struct Turtle {
    pub pos: Point,
    /// In degrees, counter-clockwise from the positive x axis.
    pub heading: f64,
    pub pen_down: bool,
    pub color: Color,
}

impl Default for Turtle {
    fn default() -> Self {
        Turtle {
            pos: Point::ORIGIN,
            heading: 90.0,
            pen_down: true,
            color: Color::BLACK,
        }
    }
}

impl Turtle {
    fn direction(&self, heading: f64) -> Vec2 {
        Vec2::from_angle(heading.to_radians())
    }

    fn move_to(&mut self, to: Point) -> Option<TurtleCmd> {
        let from = std::mem::replace(&mut self.pos, to);
        self.pen_down.then_some(TurtleCmd::Line {
            from,
            to,
            color: self.color,
        })
    }

    pub fn forward(&mut self, dist: f64) -> Option<TurtleCmd> {
        let to = snap(self.pos + self.direction(self.heading) * dist);
        self.move_to(to)
    }

    pub fn back(&mut self, dist: f64) -> Option<TurtleCmd> {
        self.forward(-dist)
    }

    pub fn left(&mut self, degrees: f64) {
        self.heading = (self.heading + degrees).rem_euclid(360.0);
    }

    pub fn right(&mut self, degrees: f64) {
        self.left(-degrees);
    }

    /// Go back to the origin, facing up.
    pub fn home(&mut self) -> Option<TurtleCmd> {
        self.heading = 90.0;
        self.move_to(Point::ORIGIN)
    }

    /// Draw a clockwise arc around the turtle, starting straight ahead of it. The turtle
    /// itself doesn't move.
    pub fn arc(&self, degrees: f64, radius: f64) -> Vec<TurtleCmd> {
        if !self.pen_down {
            return Vec::new();
        }
        let degrees = degrees.clamp(-360.0, 360.0);
        let point = |a: f64| snap(self.pos + self.direction(self.heading - a) * radius);
        let steps = (degrees.abs() / ARC_STEP).ceil() as usize;
        let mut prev = point(0.0);
        (1..=steps)
            .map(|i| {
                let next = point(degrees * i as f64 / steps as f64);
                let from = std::mem::replace(&mut prev, next);
                TurtleCmd::Line {
                    from,
                    to: next,
                    color: self.color,
                }
            })
            .collect()
    }
}
