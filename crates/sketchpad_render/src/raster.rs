use std::collections::BTreeSet;

use image::{Rgba, RgbaImage};
use kurbo::{BezPath, CubicBez, ParamCurve, PathEl, Point, QuadBez, Rect, Shape};
use sketchpad_events::Rgba8;

use crate::{Paint, Surface, TextRun};

// Upper bound on the samples taken along one segment, so that absurd coordinates can't
// stall a render.
const MAX_STEPS: f64 = 65536.0;

fn to_image(c: Rgba8) -> Rgba<u8> {
    Rgba([c.r, c.g, c.b, c.a])
}

fn from_image(Rgba([r, g, b, a]): Rgba<u8>) -> Rgba8 {
    Rgba8::new(r, g, b, a)
}

/// An in-memory RGBA surface.
///
/// Coverage is aliased: a pixel is filled if its center is inside the shape, and a stroke
/// touches every pixel its centerline passes through. Colors are blended source-over.
/// There is no font rasterizer, so text is recorded as [`TextRun`]s instead of pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct Raster {
    image: RgbaImage,
    text: Vec<TextRun>,
}

impl Raster {
    pub fn new(width: u32, height: u32) -> Raster {
        Raster {
            image: RgbaImage::new(width, height),
            text: Vec::new(),
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba8> {
        self.image.get_pixel_checked(x, y).copied().map(from_image)
    }

    /// The pixels drawn so far, with straight alpha. Use `save` on it to write an image file.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn text_runs(&self) -> &[TextRun] {
        &self.text
    }

    /// The integer pixel range covered by `r`, clipped to the surface.
    fn clip(&self, r: Rect) -> Option<(i64, i64, i64, i64)> {
        if ![r.x0, r.y0, r.x1, r.y1].iter().all(|v| v.is_finite()) {
            return None;
        }
        let x0 = r.x0.floor().max(0.0) as i64;
        let y0 = r.y0.floor().max(0.0) as i64;
        let x1 = r.x1.ceil().min(f64::from(self.image.width())) as i64;
        let y1 = r.y1.ceil().min(f64::from(self.image.height())) as i64;
        (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
    }

    fn blend_at(&mut self, x: i64, y: i64, paint: Paint) {
        let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
            return;
        };
        if let Some(px) = self.image.get_pixel_mut_checked(x, y) {
            *px = to_image(blend(from_image(*px), paint));
        }
    }
}

/// Source-over compositing of straight-alpha colors.
fn blend(dst: Rgba8, paint: Paint) -> Rgba8 {
    let src = paint.color;
    let sa = f64::from(src.a) / 255.0 * paint.alpha.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return dst;
    }
    let da = f64::from(dst.a) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    let mix = |s: u8, d: u8| {
        ((f64::from(s) * sa + f64::from(d) * da * (1.0 - sa)) / out_a).round() as u8
    };
    Rgba8 {
        r: mix(src.r, dst.r),
        g: mix(src.g, dst.g),
        b: mix(src.b, dst.b),
        a: (out_a * 255.0).round() as u8,
    }
}

fn plot_segment(a: Point, b: Point, covered: &mut BTreeSet<(i64, i64)>) {
    let d = b - a;
    let steps = d.x.abs().max(d.y.abs()).ceil().clamp(1.0, MAX_STEPS) as usize;
    for i in 0..=steps {
        let p = a.lerp(b, i as f64 / steps as f64);
        covered.insert((p.x.floor() as i64, p.y.floor() as i64));
    }
}

/// Approximate a curve by a polyline. `hull_len` (the length of the control polygon) bounds
/// the curve's length and decides how finely to sample it.
fn plot_curve(
    curve: impl Fn(f64) -> Point,
    hull_len: f64,
    covered: &mut BTreeSet<(i64, i64)>,
) {
    let n = (hull_len / 2.0).ceil().clamp(4.0, 256.0) as usize;
    let mut prev = curve(0.0);
    for i in 1..=n {
        let next = curve(i as f64 / n as f64);
        plot_segment(prev, next, covered);
        prev = next;
    }
}

fn hull_len(points: &[Point]) -> f64 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

impl Surface for Raster {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn clear(&mut self) {
        for px in self.image.pixels_mut() {
            *px = to_image(Rgba8::TRANSPARENT);
        }
        self.text.clear();
    }

    fn fill(&mut self, path: &BezPath, paint: Paint) {
        let Some((x0, y0, x1, y1)) = self.clip(path.bounding_box()) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                let center = Point::new(x as f64 + 0.5, y as f64 + 0.5);
                if path.contains(center) {
                    self.blend_at(x, y, paint);
                }
            }
        }
    }

    fn stroke(&mut self, path: &BezPath, paint: Paint) {
        // Collect first, so that pixels shared by adjoining segments are only painted once.
        let mut covered = BTreeSet::new();
        let mut start = Point::ORIGIN;
        let mut last = Point::ORIGIN;
        for el in path.elements() {
            match *el {
                PathEl::MoveTo(p) => {
                    start = p;
                    last = p;
                }
                PathEl::LineTo(p) => {
                    plot_segment(last, p, &mut covered);
                    last = p;
                }
                PathEl::QuadTo(p1, p2) => {
                    let q = QuadBez::new(last, p1, p2);
                    plot_curve(|t| q.eval(t), hull_len(&[last, p1, p2]), &mut covered);
                    last = p2;
                }
                PathEl::CurveTo(p1, p2, p3) => {
                    let c = CubicBez::new(last, p1, p2, p3);
                    plot_curve(|t| c.eval(t), hull_len(&[last, p1, p2, p3]), &mut covered);
                    last = p3;
                }
                PathEl::ClosePath => {
                    plot_segment(last, start, &mut covered);
                    last = start;
                }
            }
        }
        for (x, y) in covered {
            self.blend_at(x, y, paint);
        }
    }

    fn fill_text(&mut self, run: TextRun) {
        log::trace!("text {:?} at {:?}", run.text, run.origin);
        self.text.push(run);
    }
}
