//! Drawing the output of a sketchpad run.
//!
//! Turtle and canvas commands are replayed onto anything implementing [`Surface`];
//! [`Raster`] is the in-memory one. [`format_output`] ties it together: it takes the JSON
//! event list produced by a run, draws what needs drawing and returns the text.

mod canvas;
mod format;
mod raster;
mod surface;
mod turtle;

pub use canvas::{apply_canvas, DrawingState, DEFAULT_FONT};
pub use format::{format_events, format_output, FormattedOutput, OutputKind};
pub use raster::Raster;
pub use surface::{Paint, Surface, SurfaceHandle, TextRun};
pub use turtle::{apply_turtle, turtle_to_surface};
