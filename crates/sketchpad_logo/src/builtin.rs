/// What a primitive accepts in each input slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Param {
    Num,
    Word,
    /// A number or a word.
    Any,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Builtin {
    Forward,
    Back,
    Left,
    Right,
    PenUp,
    PenDown,
    Home,
    SetColor,
    Arc,
    Wait,
    Print,
    Error,
    Clear,
    SetFillColor,
    SetLineColor,
    SetOpacity,
    SetFont,
    SetTextAlign,
    FillRect,
    FrameRect,
    FillCircle,
    FrameCircle,
    Line,
    Text,
    SetPixel,
}

use Param::*;

impl Builtin {
    pub fn lookup(name: &str) -> Option<Builtin> {
        Some(match name {
            "fd" | "forward" => Builtin::Forward,
            "bk" | "back" | "backward" => Builtin::Back,
            "lt" | "left" => Builtin::Left,
            "rt" | "right" => Builtin::Right,
            "pu" | "penup" => Builtin::PenUp,
            "pd" | "pendown" => Builtin::PenDown,
            "home" => Builtin::Home,
            "setcolor" | "setpencolor" => Builtin::SetColor,
            "arc" => Builtin::Arc,
            "wait" => Builtin::Wait,
            "print" | "pr" => Builtin::Print,
            "error" => Builtin::Error,
            "clear" | "cs" | "clearscreen" => Builtin::Clear,
            "setfillcolor" => Builtin::SetFillColor,
            "setlinecolor" => Builtin::SetLineColor,
            "setopacity" => Builtin::SetOpacity,
            "setfont" => Builtin::SetFont,
            "settextalign" => Builtin::SetTextAlign,
            "fillrect" => Builtin::FillRect,
            "framerect" => Builtin::FrameRect,
            "fillcircle" => Builtin::FillCircle,
            "framecircle" => Builtin::FrameCircle,
            "line" => Builtin::Line,
            "text" => Builtin::Text,
            "setpixel" => Builtin::SetPixel,
            _ => return None,
        })
    }

    /// The canonical name, for error messages.
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Forward => "forward",
            Builtin::Back => "back",
            Builtin::Left => "left",
            Builtin::Right => "right",
            Builtin::PenUp => "penup",
            Builtin::PenDown => "pendown",
            Builtin::Home => "home",
            Builtin::SetColor => "setcolor",
            Builtin::Arc => "arc",
            Builtin::Wait => "wait",
            Builtin::Print => "print",
            Builtin::Error => "error",
            Builtin::Clear => "clear",
            Builtin::SetFillColor => "setfillcolor",
            Builtin::SetLineColor => "setlinecolor",
            Builtin::SetOpacity => "setopacity",
            Builtin::SetFont => "setfont",
            Builtin::SetTextAlign => "settextalign",
            Builtin::FillRect => "fillrect",
            Builtin::FrameRect => "framerect",
            Builtin::FillCircle => "fillcircle",
            Builtin::FrameCircle => "framecircle",
            Builtin::Line => "line",
            Builtin::Text => "text",
            Builtin::SetPixel => "setpixel",
        }
    }

    pub fn params(self) -> &'static [Param] {
        match self {
            Builtin::PenUp | Builtin::PenDown | Builtin::Home | Builtin::Wait | Builtin::Clear => {
                &[]
            }
            Builtin::Forward
            | Builtin::Back
            | Builtin::Left
            | Builtin::Right
            | Builtin::SetOpacity => &[Num],
            Builtin::Print | Builtin::Error => &[Any],
            Builtin::SetFont | Builtin::SetTextAlign => &[Word],
            Builtin::Arc => &[Num, Num],
            Builtin::SetColor | Builtin::FillCircle | Builtin::FrameCircle => &[Num, Num, Num],
            Builtin::Text => &[Num, Num, Any],
            Builtin::SetFillColor
            | Builtin::SetLineColor
            | Builtin::FillRect
            | Builtin::FrameRect
            | Builtin::Line => &[Num, Num, Num, Num],
            Builtin::SetPixel => &[Num, Num, Num, Num, Num, Num],
        }
    }
}
