//! Terminal highlighting for compiler messages. Colours and text modifiers
//! can be combined with `|` to form a [Decoration].
use std::{fmt, ops::BitOr};

const ESCAPE_RESET: &str = "\u{001b}[0m";

/// Terminal foreground colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colour {
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
}

/// Text effects that can be applied alongside a [Colour].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Bold,
    Underline,
}

/// A [Colour] paired with a [Modifier].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoration {
    pub colour: Colour,
    pub modifier: Modifier,
}

impl BitOr<Modifier> for Colour {
    type Output = Decoration;

    fn bitor(self, modifier: Modifier) -> Self::Output {
        Decoration { colour: self, modifier }
    }
}

impl BitOr<Colour> for Modifier {
    type Output = Decoration;

    fn bitor(self, colour: Colour) -> Self::Output {
        Decoration { colour, modifier: self }
    }
}

/// Anything that knows which ANSI escape sequence turns it on.
pub trait Highlighter {
    fn escape_code(&self) -> &'static str;

    /// Some highlighters are a composition of two escape sequences.
    fn secondary_code(&self) -> &'static str {
        ""
    }
}

impl Highlighter for Colour {
    fn escape_code(&self) -> &'static str {
        match self {
            Colour::Red => "\u{001b}[31;1m",
            Colour::Green => "\u{001b}[32;1m",
            Colour::Yellow => "\u{001b}[33;1m",
            Colour::Blue => "\u{001b}[34;1m",
            Colour::Magenta => "\u{001b}[35;1m",
            Colour::Cyan => "\u{001b}[36;1m",
        }
    }
}

impl Highlighter for Modifier {
    fn escape_code(&self) -> &'static str {
        match self {
            Modifier::Bold => "\u{001b}[1m",
            Modifier::Underline => "\u{001b}[4m",
        }
    }
}

impl Highlighter for Decoration {
    fn escape_code(&self) -> &'static str {
        self.colour.escape_code()
    }

    fn secondary_code(&self) -> &'static str {
        self.modifier.escape_code()
    }
}

/// A message wrapped in a highlighter, the escape sequences are only
/// produced when the value is formatted.
pub struct Highlighted<H, M> {
    highlighter: H,
    message: M,
}

impl<H: Highlighter, M: fmt::Display> fmt::Display for Highlighted<H, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{ESCAPE_RESET}",
            self.highlighter.escape_code(),
            self.highlighter.secondary_code(),
            self.message
        )
    }
}

/// Apply a highlighter onto the message, the effect is reset at the end of
/// the message.
pub fn highlight<H: Highlighter, M: fmt::Display>(highlighter: H, message: M) -> Highlighted<H, M> {
    Highlighted { highlighter, message }
}
