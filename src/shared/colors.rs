//! Terminal color palette.
//!
//! The palette is chosen once at startup and passed by reference to every
//! renderer, so the escape table never changes after process start.

use crate::config::Config;

/// Colors offered by the palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
    Purple,
    Cyan,
    Gray,
    White,
}

impl Color {
    /// Looks up a color by its lowercase name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "red" => Some(Color::Red),
            "green" => Some(Color::Green),
            "yellow" => Some(Color::Yellow),
            "blue" => Some(Color::Blue),
            "purple" => Some(Color::Purple),
            "cyan" => Some(Color::Cyan),
            "gray" => Some(Color::Gray),
            "white" => Some(Color::White),
            _ => None,
        }
    }
}

/// Immutable table of escape sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    reset: &'static str,
    red: &'static str,
    green: &'static str,
    yellow: &'static str,
    blue: &'static str,
    purple: &'static str,
    cyan: &'static str,
    gray: &'static str,
    white: &'static str,
}

impl Palette {
    pub const ANSI: Palette = Palette {
        reset: "\x1b[0m",
        red: "\x1b[31m",
        green: "\x1b[32m",
        yellow: "\x1b[33m",
        blue: "\x1b[34m",
        purple: "\x1b[35m",
        cyan: "\x1b[36m",
        gray: "\x1b[37m",
        white: "\x1b[97m",
    };

    pub const PLAIN: Palette = Palette {
        reset: "",
        red: "",
        green: "",
        yellow: "",
        blue: "",
        purple: "",
        cyan: "",
        gray: "",
        white: "",
    };

    /// Selects the palette for this process.
    ///
    /// Legacy Windows consoles do not render ANSI escapes reliably, so they
    /// get the plain table, as does a user who opted out of colors.
    pub fn detect(config: &Config) -> Self {
        if cfg!(windows) || config.no_color {
            Self::PLAIN
        } else {
            Self::ANSI
        }
    }

    pub fn escape(&self, color: Color) -> &'static str {
        match color {
            Color::Red => self.red,
            Color::Green => self.green,
            Color::Yellow => self.yellow,
            Color::Blue => self.blue,
            Color::Purple => self.purple,
            Color::Cyan => self.cyan,
            Color::Gray => self.gray,
            Color::White => self.white,
        }
    }

    pub fn reset(&self) -> &'static str {
        self.reset
    }

    /// Wraps `text` in the escape for `color` and the reset sequence.
    pub fn colorize(&self, text: &str, color: Color) -> String {
        format!("{}{}{}", self.escape(color), text, self.reset)
    }
}
