//! Rich-text tree for chat and system messages.
//!
//! The in-band legacy format carries color and style as `§x` tokens whose
//! effect is stateful: a style stays active across following text runs until
//! another token overrides it or `§r` resets everything. [`Text::from_legacy`]
//! resolves that stream into an explicit tree with an append-only run builder,
//! and the tree serializes to the canonical compact JSON form (unset styles
//! and an empty `extra` are omitted).

use serde::{Deserialize, Serialize};

/// The section-sign prefix of a legacy formatting token.
pub const LEGACY_PREFIX: char = '§';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Black,
    DarkBlue,
    DarkGreen,
    DarkAqua,
    DarkRed,
    DarkPurple,
    Gold,
    Gray,
    DarkGray,
    Blue,
    Green,
    Aqua,
    Red,
    LightPurple,
    Yellow,
    White,
}

impl Color {
    /// Maps a legacy color code character to its color.
    #[must_use]
    pub const fn from_code(code: char) -> Option<Self> {
        Some(match code {
            '0' => Self::Black,
            '1' => Self::DarkBlue,
            '2' => Self::DarkGreen,
            '3' => Self::DarkAqua,
            '4' => Self::DarkRed,
            '5' => Self::DarkPurple,
            '6' => Self::Gold,
            '7' => Self::Gray,
            '8' => Self::DarkGray,
            '9' => Self::Blue,
            'a' => Self::Green,
            'b' => Self::Aqua,
            'c' => Self::Red,
            'd' => Self::LightPurple,
            'e' => Self::Yellow,
            'f' => Self::White,
            _ => return None,
        })
    }
}

/// One node of the rich-text tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Text {
    pub text: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub color: Option<Color>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bold: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub italic: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub underlined: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub strikethrough: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub obfuscated: Option<bool>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub extra: Vec<Text>,
}

/// Style state threaded through the run builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Style {
    color: Option<Color>,
    bold: bool,
    italic: bool,
    underlined: bool,
    strikethrough: bool,
    obfuscated: bool,
}

impl Style {
    /// Applies one token code. Unknown codes are ignored.
    fn apply(&mut self, code: char) {
        match code {
            'k' => self.obfuscated = true,
            'l' => self.bold = true,
            'm' => self.strikethrough = true,
            'n' => self.underlined = true,
            'o' => self.italic = true,
            'r' => *self = Self::default(),
            _ => {
                if let Some(color) = Color::from_code(code) {
                    self.color = Some(color);
                }
            }
        }
    }

    fn run(self, text: String) -> Text {
        Text {
            text,
            color: self.color,
            bold: self.bold.then_some(true),
            italic: self.italic.then_some(true),
            underlined: self.underlined.then_some(true),
            strikethrough: self.strikethrough.then_some(true),
            obfuscated: self.obfuscated.then_some(true),
            extra: Vec::new(),
        }
    }
}

impl Text {
    /// An unstyled leaf node.
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Resolves a legacy `§x` token stream into a tree of style runs.
    ///
    /// The first run becomes the root node; later runs are appended as
    /// siblings in `extra`, each carrying the style state active at that
    /// point in the stream.
    #[must_use]
    pub fn from_legacy(message: &str) -> Self {
        let mut runs: Vec<Self> = Vec::new();
        let mut style = Style::default();
        let mut buf = String::new();
        let mut chars = message.chars();

        while let Some(c) = chars.next() {
            if c == LEGACY_PREFIX {
                let Some(code) = chars.next() else { break };
                if !buf.is_empty() {
                    runs.push(style.run(std::mem::take(&mut buf)));
                }
                style.apply(code);
            } else {
                buf.push(c);
            }
        }
        if !buf.is_empty() {
            runs.push(style.run(buf));
        }

        let mut runs = runs.into_iter();
        let Some(mut root) = runs.next() else {
            return Self::plain("");
        };
        root.extra = runs.collect();
        root
    }

    /// Serializes to the compact canonical JSON form.
    #[must_use]
    pub fn to_json(&self) -> String {
        // A struct of strings and booleans cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{\"text\":\"\"}"))
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
