//! Reserved export key chord

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ShortcutError;

/// A key press as delivered by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPress {
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
    pub key: String,
    /// Focus was inside a text input when the key was pressed.
    #[serde(default)]
    pub in_text_input: bool,
}

/// Two modifiers plus one letter, e.g. `ctrl+shift+e`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortcut {
    ctrl: bool,
    shift: bool,
    alt: bool,
    meta: bool,
    letter: char,
}

impl Shortcut {
    /// Whether `press` triggers this chord. Presses typed into text inputs
    /// never do.
    pub fn matches(&self, press: &KeyPress) -> bool {
        if press.in_text_input {
            return false;
        }

        let mut chars = press.key.chars();
        let letter = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => return false,
        };

        press.ctrl == self.ctrl
            && press.shift == self.shift
            && press.alt == self.alt
            && press.meta == self.meta
            && letter.eq_ignore_ascii_case(&self.letter)
    }
}

impl FromStr for Shortcut {
    type Err = ShortcutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<String> = s
            .split('+')
            .map(|part| part.trim().to_ascii_lowercase())
            .collect();

        let (letter, modifiers) = match parts.split_last() {
            Some((letter, modifiers)) if modifiers.len() == 2 => (letter, modifiers),
            _ => return Err(ShortcutError::Shape(s.to_string())),
        };

        let mut chars = letter.chars();
        let letter = match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => c,
            _ => return Err(ShortcutError::Shape(s.to_string())),
        };

        let mut shortcut = Shortcut {
            ctrl: false,
            shift: false,
            alt: false,
            meta: false,
            letter,
        };

        for modifier in modifiers {
            let slot = match modifier.as_str() {
                "ctrl" | "control" => &mut shortcut.ctrl,
                "shift" => &mut shortcut.shift,
                "alt" | "option" => &mut shortcut.alt,
                "meta" | "cmd" | "super" => &mut shortcut.meta,
                other => return Err(ShortcutError::UnknownModifier(other.to_string())),
            };
            if *slot {
                return Err(ShortcutError::DuplicateModifier(modifier.clone()));
            }
            *slot = true;
        }

        Ok(shortcut)
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modifiers = [
            (self.ctrl, "ctrl"),
            (self.shift, "shift"),
            (self.alt, "alt"),
            (self.meta, "meta"),
        ];
        for (_, name) in modifiers.iter().filter(|(on, _)| *on) {
            write!(f, "{}+", name)?;
        }
        write!(f, "{}", self.letter)
    }
}
