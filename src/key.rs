//! Keypad input events and the terminal keymap.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::engine::Operator;

/// A single keypad event.
///
/// Inputs are pre-validated discrete events; `Digit` always carries 0-9
/// when produced through [`Key::from_char`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Digit(u8),
    Point,
    ToggleSign,
    SquareRoot,
    Op(Operator),
    Equals,
    Clear,
}

/// Terminal character bindings, including the natural aliases ('x' for
/// multiply, ':' for divide, 'n'/'_' for the sign toggle).
static KEYMAP: Lazy<HashMap<char, Key>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for digit in 0..=9u8 {
        map.insert((b'0' + digit) as char, Key::Digit(digit));
    }
    map.insert('.', Key::Point);
    map.insert(',', Key::Point);
    map.insert('s', Key::ToggleSign);
    map.insert('n', Key::ToggleSign);
    map.insert('_', Key::ToggleSign);
    map.insert('r', Key::SquareRoot);
    map.insert('+', Key::Op(Operator::Add));
    map.insert('-', Key::Op(Operator::Subtract));
    map.insert('*', Key::Op(Operator::Multiply));
    map.insert('x', Key::Op(Operator::Multiply));
    map.insert('/', Key::Op(Operator::Divide));
    map.insert(':', Key::Op(Operator::Divide));
    map.insert('=', Key::Equals);
    map.insert('c', Key::Clear);
    map
});

impl Key {
    /// Look up the key bound to a terminal character, case-insensitively.
    ///
    /// Returns `None` for unbound characters (whitespace, prompt noise).
    pub fn from_char(c: char) -> Option<Key> {
        KEYMAP.get(&c.to_ascii_lowercase()).copied()
    }
}
