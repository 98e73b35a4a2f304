//! Mouth shape metadata.
//!
//! The nine mouth shapes emitted by Rhubarb Lip Sync. The six basic shapes
//! (A-F) are always produced; the extended shapes (G, H, X) can be turned
//! off, in which case the tool substitutes the closest basic shape.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// One mouth shape key as reported by the lipsync tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShapeKey {
    /// P, B, M sounds. Closed mouth.
    A,
    /// K, S, T sounds. Slightly opened mouth.
    B,
    /// EH, AE sounds. Opened mouth.
    C,
    /// AA sound. Wide opened mouth.
    D,
    /// AO, ER sounds. Slightly rounded mouth.
    E,
    /// UW, OW, W sounds. Puckered lips.
    F,
    /// F, V sounds. Teeth touching the lower lip.
    G,
    /// L sounds. Tongue raised behind the upper teeth.
    H,
    /// Idle position, used for pauses in speech.
    X,
}

impl ShapeKey {
    /// All shapes in key order.
    pub const ALL: [ShapeKey; 9] = [
        ShapeKey::A,
        ShapeKey::B,
        ShapeKey::C,
        ShapeKey::D,
        ShapeKey::E,
        ShapeKey::F,
        ShapeKey::G,
        ShapeKey::H,
        ShapeKey::X,
    ];

    /// Map a key character to a shape. Unknown keys fall back to `X` (idle),
    /// matching the tool's own treatment of out-of-range keys.
    pub fn from_char(c: char) -> ShapeKey {
        match c {
            'A' => ShapeKey::A,
            'B' => ShapeKey::B,
            'C' => ShapeKey::C,
            'D' => ShapeKey::D,
            'E' => ShapeKey::E,
            'F' => ShapeKey::F,
            'G' => ShapeKey::G,
            'H' => ShapeKey::H,
            _ => ShapeKey::X,
        }
    }

    /// The key character used on the wire and in displays.
    pub fn as_char(self) -> char {
        match self {
            ShapeKey::A => 'A',
            ShapeKey::B => 'B',
            ShapeKey::C => 'C',
            ShapeKey::D => 'D',
            ShapeKey::E => 'E',
            ShapeKey::F => 'F',
            ShapeKey::G => 'G',
            ShapeKey::H => 'H',
            ShapeKey::X => 'X',
        }
    }

    /// Whether this shape is only emitted when extended shapes are enabled.
    pub fn is_extended(self) -> bool {
        matches!(self, ShapeKey::G | ShapeKey::H | ShapeKey::X)
    }

    /// `X` is the idle/silence shape; it is exempt from duration trimming.
    pub fn is_silence(self) -> bool {
        matches!(self, ShapeKey::X)
    }

    /// Short description of the shape, from the tool's documentation.
    pub fn description(self) -> &'static str {
        match self {
            ShapeKey::A => "P B M sounds. Closed mouth.",
            ShapeKey::B => "K S T sounds. Slightly opened mouth.",
            ShapeKey::C => "EH AE sounds. Opened mouth.",
            ShapeKey::D => "A sound. Wide opened mouth.",
            ShapeKey::E => "AO ER sounds. Slightly rounded mouth.",
            ShapeKey::F => "UW OW W sounds. Puckered lips.",
            ShapeKey::G => "F V sounds. Teeth touched lip.",
            ShapeKey::H => "L sounds. Tongue raised.",
            ShapeKey::X => "Idle.",
        }
    }

    /// Concatenated keys of the extended shapes, e.g. `"GHX"`. This is the
    /// value passed to the tool's `--extendedShapes` argument.
    pub fn extended_arg() -> String {
        ShapeKey::ALL
            .iter()
            .filter(|s| s.is_extended())
            .map(|s| s.as_char())
            .collect()
    }
}

impl fmt::Display for ShapeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl Serialize for ShapeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_char(self.as_char())
    }
}

impl<'de> Deserialize<'de> for ShapeKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl Visitor<'_> for KeyVisitor {
            type Value = ShapeKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mouth shape key like \"A\"")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<ShapeKey, E> {
                Ok(value
                    .chars()
                    .next()
                    .map(ShapeKey::from_char)
                    .unwrap_or(ShapeKey::X))
            }

            fn visit_char<E: de::Error>(self, value: char) -> Result<ShapeKey, E> {
                Ok(ShapeKey::from_char(value))
            }
        }

        deserializer.deserialize_str(KeyVisitor)
    }
}
