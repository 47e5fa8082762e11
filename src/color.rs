//! RGB color representation for LED strips.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// An RGB color with red, green, and blue components (0-255 each).
///
/// Serializes as a three-element array `[r, g, b]`, the format every wire
/// packet and the config file use.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Color {
    red: u8,
    green: u8,
    blue: u8,
}

impl Color {
    /// Create a color with the given RGB values.
    pub fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Create a default color (black: 0,0,0).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn red(&self) -> u8 {
        self.red
    }

    pub fn green(&self) -> u8 {
        self.green
    }

    pub fn blue(&self) -> u8 {
        self.blue
    }
}

impl From<[u8; 3]> for Color {
    fn from(parts: [u8; 3]) -> Self {
        Self::rgb(parts[0], parts[1], parts[2])
    }
}

impl From<Color> for [u8; 3] {
    fn from(color: Color) -> Self {
        [color.red, color.green, color.blue]
    }
}

impl FromStr for Color {
    type Err = String;

    /// Parse from comma-separated string (e.g., "255,128,0").
    fn from_str(s: &str) -> Result<Self, String> {
        let parts: Vec<u8> = s.split(',').map(|c| c.trim().parse().unwrap_or(0)).collect();
        if parts.len() == 3 {
            Ok(Self::rgb(parts[0], parts[1], parts[2]))
        } else {
            Err("Expected format: r,g,b".into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_as_array() {
        let color = Color::rgb(255, 128, 0);
        assert_eq!(serde_json::to_value(color).unwrap(), json!([255, 128, 0]));
    }

    #[test]
    fn test_deserializes_from_array() {
        let color: Color = serde_json::from_value(json!([1, 2, 3])).unwrap();
        assert_eq!(color, Color::rgb(1, 2, 3));
    }

    #[test]
    fn test_from_str() {
        assert_eq!(Color::from_str("10, 20,30").unwrap(), Color::rgb(10, 20, 30));
        assert!(Color::from_str("10,20").is_err());
    }
}
