//! Color palette for voxel color codes.
//!
//! Scripts return small integers; codes `1..=16` map onto a fixed set of
//! named colors. Everything else (including `0`, which never produces
//! geometry) resolves to [`DEFAULT_COLOR`].

use serde::Serialize;

/// Integer color code returned by a voxel script. `0` means empty.
pub type ColorCode = i64;

/// An opaque sRGB display color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Color {
    pub name: &'static str,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    const fn new(name: &'static str, r: u8, g: u8, b: u8) -> Self {
        Self { name, r, g, b }
    }

    /// Normalized RGB components in 0..=1.
    pub fn to_rgb_f32(&self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }

    /// Normalized RGBA with full opacity.
    pub fn to_rgba_f32(&self) -> [f32; 4] {
        let [r, g, b] = self.to_rgb_f32();
        [r, g, b, 1.0]
    }

    /// `#rrggbb` hex notation.
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Fallback for codes outside the palette.
pub const DEFAULT_COLOR: Color = Color::new("White", 255, 255, 255);

/// Palette entries for codes 1 through 16, in order.
pub const PALETTE: [Color; 16] = [
    Color::new("White", 255, 255, 255),
    Color::new("Gray", 128, 128, 128),
    Color::new("Black", 0, 0, 0),
    Color::new("PeachPuff", 255, 218, 185),
    Color::new("Pink", 255, 192, 203),
    Color::new("Purple", 128, 0, 128),
    Color::new("Red", 255, 0, 0),
    Color::new("Orange", 255, 165, 0),
    Color::new("Yellow", 255, 255, 0),
    Color::new("LightGreen", 144, 238, 144),
    Color::new("Green", 0, 128, 0),
    Color::new("DarkBlue", 0, 0, 139),
    Color::new("Blue", 0, 0, 255),
    Color::new("LightSkyBlue", 135, 206, 250),
    Color::new("Brown", 165, 42, 42),
    Color::new("DarkOrange", 255, 140, 0),
];

/// Look up the display color for a code.
pub fn color_of(code: ColorCode) -> Color {
    match code {
        1..=16 => PALETTE[(code - 1) as usize],
        _ => DEFAULT_COLOR,
    }
}

/// Iterate `(code, color)` for every defined palette entry.
pub fn entries() -> impl Iterator<Item = (ColorCode, Color)> {
    PALETTE
        .iter()
        .enumerate()
        .map(|(i, c)| (i as ColorCode + 1, *c))
}
