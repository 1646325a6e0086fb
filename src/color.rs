//! Pixel color types shared by readback, flattening and reconstruction.

use bytemuck::{Pod, Zeroable};
use half::f16;
use serde::{Deserialize, Serialize};

fn clamp01(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

/// An 8-bit RGBA sample, the storage format of baked planes.
#[repr(C)]
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::new(0, 0, 0, 0);
    pub const BLACK: Color = Color::new(0, 0, 0, 255);
    pub const WHITE: Color = Color::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Sum of all four components, the ordering key used by uniform detection.
    pub fn channel_sum(self) -> u32 {
        self.r as u32 + self.g as u32 + self.b as u32 + self.a as u32
    }

    /// Reinterpret the 8-bit components as linear values in [0,1] without a
    /// transfer function, matching how baked planes are quantized.
    pub fn to_linear(self) -> LinearColor {
        LinearColor::new(
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        )
    }
}

/// A linear-space floating point color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl LinearColor {
    pub const TRANSPARENT: LinearColor = LinearColor::new(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: LinearColor = LinearColor::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: LinearColor = LinearColor::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_half([r, g, b, a]: [f16; 4]) -> Self {
        Self::new(f32::from(r), f32::from(g), f32::from(b), f32::from(a))
    }

    /// Multiply every component, alpha included.
    pub fn scaled(self, s: f32) -> Self {
        Self::new(self.r * s, self.g * s, self.b * s, self.a * s)
    }

    /// Quantize to 8 bits, clamping to [0,1].
    pub fn to_color(self) -> Color {
        Color::new(
            (clamp01(self.r) * 255.0).round() as u8,
            (clamp01(self.g) * 255.0).round() as u8,
            (clamp01(self.b) * 255.0).round() as u8,
            (clamp01(self.a) * 255.0).round() as u8,
        )
    }
}
