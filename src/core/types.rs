//! Core type aliases and shared value types

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

/// Standard Result type for the crate
pub type Result<T> = std::result::Result<T, crate::core::error::Error>;

/// Linear RGBA color, laid out for direct upload as a per-instance attribute.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    #[serde(default = "opaque")]
    pub a: f32,
}

fn opaque() -> f32 {
    1.0
}

impl Color {
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Convert to 8-bit RGBA, clamping each channel.
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_rgba8() {
        assert_eq!(Color::WHITE.to_rgba8(), [255, 255, 255, 255]);
        assert_eq!(Color::rgba(2.0, -1.0, 0.5, 0.0).to_rgba8(), [255, 0, 128, 0]);
    }

    #[test]
    fn test_color_alpha_defaults_when_missing() {
        let c: Color = serde_json::from_str(r#"{"r":0.1,"g":0.2,"b":0.3}"#).unwrap();
        assert_eq!(c.a, 1.0);
    }
}
