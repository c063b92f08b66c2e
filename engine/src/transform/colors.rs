//! RGB colours used by the compare operator.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

pub const GREY: Rgb = Rgb { r: 0xaa, g: 0xaa, b: 0xaa };
pub const GREEN: Rgb = Rgb { r: 0x00, g: 0xff, b: 0x00 };
pub const RED: Rgb = Rgb { r: 0xff, g: 0x00, b: 0x00 };

/// Linear interpolation from `from` (t = 0) to `to` (t = 1). `t` is clamped.
pub fn interpolate_color(from: Rgb, to: Rgb, t: f64) -> Rgb {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    Rgb {
        r: mix(from.r, to.r),
        g: mix(from.g, to.g),
        b: mix(from.b, to.b),
    }
}

pub fn color_to_rgb_string(color: Rgb) -> String {
    format!("rgb({},{},{})", color.r, color.g, color.b)
}
