use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SURFACE_SATURATION: f64 = 0.7;
pub const SURFACE_LIGHTNESS: f64 = 0.5;

/// What happens to heights outside `[-size, size]` when they are mapped to a hue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HuePolicy {
    /// Hue is taken modulo 1, so colours cycle around the wheel.
    #[default]
    Wrap,
    /// Hue saturates at 0 below the range and at 1 above it.
    Clamp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorParams {
    pub height_range: f64,
    pub saturation: f64,
    pub lightness: f64,
    pub hue_policy: HuePolicy,
}

impl ColorParams {
    pub fn for_size(size: f64, hue_policy: HuePolicy) -> Self {
        Self {
            height_range: size,
            saturation: SURFACE_SATURATION,
            lightness: SURFACE_LIGHTNESS,
            hue_policy,
        }
    }

    /// Linear remap of `y` from `[-range, range]` onto `[0, 1]`, before the policy applies.
    pub fn raw_hue(&self, y: f64) -> f64 {
        (y + self.height_range) / (self.height_range * 2.0)
    }

    pub fn hue(&self, y: f64) -> f64 {
        let hue = self.raw_hue(y);
        match self.hue_policy {
            HuePolicy::Wrap => hue.rem_euclid(1.0),
            HuePolicy::Clamp => hue.clamp(0.0, 1.0),
        }
    }

    pub fn color_for_height(&self, y: f64) -> [f32; 3] {
        hsl_to_rgb(self.hue(y), self.saturation, self.lightness)
    }
}

fn hue_to_channel(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 0.5 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * 6.0 * (2.0 / 3.0 - t);
    }
    p
}

/// `h` is expected in `[0, 1)`; `s` and `l` are clamped to `[0, 1]`.
pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> [f32; 3] {
    let s = s.clamp(0.0, 1.0);
    let l = l.clamp(0.0, 1.0);

    if s == 0.0 {
        return [l as f32; 3];
    }

    let p = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let q = 2.0 * l - p;

    [
        hue_to_channel(q, p, h + 1.0 / 3.0) as f32,
        hue_to_channel(q, p, h) as f32,
        hue_to_channel(q, p, h - 1.0 / 3.0) as f32,
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid colour '{0}', expected #rrggbb")]
pub struct ParseColorError(pub String);

pub fn parse_hex_color(text: &str) -> Result<[u8; 3], ParseColorError> {
    let err = || ParseColorError(text.to_string());
    let hex = text.strip_prefix('#').ok_or_else(err)?;
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(err());
    }

    let mut rgb = [0u8; 3];
    for (i, channel) in rgb.iter_mut().enumerate() {
        *channel = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| err())?;
    }
    Ok(rgb)
}

pub fn format_hex_color(rgb: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}

/// sRGB byte colour to linear floats, for shader uniforms.
pub fn srgb_to_linear(rgb: [u8; 3]) -> [f32; 3] {
    rgb.map(|c| {
        let c = c as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn close(a: [f32; 3], b: [f32; 3]) -> bool {
        a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-6)
    }

    #[rstest]
    #[case(0.0, [1.0, 0.0, 0.0])]
    #[case(1.0 / 3.0, [0.0, 1.0, 0.0])]
    #[case(2.0 / 3.0, [0.0, 0.0, 1.0])]
    fn test_primary_hues(#[case] hue: f64, #[case] expected: [f32; 3]) {
        assert!(close(hsl_to_rgb(hue, 1.0, 0.5), expected));
    }

    #[test]
    fn test_zero_saturation_is_grey() {
        assert_eq!(hsl_to_rgb(0.42, 0.0, 0.25), [0.25; 3]);
    }

    #[test]
    fn test_surface_lightness_and_saturation() {
        let rgb = hsl_to_rgb(0.0, SURFACE_SATURATION, SURFACE_LIGHTNESS);
        assert!(close(rgb, [0.85, 0.15, 0.15]));
    }

    #[test]
    fn test_hue_is_monotonic_within_range() {
        let params = ColorParams::for_size(5.0, HuePolicy::Wrap);
        let mut previous = -1.0;
        for step in 0..100 {
            let y = -5.0 + step as f64 * 0.1;
            let hue = params.hue(y);
            assert!(hue > previous, "hue {hue} at y {y} not above {previous}");
            previous = hue;
        }
    }

    #[test]
    fn test_wrap_and_clamp_policies() {
        let wrap = ColorParams::for_size(5.0, HuePolicy::Wrap);
        let clamp = ColorParams::for_size(5.0, HuePolicy::Clamp);

        assert!((wrap.hue(7.5) - 0.25).abs() < 1e-12);
        assert!((wrap.hue(-7.5) - 0.75).abs() < 1e-12);
        assert_eq!(clamp.hue(7.5), 1.0);
        assert_eq!(clamp.hue(-7.5), 0.0);
        assert_eq!(wrap.hue(0.0), clamp.hue(0.0));
    }

    #[test]
    fn test_hex_round_trip() {
        assert_eq!(parse_hex_color("#4287f5"), Ok([0x42, 0x87, 0xf5]));
        assert_eq!(format_hex_color([0x42, 0x87, 0xf5]), "#4287f5");
    }

    #[rstest]
    #[case("4287f5")]
    #[case("#4287f")]
    #[case("#zz87f5")]
    #[case("#4287f5ff")]
    fn test_bad_hex(#[case] text: &str) {
        assert!(parse_hex_color(text).is_err());
    }
}
