//! Color coding of numeric values, interpolated in HSL space.

use super::types::{ColorCoding, ColorPair, ColorStop};

/// Maps a value onto a color pair using sorted stops
#[derive(Debug, Clone, PartialEq)]
pub struct ColorMapper {
    coding: ColorCoding,
    sorted: Vec<ColorStop>,
}

impl ColorMapper {
    pub fn new(coding: ColorCoding) -> Self {
        let mut sorted = coding.stops.clone();
        sorted.sort_by(|a, b| a.value.total_cmp(&b.value));
        Self { coding, sorted }
    }

    /// The persisted input.
    pub fn coding(&self) -> &ColorCoding {
        &self.coding
    }

    pub fn value_to_color(&self, value: f64) -> ColorPair {
        if !self.coding.enabled || value == 0.0 {
            return ColorPair::neutral();
        }
        let (Some(first), Some(last)) = (self.sorted.first(), self.sorted.last()) else {
            return ColorPair::neutral();
        };
        if value <= first.value {
            return first.color.clone();
        }
        if value >= last.value {
            return last.color.clone();
        }

        for pair in self.sorted.windows(2) {
            let (left, right) = (&pair[0], &pair[1]);
            if value == left.value {
                return left.color.clone();
            }
            if value == right.value {
                return right.color.clone();
            }
            if value > left.value && value < right.value {
                let t = (value - left.value) / (right.value - left.value);
                return ColorPair {
                    lighter: mix(&left.color.lighter, &right.color.lighter, t),
                    darker: mix(&left.color.darker, &right.color.darker, t),
                };
            }
        }
        last.color.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Hsl {
    h: f64,
    s: f64,
    l: f64,
}

/// Interpolate two `#rrggbb` colors at `t` in HSL, taking the short way around the hue circle.
fn mix(from: &str, to: &str, t: f64) -> String {
    let (Some(a), Some(b)) = (parse_hex(from), parse_hex(to)) else {
        return from.to_string();
    };
    let (a, b) = (rgb_to_hsl(a), rgb_to_hsl(b));

    let mut dh = b.h - a.h;
    if dh > 180.0 {
        dh -= 360.0;
    } else if dh < -180.0 {
        dh += 360.0;
    }
    let mixed = Hsl {
        h: (a.h + dh * t).rem_euclid(360.0),
        s: a.s + (b.s - a.s) * t,
        l: a.l + (b.l - a.l) * t,
    };
    to_hex(hsl_to_rgb(mixed))
}

fn parse_hex(value: &str) -> Option<[u8; 3]> {
    let digits = value.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

fn to_hex(rgb: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}

fn rgb_to_hsl(rgb: [u8; 3]) -> Hsl {
    let [r, g, b] = rgb.map(|c| f64::from(c) / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let d = max - min;
    if d == 0.0 {
        return Hsl { h: 0.0, s: 0.0, l };
    }
    let s = d / (1.0 - (2.0 * l - 1.0).abs());
    let h = if max == r {
        60.0 * ((g - b) / d).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / d + 2.0)
    } else {
        60.0 * ((r - g) / d + 4.0)
    };
    Hsl { h, s, l }
}

fn hsl_to_rgb(hsl: Hsl) -> [u8; 3] {
    let c = (1.0 - (2.0 * hsl.l - 1.0).abs()) * hsl.s;
    let hp = hsl.h / 60.0;
    let x = c * (1.0 - (hp.rem_euclid(2.0) - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = hsl.l - c / 2.0;
    [r, g, b].map(|v| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8)
}
