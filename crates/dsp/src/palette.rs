use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    #[default]
    Grayscale,
    Rainbow,
    Viridis,
    Plasma,
    Magma,
}

impl Palette {
    pub const ALL: [Palette; 5] = [
        Palette::Grayscale,
        Palette::Rainbow,
        Palette::Viridis,
        Palette::Plasma,
        Palette::Magma,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Palette::Grayscale => "grayscale",
            Palette::Rainbow => "rainbow",
            Palette::Viridis => "viridis",
            Palette::Plasma => "plasma",
            Palette::Magma => "magma",
        }
    }
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Palette {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Palette::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "unknown palette '{}' (expected one of: grayscale, rainbow, viridis, plasma, magma)",
                    s
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    fn from_unit(r: f32, g: f32, b: f32) -> Self {
        // Truncate like an integer cast after scaling to 0..255
        let q = |c: f32| (255.0 * c.clamp(0.0, 1.0)) as u8;
        Self::new(q(r), q(g), q(b))
    }
}

fn lerp(a: f32, b: f32, f: f32) -> f32 {
    a + (b - a) * f
}

/// Map a magnitude to a colour. `value` is normalized by `reference_max`
/// and clamped to [0, 1], so overflow saturates at the top of the palette.
/// NaN and a non-positive reference map to 0.
pub fn map(value: f32, reference_max: f32, palette: Palette) -> Rgb {
    let mut t = value / reference_max;
    if t.is_nan() || reference_max <= 0.0 {
        t = 0.0;
    }
    let t = t.clamp(0.0, 1.0);

    let (r, g, b) = match palette {
        Palette::Grayscale => (t, t, t),
        Palette::Rainbow => {
            // black -> blue -> red -> yellow -> white
            if t < 0.25 {
                (0.0, 0.0, t / 0.25)
            } else if t < 0.5 {
                let f = (t - 0.25) / 0.25;
                (f, 0.0, 1.0 - f)
            } else if t < 0.75 {
                (1.0, (t - 0.5) / 0.25, 0.0)
            } else {
                (1.0, 1.0, (t - 0.75) / 0.25)
            }
        }
        Palette::Viridis => {
            if t < 0.5 {
                let f = t * 2.0;
                (0.0, lerp(0.1, 0.7, f), lerp(0.2, 0.3, f))
            } else {
                let f = (t - 0.5) * 2.0;
                (lerp(0.0, 0.9, f), lerp(0.7, 0.9, f), lerp(0.3, 0.0, f))
            }
        }
        Palette::Plasma => {
            if t < 0.5 {
                let f = t * 2.0;
                (lerp(0.2, 1.0, f), 0.0, lerp(0.3, 0.0, f))
            } else {
                (1.0, (t - 0.5) * 2.0, 0.0)
            }
        }
        Palette::Magma => {
            if t < 0.3 {
                let f = t / 0.3;
                (0.3 * f, 0.0, 0.1 * f)
            } else if t < 0.6 {
                let f = (t - 0.3) / 0.3;
                (lerp(0.3, 1.0, f), 0.4 * f, lerp(0.1, 0.0, f))
            } else {
                let f = (t - 0.6) / 0.4;
                (1.0, lerp(0.4, 1.0, f), f)
            }
        }
    };

    Rgb::from_unit(r, g, b)
}

/// Map a whole row into `out`.
pub fn map_row(row: &[f32], reference_max: f32, palette: Palette, out: &mut Vec<Rgb>) {
    out.clear();
    out.extend(row.iter().map(|&v| map(v, reference_max, palette)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Rgb, b: Rgb) -> bool {
        let d = |x: u8, y: u8| (x as i16 - y as i16).abs() <= 1;
        d(a.r, b.r) && d(a.g, b.g) && d(a.b, b.b)
    }

    #[test]
    fn test_endpoints() {
        let cases = [
            (Palette::Grayscale, Rgb::new(0, 0, 0), Rgb::new(255, 255, 255)),
            (Palette::Rainbow, Rgb::new(0, 0, 0), Rgb::new(255, 255, 255)),
            (Palette::Viridis, Rgb::new(0, 25, 51), Rgb::new(229, 229, 0)),
            (Palette::Plasma, Rgb::new(51, 0, 76), Rgb::new(255, 255, 0)),
            (Palette::Magma, Rgb::new(0, 0, 0), Rgb::new(255, 255, 255)),
        ];
        for (palette, low, high) in cases {
            let lo = map(0.0, 500.0, palette);
            let hi = map(500.0, 500.0, palette);
            assert!(close(lo, low), "{} low endpoint: {:?}", palette, lo);
            assert!(close(hi, high), "{} high endpoint: {:?}", palette, hi);
        }
    }

    #[test]
    fn test_clamping() {
        for palette in Palette::ALL {
            assert_eq!(map(-10.0, 100.0, palette), map(0.0, 100.0, palette));
            assert_eq!(map(1e9, 100.0, palette), map(100.0, 100.0, palette));
            assert_eq!(map(f32::NAN, 100.0, palette), map(0.0, 100.0, palette));
            assert_eq!(map(5.0, 0.0, palette), map(0.0, 100.0, palette));
            assert_eq!(map(f32::INFINITY, 500.0, palette), map(500.0, 500.0, palette));
            assert_eq!(map(f32::MAX, 1e-30, palette), map(1.0, 1.0, palette));
            assert_eq!(map(f32::NEG_INFINITY, 500.0, palette), map(0.0, 500.0, palette));
        }
    }

    #[test]
    fn test_rainbow_midpoints() {
        assert_eq!(map(0.25, 1.0, Palette::Rainbow), Rgb::new(0, 0, 255));
        assert_eq!(map(0.5, 1.0, Palette::Rainbow), Rgb::new(255, 0, 0));
        assert_eq!(map(0.75, 1.0, Palette::Rainbow), Rgb::new(255, 255, 0));
    }

    #[test]
    fn test_grayscale_monotonic() {
        let mut last = 0u8;
        for k in 0..=100 {
            let c = map(k as f32, 100.0, Palette::Grayscale);
            assert!(c.r >= last);
            assert_eq!(c.r, c.g);
            assert_eq!(c.g, c.b);
            last = c.r;
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!("Magma".parse::<Palette>().unwrap(), Palette::Magma);
        assert_eq!("VIRIDIS".parse::<Palette>().unwrap(), Palette::Viridis);
        assert!("jet".parse::<Palette>().is_err());
        let p: Palette = serde_json::from_str("\"plasma\"").unwrap();
        assert_eq!(p, Palette::Plasma);
    }

    #[test]
    fn test_map_row() {
        let mut out = Vec::new();
        map_row(&[0.0, 10.0], 10.0, Palette::Grayscale, &mut out);
        assert_eq!(out, vec![Rgb::new(0, 0, 0), Rgb::new(255, 255, 255)]);
    }
}
