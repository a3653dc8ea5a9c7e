//! Continuous-mapping evaluation by boundary interpolation.
//!
//! Below the first breakpoint the mapping clamps to its `lesser` value and
//! above the last to its `greater` value; there is no extrapolation.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::model::value::format_double;

/// A continuous-mapping breakpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub threshold: f64,
    /// Style value for source values below the threshold.
    pub lesser: String,
    /// Style value for source values equal to the threshold.
    pub equal: String,
    /// Style value for source values above the threshold.
    pub greater: String,
}

impl Breakpoint {
    pub fn new(
        threshold: f64,
        lesser: impl Into<String>,
        equal: impl Into<String>,
        greater: impl Into<String>,
    ) -> Self {
        Self { threshold, lesser: lesser.into(), equal: equal.into(), greater: greater.into() }
    }
}

/// Breakpoints of one mapping; most mappings have two to four.
pub type Breakpoints = SmallVec<[Breakpoint; 4]>;

/// How style values of a visual property blend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueSpace {
    /// Numeric values, interpolated linearly.
    Number,
    /// Colors, interpolated per RGB channel.
    Color,
    /// Anything else (shapes, labels); takes the lower bracket value.
    Discrete,
}

/// Evaluate a continuous mapping at `v`.
///
/// `breakpoints` must already be sorted by threshold. Returns `None` only
/// when there are no breakpoints.
pub fn evaluate(breakpoints: &[Breakpoint], v: f64, space: ValueSpace) -> Option<String> {
    let first = breakpoints.first()?;
    let last = breakpoints.last()?;

    if let Some(hit) = breakpoints.iter().find(|b| b.threshold == v) {
        return Some(hit.equal.clone());
    }
    if v < first.threshold {
        return Some(first.lesser.clone());
    }
    if v > last.threshold {
        return Some(last.greater.clone());
    }

    let (lower, upper) = breakpoints
        .windows(2)
        .map(|w| (&w[0], &w[1]))
        .find(|(lo, hi)| lo.threshold < v && v < hi.threshold)?;
    let fraction = (v - lower.threshold) / (upper.threshold - lower.threshold);
    Some(blend(space, &lower.greater, &upper.lesser, fraction))
}

/// Blend two style values at `fraction` (0 = `lower`, 1 = `upper`).
///
/// Values that do not parse in `space` fall back to `lower`.
pub fn blend(space: ValueSpace, lower: &str, upper: &str, fraction: f64) -> String {
    match space {
        ValueSpace::Number => match (lower.trim().parse::<f64>(), upper.trim().parse::<f64>()) {
            (Ok(lo), Ok(hi)) => format_double(lo + (hi - lo) * fraction),
            _ => lower.to_string(),
        },
        ValueSpace::Color => match (parse_color(lower), parse_color(upper)) {
            (Some(lo), Some(hi)) => {
                let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * fraction).round() as u8;
                format_color([mix(lo[0], hi[0]), mix(lo[1], hi[1]), mix(lo[2], hi[2])])
            }
            _ => lower.to_string(),
        },
        ValueSpace::Discrete => lower.to_string(),
    }
}

const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("lime", [0, 255, 0]),
    ("green", [0, 128, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("cyan", [0, 255, 255]),
    ("aqua", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("fuchsia", [255, 0, 255]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
    ("silver", [192, 192, 192]),
    ("maroon", [128, 0, 0]),
    ("olive", [128, 128, 0]),
    ("navy", [0, 0, 128]),
    ("purple", [128, 0, 128]),
    ("teal", [0, 128, 128]),
    ("orange", [255, 165, 0]),
];

/// Parse `#RRGGBB`, `#RGB` or a basic CSS color name.
pub fn parse_color(text: &str) -> Option<[u8; 3]> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix('#').filter(|h| h.is_ascii()) {
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        return match hex.len() {
            6 => Some([channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?]),
            3 => {
                let short = |i: usize| channel(&hex[i..i + 1]).map(|c| c * 17);
                Some([short(0)?, short(1)?, short(2)?])
            }
            _ => None,
        };
    }
    NAMED_COLORS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(text))
        .map(|(_, rgb)| *rgb)
}

pub fn format_color(rgb: [u8; 3]) -> String {
    format!("#{:02X}{:02X}{:02X}", rgb[0], rgb[1], rgb[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn red_to_blue() -> Vec<Breakpoint> {
        vec![
            Breakpoint::new(0.0, "red", "red", "red"),
            Breakpoint::new(10.0, "blue", "blue", "blue"),
        ]
    }

    #[test]
    fn test_color_midpoint() {
        assert_eq!(evaluate(&red_to_blue(), 5.0, ValueSpace::Color).unwrap(), "#800080");
    }

    #[test]
    fn test_clamps_outside_range() {
        assert_eq!(evaluate(&red_to_blue(), -1.0, ValueSpace::Color).unwrap(), "red");
        assert_eq!(evaluate(&red_to_blue(), 11.0, ValueSpace::Color).unwrap(), "blue");
    }

    #[test]
    fn test_equal_uses_equal_value() {
        let bps = vec![
            Breakpoint::new(0.0, "1", "5", "10"),
            Breakpoint::new(10.0, "20", "25", "30"),
        ];
        assert_eq!(evaluate(&bps, 0.0, ValueSpace::Number).unwrap(), "5");
        assert_eq!(evaluate(&bps, 10.0, ValueSpace::Number).unwrap(), "25");
        // Between: greater of lower point (10) to lesser of upper point (20).
        assert_eq!(evaluate(&bps, 5.0, ValueSpace::Number).unwrap(), "15.0");
    }

    #[test]
    fn test_discrete_space_takes_lower() {
        let bps = vec![
            Breakpoint::new(0.0, "ELLIPSE", "ELLIPSE", "ELLIPSE"),
            Breakpoint::new(1.0, "RECTANGLE", "RECTANGLE", "RECTANGLE"),
        ];
        assert_eq!(evaluate(&bps, 0.9, ValueSpace::Discrete).unwrap(), "ELLIPSE");
    }

    #[test]
    fn test_no_breakpoints() {
        assert_eq!(evaluate(&[], 1.0, ValueSpace::Number), None);
    }

    #[test]
    fn test_parse_color_forms() {
        assert_eq!(parse_color("#ff0000"), Some([255, 0, 0]));
        assert_eq!(parse_color("#0F0"), Some([0, 255, 0]));
        assert_eq!(parse_color("Navy"), Some([0, 0, 128]));
        assert_eq!(parse_color("#12345"), None);
        assert_eq!(parse_color("chartreuse-ish"), None);
    }

    proptest! {
        #[test]
        fn prop_numeric_result_stays_in_bracket(v in 0.0f64..100.0) {
            let bps = vec![
                Breakpoint::new(0.0, "0", "0", "0"),
                Breakpoint::new(100.0, "50", "50", "50"),
            ];
            let out: f64 = evaluate(&bps, v, ValueSpace::Number).unwrap().parse().unwrap();
            prop_assert!((0.0..=50.0).contains(&out));
        }
    }
}
