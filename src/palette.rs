/// The palette every scene color is picked from.
pub const NICE_COLORS: [&str; 5] = ["#99b898", "#fecea8", "#ff847c", "#e84a5f", "#2a363b"];

/// Color used by materials when no valid color is given.
pub const DEFAULT_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

/// Looks up a palette slot. Slots past the end yield `None`.
pub fn slot(index: usize) -> Option<[f32; 3]> {
    NICE_COLORS.get(index).and_then(|hex| parse_hex(hex))
}

/// Parses `#rrggbb` into sRGB components in `[0, 1]`.
pub fn parse_hex(hex: &str) -> Option<[f32; 3]> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let value = u32::from_str_radix(digits, 16).ok()?;
    Some([
        ((value >> 16) & 0xFF) as f32 / 255.0,
        ((value >> 8) & 0xFF) as f32 / 255.0,
        (value & 0xFF) as f32 / 255.0,
    ])
}

fn srgb_to_linear_channel(c: f32) -> f32 {
    if c < 0.04045 {
        c * 0.0773993808
    } else {
        (c * 0.9478672986 + 0.0521327014).powf(2.4)
    }
}

pub fn srgb_to_linear(color: [f32; 3]) -> [f32; 3] {
    color.map(srgb_to_linear_channel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn parses_palette() {
        assert_eq!(parse_hex("#ff0000"), Some([1.0, 0.0, 0.0]));
        assert_eq!(parse_hex("ff0000"), None);
        assert_eq!(parse_hex("#ff00"), None);
        assert!(NICE_COLORS.iter().all(|hex| parse_hex(hex).is_some()));
    }

    #[test]
    fn missing_slot() {
        assert!(slot(4).is_some());
        assert_eq!(slot(5), None);
    }

    #[test]
    fn linear_conversion() {
        assert_eq!(srgb_to_linear([0.0; 3]), [0.0; 3]);
        assert_relative_eq!(srgb_to_linear([1.0; 3])[0], 1.0, epsilon = 1e-5);
        assert_relative_eq!(srgb_to_linear([0.5; 3])[1], 0.21404, epsilon = 1e-4);
        // linear segment near black
        assert_relative_eq!(srgb_to_linear([0.02; 3])[2], 0.02 / 12.92, epsilon = 1e-6);
    }
}
